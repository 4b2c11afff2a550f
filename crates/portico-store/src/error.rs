//! # Storage Error Types
//!
//! Typed failures for every storage operation. Callers branch on variants:
//! `Throttled` and `Unavailable` are retried with backoff by the client,
//! `ConditionFailed` surfaces to API callers as a conflict, and
//! `AccessDenied` marks a misconfiguration (a binding operating without a
//! grant) that must be caught before production traffic.

use portico_core::{Capability, ItemError};
use thiserror::Error;

/// Typed failure from a storage operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The named table does not exist in this store.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// The named index does not exist on the table.
    #[error("unknown index '{index}' on table '{table}'")]
    UnknownIndex {
        /// Table queried.
        table: String,
        /// Index requested.
        index: String,
    },

    /// A table was re-created with a conflicting specification.
    ///
    /// The partition key of an existing table is immutable; activation
    /// against a store that already holds a differently-shaped table of the
    /// same name is a deployment defect.
    #[error("table '{0}' already exists with a different specification")]
    SchemaConflict(String),

    /// A required record was absent.
    ///
    /// `get` reports absence as `Ok(None)`; this variant is for operations
    /// that require presence, such as a conditional update.
    #[error("record not found in table '{0}'")]
    NotFound(String),

    /// A conditional write's condition did not hold.
    ///
    /// Surfaced to callers as a retryable conflict.
    #[error("condition failed for key {key} in table '{table}'")]
    ConditionFailed {
        /// Table written.
        table: String,
        /// Rendered primary key of the contested record.
        key: String,
    },

    /// The store rejected the operation due to load. Retryable.
    #[error("throttled by table '{0}'")]
    Throttled(String),

    /// The store is temporarily unreachable. Retryable.
    #[error("storage unavailable")]
    Unavailable,

    /// A binding attempted an operation it holds no grant for.
    ///
    /// This is a composition defect, not a request-level error: the grant
    /// registry never declared the capability for this binding.
    #[error("access denied: binding '{binding}' lacks {required} on table '{table}'")]
    AccessDenied {
        /// The binding that attempted the operation.
        binding: String,
        /// The table it targeted.
        table: String,
        /// The capability the operation required.
        required: Capability,
    },

    /// An item did not conform to the table's key schema.
    #[error("malformed item for table '{table}': {source}")]
    MalformedItem {
        /// Table written.
        table: String,
        /// Underlying key-extraction failure.
        #[source]
        source: ItemError,
    },

    /// A query used a sort-key range against a schema with no sort key.
    #[error("table or index '{0}' has no sort key; only a full-partition query is supported")]
    NoSortKey(String),
}

impl StorageError {
    /// Whether the caller may retry the operation after backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::Unavailable)
    }
}
