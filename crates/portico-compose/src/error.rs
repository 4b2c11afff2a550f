//! # Composition Errors
//!
//! Every way a declaration can be rejected. All of these are fatal at
//! composition time: a graph that fails to build is never activated, so no
//! request-time code path observes a half-formed deployment.

use portico_core::ItemError;
use thiserror::Error;

use crate::routes::Verb;

/// A rejected declaration in the composition graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    /// A table name was registered twice.
    #[error("duplicate table name '{0}'")]
    DuplicateTable(String),

    /// An index name was registered twice on the same table.
    #[error("duplicate index '{index}' on table '{table}'")]
    DuplicateIndex {
        /// The owning table.
        table: String,
        /// The repeated index name.
        index: String,
    },

    /// A binding name was registered twice.
    #[error("duplicate binding name '{0}'")]
    DuplicateBinding(String),

    /// An authorizer name was registered twice.
    #[error("duplicate authorizer name '{0}'")]
    DuplicateAuthorizer(String),

    /// A seed stable-id was registered twice.
    #[error("duplicate seed stable-id '{0}'")]
    DuplicateSeed(String),

    /// A child segment already exists under the parent node.
    #[error("duplicate route segment '{0}' under the same parent")]
    DuplicateSegment(String),

    /// A second wildcard child was added under one parent.
    #[error("ambiguous wildcard: parent already has '{{{existing}}}', cannot add '{{{attempted}}}'")]
    AmbiguousWildcard {
        /// Parameter name of the existing wildcard child.
        existing: String,
        /// Parameter name of the rejected wildcard child.
        attempted: String,
    },

    /// A path segment was empty or malformed.
    #[error("invalid route segment {0:?}")]
    InvalidSegment(String),

    /// The verb is already bound on the node.
    #[error("duplicate method {0} on route node")]
    DuplicateMethod(Verb),

    /// A binding's merged configuration is missing a required baseline key.
    #[error("invalid config for binding '{binding}': required key '{missing_key}' absent after merge")]
    InvalidConfig {
        /// The binding whose configuration failed resolution.
        binding: String,
        /// The required key that no configuration layer supplied.
        missing_key: String,
    },

    /// A handle issued by a different composer was used.
    #[error("foreign {kind} handle: issued by a different composer")]
    ForeignHandle {
        /// The handle kind ("table", "binding", "authorizer", "route").
        kind: &'static str,
    },

    /// A seed item does not carry its table's full primary key.
    ///
    /// Seed keys must be deterministic — derived from the item's own fields
    /// — or re-running the seed would duplicate rows.
    #[error("seed '{stable_id}' has an item without a deterministic key for table '{table}': {source}")]
    SeedItemKey {
        /// The offending seed.
        stable_id: String,
        /// The table the item targets.
        table: String,
        /// The key-extraction failure.
        #[source]
        source: ItemError,
    },
}
