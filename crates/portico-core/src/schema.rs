//! # Table and Index Specifications
//!
//! The declarative shape of a storage table: name, key schema, secondary
//! indexes, and billing mode. Specs are produced by the composition builder
//! and consumed by the storage engine at activation time.
//!
//! A spec is data, not a live table. The partition key is immutable once the
//! table exists; the engine rejects a conflicting re-create.

use serde::{Deserialize, Serialize};

use crate::key::KeySchema;

/// Capacity/billing mode for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingMode {
    /// Capacity scales with demand; no fixed throughput.
    OnDemand,
    /// Fixed provisioned throughput.
    Provisioned {
        /// Read units per second.
        read_units: u32,
        /// Write units per second.
        write_units: u32,
    },
}

impl Default for BillingMode {
    fn default() -> Self {
        Self::OnDemand
    }
}

/// A secondary index over a table.
///
/// The index partition key need not match the table's; a query against the
/// index is ordered by the index's own sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name, unique within its table.
    pub name: String,
    /// The index's own key schema.
    pub key_schema: KeySchema,
}

/// The declarative specification of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name, unique within a deployment.
    pub name: String,
    /// Primary key schema.
    pub key_schema: KeySchema,
    /// Secondary indexes, each named uniquely within the table.
    pub indexes: Vec<IndexSpec>,
    /// Billing/capacity mode.
    pub billing: BillingMode,
}

impl TableSpec {
    /// Create a table spec with no indexes and on-demand billing.
    pub fn new(name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            name: name.into(),
            key_schema,
            indexes: Vec::new(),
            billing: BillingMode::default(),
        }
    }

    /// Look up an index by name.
    pub fn index(&self, name: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|ix| ix.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyAttribute;

    #[test]
    fn test_default_billing_is_on_demand() {
        let spec = TableSpec::new(
            "movieReviews",
            KeySchema::new(
                KeyAttribute::number("movieId"),
                Some(KeyAttribute::string("reviewDate")),
            ),
        );
        assert_eq!(spec.billing, BillingMode::OnDemand);
        assert!(spec.indexes.is_empty());
    }

    #[test]
    fn test_index_lookup() {
        let mut spec = TableSpec::new(
            "movieReviews",
            KeySchema::new(KeyAttribute::number("movieId"), None),
        );
        spec.indexes.push(IndexSpec {
            name: "rvrName".into(),
            key_schema: KeySchema::new(KeyAttribute::string("reviewerName"), None),
        });
        assert!(spec.index("rvrName").is_some());
        assert!(spec.index("missing").is_none());
    }
}
