//! # Capabilities and Grant Sets
//!
//! A `Capability` names what a compute binding may do to a table; a
//! `GrantSet` is the frozen per-binding view the platform boundary consults
//! at request time. A binding with no grant on a table is rejected before
//! its own logic runs.
//!
//! Grants merge monotonically: `Read` then `Write` yields `ReadWrite`, and
//! granting the same capability twice changes nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What a binding may do to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Get and query operations only.
    Read,
    /// Put, delete, and batch-write operations only.
    Write,
    /// Both read and write operations.
    ReadWrite,
}

impl Capability {
    /// Whether this capability permits read operations.
    pub fn allows_read(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Whether this capability permits write operations.
    pub fn allows_write(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }

    /// The least capability covering both inputs.
    pub fn union(self, other: Self) -> Self {
        if self == other {
            return self;
        }
        Self::ReadWrite
    }

    /// Capability name as rendered in route tables and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "read-write",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The frozen set of grants held by one compute binding: table name to
/// capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSet {
    grants: BTreeMap<String, Capability>,
}

impl GrantSet {
    /// An empty grant set (every access is denied).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grant, merging with any existing capability on the table.
    ///
    /// Idempotent: adding an identical grant is a no-op.
    pub fn add(&mut self, table: impl Into<String>, capability: Capability) {
        let table = table.into();
        let merged = match self.grants.get(&table) {
            Some(existing) => existing.union(capability),
            None => capability,
        };
        self.grants.insert(table, merged);
    }

    /// The capability held on a table, if any.
    pub fn capability(&self, table: &str) -> Option<Capability> {
        self.grants.get(table).copied()
    }

    /// Whether reads on the table are permitted.
    pub fn allows_read(&self, table: &str) -> bool {
        self.capability(table).is_some_and(|c| c.allows_read())
    }

    /// Whether writes on the table are permitted.
    pub fn allows_write(&self, table: &str) -> bool {
        self.capability(table).is_some_and(|c| c.allows_write())
    }

    /// Iterate over `(table, capability)` pairs in table-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Capability)> {
        self.grants.iter().map(|(t, c)| (t.as_str(), *c))
    }

    /// Number of distinct tables granted.
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether no grants are held.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
