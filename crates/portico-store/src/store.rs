//! # MemoryStore — the shared storage engine
//!
//! Tables live behind a single `parking_lot::RwLock`; reads take the shared
//! lock, writes the exclusive one. No operation holds the lock across an
//! await point — every engine call is synchronous and bounded.
//!
//! The store also owns the **seed ledger**: a map from seed stable-id to
//! completion marker. The ledger is what makes the deployment-time seed
//! operation idempotent across redeployments against the same store.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use portico_core::{Item, KeyValue, PrimaryKey, TableSpec, Timestamp};

use crate::error::StorageError;
use crate::table::TableData;

/// Sort-key constraint for a query within one partition.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyRange {
    /// Every item in the partition.
    All,
    /// Exactly one sort-key value.
    Eq(KeyValue),
    /// Inclusive range `lo..=hi`.
    Between {
        /// Lower bound, inclusive.
        lo: KeyValue,
        /// Upper bound, inclusive.
        hi: KeyValue,
    },
    /// String sort keys starting with the given prefix.
    BeginsWith(String),
}

impl KeyRange {
    /// Whether a sort-key value (absent on partition-only schemas) falls in
    /// this range.
    pub fn contains(&self, sort: Option<&KeyValue>) -> bool {
        match (self, sort) {
            (Self::All, _) => true,
            (Self::Eq(v), Some(s)) => s == v,
            (Self::Between { lo, hi }, Some(s)) => lo <= s && s <= hi,
            (Self::BeginsWith(prefix), Some(KeyValue::S(s))) => s.starts_with(prefix),
            _ => false,
        }
    }
}

/// Condition attached to a `put`, keyed on the full primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// The key must already exist (update semantics).
    KeyMustExist,
    /// The key must not exist yet (insert semantics).
    KeyMustNotExist,
}

/// Completion record for one seed stable-id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedMarker {
    /// SHA-256 fingerprint of the seed content that was applied.
    pub fingerprint: String,
    /// When the seed completed.
    pub applied_at: Timestamp,
}

/// Failure partway through a batch write.
///
/// Items before `written` are in the store; the failing item and everything
/// after it are not. Callers that need all-or-nothing semantics (the seed
/// operation) must treat this as a fatal, retryable outcome.
#[derive(Debug, Clone)]
pub struct BatchWriteFailure {
    /// Number of items written before the failure.
    pub written: usize,
    /// The error that stopped the batch.
    pub error: StorageError,
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, TableData>,
    seeds: BTreeMap<String, SeedMarker>,
    faults: VecDeque<StorageError>,
}

/// The in-memory storage engine, safe to share across concurrent requests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// An empty store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table from its spec.
    ///
    /// Idempotent for an identical spec (a redeploy against the same store
    /// is a no-op); a conflicting spec for an existing name is rejected,
    /// since the partition key of a live table is immutable.
    pub fn create_table(&self, spec: &TableSpec) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        match inner.tables.get(&spec.name) {
            Some(existing) if existing.spec == *spec => Ok(()),
            Some(_) => Err(StorageError::SchemaConflict(spec.name.clone())),
            None => {
                inner.tables.insert(spec.name.clone(), TableData::new(spec.clone()));
                Ok(())
            }
        }
    }

    /// The spec of a table, if it exists.
    pub fn table_spec(&self, table: &str) -> Option<TableSpec> {
        self.inner.read().tables.get(table).map(|t| t.spec.clone())
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.inner.read().tables.keys().cloned().collect()
    }

    /// Number of items in a table.
    pub fn item_count(&self, table: &str) -> Result<usize, StorageError> {
        let inner = self.inner.read();
        let data = inner
            .tables
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        Ok(data.len())
    }

    /// Fetch one item by its full primary key. Absence is `Ok(None)`.
    pub fn get(&self, table: &str, key: &PrimaryKey) -> Result<Option<Item>, StorageError> {
        self.take_fault()?;
        let inner = self.inner.read();
        let data = inner
            .tables
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        Ok(data.get(key))
    }

    /// Query one partition, ordered by sort key; `index` selects a secondary
    /// index whose own key schema applies.
    pub fn query(
        &self,
        table: &str,
        partition: &KeyValue,
        range: &KeyRange,
        index: Option<&str>,
    ) -> Result<Vec<Item>, StorageError> {
        self.take_fault()?;
        let inner = self.inner.read();
        let data = inner
            .tables
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        data.query(partition, range, index)
    }

    /// Insert or overwrite one item, optionally guarded by a condition on
    /// the full primary key.
    pub fn put(
        &self,
        table: &str,
        item: Item,
        condition: Option<WriteCondition>,
    ) -> Result<(), StorageError> {
        self.take_fault()?;
        let mut inner = self.inner.write();
        let data = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        data.put(item, condition)
    }

    /// Remove one item by key. Returns whether an item was present.
    pub fn delete(&self, table: &str, key: &PrimaryKey) -> Result<bool, StorageError> {
        self.take_fault()?;
        let mut inner = self.inner.write();
        let data = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        Ok(data.delete(key))
    }

    /// Write a batch of items in order, stopping at the first rejection.
    ///
    /// Items carry their own keys, so re-running a batch overwrites rather
    /// than duplicates.
    pub fn batch_write(
        &self,
        table: &str,
        items: &[Item],
    ) -> Result<usize, BatchWriteFailure> {
        for (written, item) in items.iter().enumerate() {
            self.put(table, item.clone(), None)
                .map_err(|error| BatchWriteFailure { written, error })?;
        }
        Ok(items.len())
    }

    // ── Seed ledger ──────────────────────────────────────────────────

    /// The completion marker for a seed stable-id, if one was recorded.
    pub fn seed_applied(&self, stable_id: &str) -> Option<SeedMarker> {
        self.inner.read().seeds.get(stable_id).cloned()
    }

    /// Record a seed as complete. Called only after every item landed.
    pub fn record_seed(&self, stable_id: &str, fingerprint: &str) {
        self.inner.write().seeds.insert(
            stable_id.to_string(),
            SeedMarker {
                fingerprint: fingerprint.to_string(),
                applied_at: Timestamp::now(),
            },
        );
    }

    // ── Fault injection ──────────────────────────────────────────────

    /// Queue an error to be returned by the next data-plane operation.
    ///
    /// Test hook for exercising the retry and seed-failure paths; the
    /// control plane (`create_table`, the seed ledger) is unaffected.
    pub fn inject_fault(&self, error: StorageError) {
        self.inner.write().faults.push_back(error);
    }

    fn take_fault(&self) -> Result<(), StorageError> {
        let fault = self.inner.write().faults.pop_front();
        match fault {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
