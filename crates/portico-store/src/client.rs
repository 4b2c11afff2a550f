//! # StoreClient — the grant-enforcing platform boundary
//!
//! Every compute binding reaches storage through a `StoreClient` carrying
//! that binding's frozen `GrantSet`. The client checks the required
//! capability before touching the engine — read operations need a read
//! grant, write operations a write grant — and rejects ungranted access
//! with `AccessDenied` regardless of what the handler intended.
//!
//! Retryable engine failures (`Throttled`, `Unavailable`) are retried here
//! with bounded exponential backoff; everything else propagates immediately.

use std::sync::Arc;
use std::time::Duration;

use portico_core::{Capability, GrantSet, Item, KeyValue, PrimaryKey};

use crate::error::StorageError;
use crate::store::{KeyRange, MemoryStore, WriteCondition};

/// Retry attempts for throttled/unavailable operations.
const MAX_ATTEMPTS: u32 = 3;
/// Backoff before the second attempt; doubles per retry.
const BASE_BACKOFF: Duration = Duration::from_millis(25);

/// A binding-scoped view of the store.
#[derive(Debug, Clone)]
pub struct StoreClient {
    store: Arc<MemoryStore>,
    binding: String,
    grants: GrantSet,
}

impl StoreClient {
    /// A client acting as `binding` with the given grants.
    pub fn new(store: Arc<MemoryStore>, binding: impl Into<String>, grants: GrantSet) -> Self {
        Self {
            store,
            binding: binding.into(),
            grants,
        }
    }

    /// The binding this client acts as.
    pub fn binding(&self) -> &str {
        &self.binding
    }

    /// Fetch one item by its full primary key. Requires a read grant.
    pub async fn get(
        &self,
        table: &str,
        key: &PrimaryKey,
    ) -> Result<Option<Item>, StorageError> {
        self.require(table, Capability::Read)?;
        self.with_retry(|| self.store.get(table, key)).await
    }

    /// Query one partition, ordered by sort key. Requires a read grant.
    pub async fn query(
        &self,
        table: &str,
        partition: &KeyValue,
        range: &KeyRange,
        index: Option<&str>,
    ) -> Result<Vec<Item>, StorageError> {
        self.require(table, Capability::Read)?;
        self.with_retry(|| self.store.query(table, partition, range, index))
            .await
    }

    /// Insert or overwrite one item. Requires a write grant.
    pub async fn put(
        &self,
        table: &str,
        item: Item,
        condition: Option<WriteCondition>,
    ) -> Result<(), StorageError> {
        self.require(table, Capability::Write)?;
        self.with_retry(|| self.store.put(table, item.clone(), condition))
            .await
    }

    /// Remove one item by key. Requires a write grant.
    pub async fn delete(&self, table: &str, key: &PrimaryKey) -> Result<bool, StorageError> {
        self.require(table, Capability::Write)?;
        self.with_retry(|| self.store.delete(table, key)).await
    }

    /// Write a batch of items in order. Requires a write grant.
    ///
    /// Batches are retried as a whole on throttling; items carry their own
    /// keys, so a retry overwrites what the first pass already wrote.
    pub async fn batch_write(&self, table: &str, items: &[Item]) -> Result<usize, StorageError> {
        self.require(table, Capability::Write)?;
        self.with_retry(|| {
            self.store
                .batch_write(table, items)
                .map_err(|failure| failure.error)
        })
        .await
    }

    fn require(&self, table: &str, required: Capability) -> Result<(), StorageError> {
        let held = match required {
            Capability::Read => self.grants.allows_read(table),
            Capability::Write | Capability::ReadWrite => self.grants.allows_write(table),
        };
        if held {
            return Ok(());
        }
        Err(StorageError::AccessDenied {
            binding: self.binding.clone(),
            table: table.to_string(),
            required,
        })
    }

    async fn with_retry<T>(
        &self,
        op: impl Fn() -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut backoff = BASE_BACKOFF;
        for attempt in 1..=MAX_ATTEMPTS {
            match op() {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        binding = %self.binding,
                        %error,
                        attempt,
                        "retrying storage operation after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(error) => return Err(error),
            }
        }
        // The loop always returns by the final attempt.
        Err(StorageError::Unavailable)
    }
}
