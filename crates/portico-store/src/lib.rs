//! # portico-store — In-Memory Document/Key-Value Engine
//!
//! The storage half of the Portico stack. A `MemoryStore` holds tables
//! created from `TableSpec`s, supports get/query/put/delete/batch-write with
//! typed failures, and keeps the seed-completion ledger that makes
//! deployment-time seeding idempotent.
//!
//! ## The Platform Boundary
//!
//! Compute bindings never touch the engine directly. Each binding receives a
//! [`StoreClient`] carrying that binding's frozen [`GrantSet`]; the client
//! checks the required capability before every operation and rejects
//! ungranted access with [`StorageError::AccessDenied`]. Enforcement lives
//! here, outside handler logic, so a missing grant cannot be papered over
//! by the binding itself.
//!
//! ## Concurrency
//!
//! The engine is shared across concurrent requests behind a
//! `parking_lot::RwLock`. Read-then-write flows must use a conditional put
//! keyed on the full primary key; a violated condition surfaces as
//! `ConditionFailed`, never a silent overwrite.
//!
//! ## Crate Policy
//!
//! - Depends only on `portico-core` internally.
//! - All failures are typed; `NotFound` on `get` is a normal `None`, not
//!   an error.

pub mod client;
pub mod error;
pub mod store;
mod table;

pub use client::StoreClient;
pub use error::StorageError;
pub use store::{BatchWriteFailure, KeyRange, MemoryStore, SeedMarker, WriteCondition};
