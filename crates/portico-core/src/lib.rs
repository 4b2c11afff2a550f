//! # portico-core — Foundational Types for the Portico Stack
//!
//! This crate is the bedrock of the Portico workspace. It defines the shared
//! vocabulary that the storage engine, the composition builder, and the
//! gateway all speak. Every other crate in the workspace depends on
//! `portico-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Key values are totally ordered.** `KeyValue` carries its own `Ord`
//!    so range queries within a partition have one deterministic order,
//!    independent of which component performs the sort.
//!
//! 2. **Items derive their own primary keys.** `Item::primary_key()` extracts
//!    the key from the item's fields against a `KeySchema`. Nothing in the
//!    system generates a fresh identifier for a stored record — this is what
//!    makes seeding idempotent.
//!
//! 3. **Capabilities merge monotonically.** Granting `Read` then `Write`
//!    yields `ReadWrite`; granting the same capability twice is a no-op.
//!
//! 4. **Configuration is immutable and merged functionally.** `ConfigMap`
//!    has no shared mutable form; per-binding overrides win on key collision
//!    at merge time, and the result is frozen.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `portico-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize` where representable.

pub mod config;
pub mod grants;
pub mod item;
pub mod key;
pub mod schema;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use config::ConfigMap;
pub use grants::{Capability, GrantSet};
pub use item::{Item, ItemError, PrimaryKey};
pub use key::{KeyAttribute, KeySchema, KeyType, KeyValue};
pub use schema::{BillingMode, IndexSpec, TableSpec};
pub use temporal::Timestamp;
