//! # portico-cli — Reference Deployment and Binary
//!
//! Ships the reference movie-review deployment: the composition graph in
//! [`movies`], its handler implementations in [`handlers`], and a binary
//! that prints the composed route table or activates and serves it.
//!
//! ## Crate Policy
//!
//! - Composition lives here, not in the domain crates: the graph is data,
//!   and this crate is the one place that knows the concrete movie API.
//! - Handlers delegate to their grant-scoped `StoreClient`; no storage
//!   access bypasses the grant boundary.

pub mod handlers;
pub mod movies;
