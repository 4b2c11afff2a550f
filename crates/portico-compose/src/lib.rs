//! # portico-compose — The Declarative Composition Graph
//!
//! Assembles a deployable service from declarations: tables and secondary
//! indexes, compute bindings with merged configuration, permission grants,
//! seed operations, a route tree with per-method authorizer overrides, and
//! authorization-gate descriptors.
//!
//! ## Handles, Not Names
//!
//! Every `Composer` method that registers an entity returns a typed,
//! copyable handle (`TableHandle`, `BindingHandle`, …). Later declarations
//! reference entities only by handle, so a dangling reference is
//! unrepresentable: a handle exists only because its entity was registered,
//! and handles from a different composer are rejected as foreign.
//!
//! ## Construct, Validate, Freeze
//!
//! Composition is single-threaded and dependency-ordered. `Composer::build()`
//! runs the deferred validations (required configuration keys, seed key
//! coverage) and freezes the graph into an immutable [`Deployment`]. Nothing
//! mutates the graph after that point — request-time code only reads it.
//!
//! ## Crate Policy
//!
//! - Depends only on `portico-core` internally; knows nothing about the
//!   storage engine or the gateway.
//! - Every failed declaration is a typed [`CompositionError`], fatal before
//!   anything is exposed.

pub mod binding;
pub mod composer;
pub mod error;
pub mod routes;
pub mod seed;

pub use binding::{BindingSpec, Limits};
pub use composer::{
    AuthRequirement, AuthorizerHandle, AuthorizerSpec, BindingHandle, Composer, Deployment,
    RouteHandle, TableHandle,
};
pub use error::CompositionError;
pub use routes::{MethodBinding, RouteEntry, RouteMatch, RouteNode, RouteTree, Segment, Verb};
pub use seed::{SeedAssignment, SeedSpec};
