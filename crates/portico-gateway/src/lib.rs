//! # portico-gateway — Request-Time Execution
//!
//! Takes a frozen [`Deployment`](portico_compose::Deployment), resolves its
//! compute bindings against a [`HandlerRegistry`], materializes its storage
//! schema and seeds, and then serves requests: route resolution, per-method
//! authorization, handler invocation under a timeout, and error mapping to
//! HTTP statuses.
//!
//! ## Request Path
//!
//! ```text
//! InboundCall
//!   └─ resolve path          (404 / 405 / 501)
//!       └─ authorization gate (403, handler never invoked on deny)
//!           └─ handler under timeout, with a grant-scoped StoreClient
//!               └─ error mapping (409 / 404 / 400 / 500)
//! ```
//!
//! ## Crate Policy
//!
//! - Handlers never see the engine directly; they receive a
//!   [`StoreClient`](portico_store::StoreClient) carrying their binding's
//!   frozen grants.
//! - Denied requests never touch a handler or storage.
//! - Internal failures render a generic body; detail goes to the log only.

pub mod auth;
pub mod dispatch;
pub mod handler;
pub mod serve;

pub use auth::{AuthGate, AuthOutcome, Decision, DenyReason};
pub use dispatch::{ActivationError, Gateway, GatewayResponse, InboundCall, SeedError};
pub use handler::{Decider, Handler, HandlerError, HandlerRegistry, Request, Response};
