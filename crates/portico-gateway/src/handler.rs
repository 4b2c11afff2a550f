//! # Handler Contract
//!
//! A compute binding's runtime behavior is a [`Handler`]: an async function
//! from a request plus a grant-scoped store client to a response. Authorizer
//! decision bindings implement [`Decider`] instead. Both are registered in a
//! [`HandlerRegistry`] under the entry string their `BindingSpec` declares,
//! and resolved exactly once at activation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

use portico_store::{StorageError, StoreClient};

use crate::auth::Decision;

/// What a handler invocation receives.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Wildcard captures from route resolution, parameter name to raw value.
    pub path_params: HashMap<String, String>,
    /// Query-string parameters.
    pub query: HashMap<String, String>,
    /// Parsed JSON body, if the request carried one.
    pub body: Option<Value>,
    /// Principal established by the authorization gate, if the method was
    /// gated.
    pub principal: Option<String>,
}

impl Request {
    /// A path parameter by name.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// The JSON body, or `BadRequest` if the request carried none.
    pub fn require_body(&self) -> Result<&Value, HandlerError> {
        self.body
            .as_ref()
            .ok_or_else(|| HandlerError::BadRequest("request body required".into()))
    }
}

/// What a handler invocation produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl Response {
    /// 200 with the given body.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// 201 with the given body.
    pub fn created(body: Value) -> Self {
        Self { status: 201, body }
    }

    /// 404 with a standard body.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: json!({ "error": "not-found" }),
        }
    }
}

/// A failed handler invocation.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Storage rejected an operation.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The request payload or parameters were unusable.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Anything else. Rendered as a generic 500; the detail is logged.
    #[error("internal: {0}")]
    Internal(String),
}

/// Boxed handler future.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, HandlerError>> + Send>>;

/// Boxed decider future.
pub type DecideFuture = Pin<Box<dyn Future<Output = Result<Decision, HandlerError>> + Send>>;

/// The runtime behavior of a route-bound compute binding.
pub trait Handler: Send + Sync {
    /// Handle one request with the binding's grant-scoped store client.
    fn invoke(&self, request: Request, store: StoreClient) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, StoreClient) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    fn invoke(&self, request: Request, store: StoreClient) -> HandlerFuture {
        Box::pin(self(request, store))
    }
}

/// The runtime behavior of an authorizer's decision binding.
pub trait Decider: Send + Sync {
    /// Decide whether the presented credential may proceed.
    fn decide(&self, credential: String) -> DecideFuture;
}

impl<F, Fut> Decider for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Decision, HandlerError>> + Send + 'static,
{
    fn decide(&self, credential: String) -> DecideFuture {
        Box::pin(self(credential))
    }
}

/// Entry-string registry resolved at activation.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
    deciders: HashMap<String, Arc<dyn Decider>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under an entry string. Chainable; last write wins.
    pub fn handler(mut self, entry: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(entry.into(), Arc::new(handler));
        self
    }

    /// Register a decider under an entry string. Chainable; last write wins.
    pub fn decider(mut self, entry: impl Into<String>, decider: impl Decider + 'static) -> Self {
        self.deciders.insert(entry.into(), Arc::new(decider));
        self
    }

    pub(crate) fn resolve_handler(&self, entry: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(entry).cloned()
    }

    pub(crate) fn resolve_decider(&self, entry: &str) -> Option<Arc<dyn Decider>> {
        self.deciders.get(entry).cloned()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("deciders", &self.deciders.keys().collect::<Vec<_>>())
            .finish()
    }
}
