//! # Activation and Dispatch
//!
//! [`Gateway::activate`] turns a frozen deployment into a servable gateway:
//! it creates the storage schema, resolves every binding entry against the
//! registry, applies seeds through the idempotence ledger, and freezes one
//! grant-scoped [`StoreClient`] per binding. All of that is fatal before any
//! request is served; a half-activated gateway is unrepresentable.
//!
//! [`Gateway::handle`] is the whole per-request pipeline. Ordering matters:
//! resolution failures (404/405/501) are answered before the gate runs, and
//! a gate denial is answered before the handler or storage is touched.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use portico_compose::{AuthorizerSpec, Deployment, MethodBinding, RouteMatch, Verb};
use portico_store::{MemoryStore, StorageError, StoreClient};

use crate::auth::{AuthGate, AuthOutcome};
use crate::handler::{Handler, HandlerError, HandlerRegistry, Request, Response};

/// A seed that could not be fully applied.
///
/// The stable id stays unmarked in the ledger, so the next activation
/// retries; deterministic item keys make the retry overwrite what already
/// landed instead of duplicating it.
#[derive(Error, Debug)]
#[error("seed '{stable_id}' failed on table '{table}' after {written} of {total} items: {source}")]
pub struct SeedError {
    /// The failed seed's stable id.
    pub stable_id: String,
    /// Table the failing write targeted.
    pub table: String,
    /// Items written to that table before the failure.
    pub written: usize,
    /// Items destined for that table.
    pub total: usize,
    /// The underlying storage failure.
    #[source]
    pub source: StorageError,
}

/// A deployment that could not be activated. Fatal before exposure.
#[derive(Error, Debug)]
pub enum ActivationError {
    /// A binding's entry string has no registration of the required kind.
    #[error("binding '{binding}' entry '{entry}' has no registered {kind}")]
    UnresolvedEntry {
        /// The binding whose entry failed to resolve.
        binding: String,
        /// The unresolved entry string.
        entry: String,
        /// "handler" or "decider".
        kind: &'static str,
    },

    /// A seed could not be fully applied.
    #[error(transparent)]
    Seed(#[from] SeedError),

    /// Schema creation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One inbound request, transport-agnostic.
#[derive(Debug, Clone, Default)]
pub struct InboundCall {
    /// HTTP method, any case.
    pub method: String,
    /// Request path, e.g. `/movies/42/reviews`.
    pub path: String,
    /// Request headers. Keys are lowercased during dispatch.
    pub headers: HashMap<String, String>,
    /// Query-string parameters.
    pub query: HashMap<String, String>,
    /// Parsed JSON body, if any.
    pub body: Option<Value>,
}

/// The rendered result of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body. Empty object for bodyless statuses.
    pub body: Value,
    /// Response headers, in insertion order.
    pub headers: Vec<(String, String)>,
}

impl GatewayResponse {
    fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            // Every response is CORS-permissive, matching the composed API's
            // public-read posture.
            headers: vec![("access-control-allow-origin".into(), "*".into())],
        }
    }

    fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn error(status: u16, code: &str) -> Self {
        Self::new(status, json!({ "error": code }))
    }
}

/// One resolved, servable compute binding.
struct ActiveBinding {
    name: String,
    client: StoreClient,
    handler: Option<Arc<dyn Handler>>,
    timeout: std::time::Duration,
}

/// An activated deployment, ready to serve.
pub struct Gateway {
    deployment: Deployment,
    bindings: Vec<ActiveBinding>,
    gates: Vec<AuthGate>,
    store: Arc<MemoryStore>,
}

impl Gateway {
    /// Activate a deployment: schema, entry resolution, seeds, grants.
    pub fn activate(
        deployment: Deployment,
        registry: &HandlerRegistry,
        store: Arc<MemoryStore>,
    ) -> Result<Self, ActivationError> {
        for spec in deployment.tables() {
            store.create_table(spec)?;
        }

        let bindings = Self::resolve_bindings(&deployment, registry, &store)?;
        let gates = Self::resolve_gates(&deployment, registry)?;
        Self::apply_seeds(&deployment, &store)?;

        tracing::info!(
            tables = deployment.tables().len(),
            bindings = bindings.len(),
            gates = gates.len(),
            "gateway activated"
        );
        Ok(Self {
            deployment,
            bindings,
            gates,
            store,
        })
    }

    /// The activated deployment, for introspection (route listings).
    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// The backing store, for introspection and tests.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn resolve_bindings(
        deployment: &Deployment,
        registry: &HandlerRegistry,
        store: &Arc<MemoryStore>,
    ) -> Result<Vec<ActiveBinding>, ActivationError> {
        // Which bindings are route targets; only those need a handler. The
        // rest (authorizer decision bindings) resolve as deciders instead.
        let mut route_bound = vec![false; deployment.bindings().len()];
        for entry in deployment.routes().routes() {
            if let Some(index) = entry.binding {
                route_bound[index] = true;
            }
        }

        let mut bindings = Vec::with_capacity(deployment.bindings().len());
        for (index, spec) in deployment.bindings().iter().enumerate() {
            let handler = registry.resolve_handler(&spec.entry);
            if route_bound[index] && handler.is_none() {
                return Err(ActivationError::UnresolvedEntry {
                    binding: spec.name.clone(),
                    entry: spec.entry.clone(),
                    kind: "handler",
                });
            }
            bindings.push(ActiveBinding {
                name: spec.name.clone(),
                client: StoreClient::new(
                    store.clone(),
                    spec.name.clone(),
                    deployment.grant_set(index).clone(),
                ),
                handler,
                timeout: spec.limits.timeout,
            });
        }
        Ok(bindings)
    }

    fn resolve_gates(
        deployment: &Deployment,
        registry: &HandlerRegistry,
    ) -> Result<Vec<AuthGate>, ActivationError> {
        deployment
            .authorizers()
            .iter()
            .map(|spec: &AuthorizerSpec| {
                let binding = &deployment.bindings()[spec.decision_binding];
                let decider = registry.resolve_decider(&binding.entry).ok_or_else(|| {
                    ActivationError::UnresolvedEntry {
                        binding: binding.name.clone(),
                        entry: binding.entry.clone(),
                        kind: "decider",
                    }
                })?;
                Ok(AuthGate::new(
                    spec.name.clone(),
                    spec.identity_header.clone(),
                    decider,
                    spec.cache_ttl,
                    binding.limits.timeout,
                ))
            })
            .collect()
    }

    fn apply_seeds(deployment: &Deployment, store: &Arc<MemoryStore>) -> Result<(), SeedError> {
        for seed in deployment.seeds() {
            let fingerprint = seed.fingerprint();
            match store.seed_applied(&seed.stable_id) {
                Some(marker) if marker.fingerprint == fingerprint => {
                    tracing::debug!(stable_id = %seed.stable_id, "seed already applied, skipping");
                    continue;
                }
                Some(_) => {
                    tracing::info!(stable_id = %seed.stable_id, "seed content changed, re-applying");
                }
                None => {}
            }
            for assignment in &seed.assignments {
                store
                    .batch_write(&assignment.table, &assignment.items)
                    .map_err(|failure| SeedError {
                        stable_id: seed.stable_id.clone(),
                        table: assignment.table.clone(),
                        written: failure.written,
                        total: assignment.items.len(),
                        source: failure.error,
                    })?;
            }
            store.record_seed(&seed.stable_id, &fingerprint);
        }
        Ok(())
    }

    /// Dispatch one inbound call through the full pipeline.
    pub async fn handle(&self, call: InboundCall) -> GatewayResponse {
        let method = call.method.to_ascii_uppercase();
        let span = tracing::info_span!(
            "dispatch",
            request_id = %Uuid::new_v4(),
            method = %method,
            path = %call.path,
        );
        async {
            let response = self.dispatch(&method, call).await;
            tracing::info!(status = response.status, "dispatched");
            response
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, method: &str, call: InboundCall) -> GatewayResponse {
        let Some(matched) = self.deployment.routes().resolve(&call.path) else {
            return GatewayResponse::error(404, "not-found");
        };

        if method == "OPTIONS" {
            return self.preflight(&matched);
        }

        let Some(verb) = Verb::parse(method) else {
            return GatewayResponse::error(405, "method-not-allowed");
        };
        let Some(&MethodBinding {
            binding,
            authorizer,
        }) = matched.node.methods.get(&verb)
        else {
            if !matched.node.has_methods() {
                return GatewayResponse::error(404, "not-found");
            }
            return GatewayResponse::error(405, "method-not-allowed")
                .with_header("allow", self.allow_header(&matched));
        };
        let Some(binding_index) = binding else {
            return GatewayResponse::error(501, "not-implemented");
        };

        let headers = lowercase_keys(call.headers);
        let mut principal = None;
        if let Some(gate_index) = authorizer {
            match self.gates[gate_index].authorize(&headers).await {
                AuthOutcome::Allow(identity) => principal = identity,
                AuthOutcome::Deny(reason) => {
                    tracing::info!(gate = self.gates[gate_index].name(), %reason, "request denied");
                    return GatewayResponse::new(
                        403,
                        json!({ "error": "forbidden", "reason": reason.to_string() }),
                    );
                }
            }
        }

        let request = Request {
            path_params: matched.params,
            query: call.query,
            body: call.body,
            principal,
        };
        self.invoke(binding_index, request).await
    }

    /// CORS preflight: any node with at least one declared method answers
    /// 204; no compute binding is invoked.
    fn preflight(&self, matched: &RouteMatch<'_>) -> GatewayResponse {
        if !matched.node.has_methods() {
            return GatewayResponse::error(404, "not-found");
        }
        GatewayResponse::new(204, json!({}))
            .with_header("access-control-allow-methods", self.allow_header(matched))
            .with_header("access-control-allow-headers", "*")
    }

    fn allow_header(&self, matched: &RouteMatch<'_>) -> String {
        let mut verbs: Vec<&str> = matched
            .node
            .declared_verbs()
            .iter()
            .map(Verb::as_str)
            .collect();
        verbs.push("OPTIONS");
        verbs.join(",")
    }

    async fn invoke(&self, binding_index: usize, request: Request) -> GatewayResponse {
        let binding = &self.bindings[binding_index];
        // Route-bound bindings were checked at activation.
        let Some(handler) = binding.handler.as_ref() else {
            return GatewayResponse::error(501, "not-implemented");
        };

        let invocation = handler.invoke(request, binding.client.clone());
        match tokio::time::timeout(binding.timeout, invocation).await {
            Ok(Ok(response)) => GatewayResponse::new(response.status, response.body),
            Ok(Err(error)) => self.render_error(&binding.name, error),
            Err(_) => {
                tracing::error!(binding = %binding.name, "handler timed out");
                GatewayResponse::error(500, "internal-error")
            }
        }
    }

    /// Map handler failures to statuses. Internal detail never reaches the
    /// response body.
    fn render_error(&self, binding: &str, error: HandlerError) -> GatewayResponse {
        match error {
            HandlerError::Storage(StorageError::ConditionFailed { .. }) => {
                GatewayResponse::error(409, "conflict")
            }
            HandlerError::Storage(StorageError::NotFound { .. }) => {
                GatewayResponse::error(404, "not-found")
            }
            HandlerError::Storage(denied @ StorageError::AccessDenied { .. }) => {
                // A handler hitting an ungranted table is a composition bug,
                // not a caller error.
                tracing::error!(%binding, error = %denied, "binding exceeded its grants");
                GatewayResponse::error(500, "internal-error")
            }
            HandlerError::BadRequest(reason) => {
                GatewayResponse::new(400, json!({ "error": "bad-request", "reason": reason }))
            }
            HandlerError::Storage(error) => {
                tracing::error!(%binding, %error, "storage failure");
                GatewayResponse::error(500, "internal-error")
            }
            HandlerError::Internal(detail) => {
                tracing::error!(%binding, %detail, "handler failure");
                GatewayResponse::error(500, "internal-error")
            }
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("bindings", &self.bindings.len())
            .field("gates", &self.gates.len())
            .finish()
    }
}

fn lowercase_keys(headers: HashMap<String, String>) -> HashMap<String, String> {
    headers
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_keys() {
        let mut headers = HashMap::new();
        headers.insert("Cookie".to_string(), "session=valid".to_string());
        let lowered = lowercase_keys(headers);
        assert_eq!(lowered.get("cookie").map(String::as_str), Some("session=valid"));
    }
}
