//! # Authorization Gate
//!
//! A gate fronts every method whose route declares an authorizer. It
//! extracts a credential from one declared request header, asks the
//! authorizer's decision binding whether that credential may proceed, and
//! caches the decision per credential for the configured TTL.
//!
//! A TTL of zero is not special-cased: the freshness check `age < ttl` can
//! never pass, so every request re-invokes the decider. That is the
//! reference deployment's configuration, and it trades latency for
//! immediate credential revocation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::handler::Decider;

/// The decision binding's verdict on one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the credential may proceed.
    pub allow: bool,
    /// Principal identity established by the decider, surfaced to handlers.
    pub principal: Option<String>,
    /// Reason rendered to the caller on deny.
    pub deny_reason: Option<String>,
}

impl Decision {
    /// An allowing decision carrying the established principal.
    pub fn allow(principal: impl Into<String>) -> Self {
        Self {
            allow: true,
            principal: Some(principal.into()),
            deny_reason: None,
        }
    }

    /// An allowing decision with no principal identity.
    pub fn allow_anonymous() -> Self {
        Self {
            allow: true,
            principal: None,
            deny_reason: None,
        }
    }

    /// A denying decision with a caller-visible reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            principal: None,
            deny_reason: Some(reason.into()),
        }
    }
}

/// Why a gated request was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The declared identity header was absent.
    MissingCredential,
    /// The decider evaluated the credential and said no.
    Rejected(String),
    /// The decider failed or timed out. Fail closed.
    DeciderFailed,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredential => f.write_str("missing-credential"),
            Self::Rejected(reason) => f.write_str(reason),
            Self::DeciderFailed => f.write_str("authorizer-failure"),
        }
    }
}

/// The gate's verdict on one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Proceed, with the principal the decider established.
    Allow(Option<String>),
    /// Reject with 403. The handler is never invoked.
    Deny(DenyReason),
}

struct CachedDecision {
    decision: Decision,
    at: Instant,
}

/// One activated authorization gate.
pub struct AuthGate {
    name: String,
    identity_header: String,
    decider: Arc<dyn Decider>,
    cache_ttl: Duration,
    decide_timeout: Duration,
    cache: RwLock<HashMap<String, CachedDecision>>,
}

impl AuthGate {
    /// Build a gate from its frozen spec parts and resolved decider.
    ///
    /// `decide_timeout` is the decision binding's invocation timeout.
    pub fn new(
        name: impl Into<String>,
        identity_header: impl Into<String>,
        decider: Arc<dyn Decider>,
        cache_ttl: Duration,
        decide_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            identity_header: identity_header.into(),
            decider,
            cache_ttl,
            decide_timeout,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The gate's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Authorize one request from its headers (keys lowercased by dispatch).
    pub async fn authorize(&self, headers: &HashMap<String, String>) -> AuthOutcome {
        let Some(credential) = headers.get(&self.identity_header) else {
            return AuthOutcome::Deny(DenyReason::MissingCredential);
        };

        if let Some(cached) = self.cached(credential) {
            return Self::outcome(cached);
        }

        let decided =
            tokio::time::timeout(self.decide_timeout, self.decider.decide(credential.clone()))
                .await;
        let decision = match decided {
            Ok(Ok(decision)) => decision,
            Ok(Err(error)) => {
                tracing::warn!(gate = %self.name, %error, "authorizer decision failed");
                return AuthOutcome::Deny(DenyReason::DeciderFailed);
            }
            Err(_) => {
                tracing::warn!(gate = %self.name, "authorizer decision timed out");
                return AuthOutcome::Deny(DenyReason::DeciderFailed);
            }
        };

        self.store_decision(credential, decision.clone());
        Self::outcome(decision)
    }

    /// Record a decision for reuse, evicting entries past their TTL so the
    /// map is bounded by the credentials seen within one TTL window. A zero
    /// TTL never stores: no lookup could ever find such an entry fresh, and
    /// credentials are caller-supplied.
    fn store_decision(&self, credential: &str, decision: Decision) {
        if self.cache_ttl.is_zero() {
            return;
        }
        let mut cache = self.cache.write();
        cache.retain(|_, entry| entry.at.elapsed() < self.cache_ttl);
        cache.insert(
            credential.to_string(),
            CachedDecision {
                decision,
                at: Instant::now(),
            },
        );
    }

    /// A cached decision still inside its TTL. With a zero TTL nothing is
    /// ever fresh.
    fn cached(&self, credential: &str) -> Option<Decision> {
        let cache = self.cache.read();
        let entry = cache.get(credential)?;
        if entry.at.elapsed() < self.cache_ttl {
            return Some(entry.decision.clone());
        }
        None
    }

    fn outcome(decision: Decision) -> AuthOutcome {
        if decision.allow {
            AuthOutcome::Allow(decision.principal)
        } else {
            AuthOutcome::Deny(DenyReason::Rejected(
                decision.deny_reason.unwrap_or_else(|| "forbidden".into()),
            ))
        }
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("name", &self.name)
            .field("identity_header", &self.identity_header)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}
