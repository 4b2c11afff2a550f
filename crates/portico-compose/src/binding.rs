//! # Compute Binding Specifications
//!
//! A compute binding is a named, independently invocable unit of
//! request-handling logic: an entry reference resolved to a handler at
//! activation time, a frozen configuration map, and resource limits.
//!
//! Bindings are created once at composition time and never mutated. The
//! configuration a binding sees is the deployment's base configuration
//! merged with the binding's own overrides — override wins on collision,
//! and the merge happens at declaration time, not at request time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use portico_core::ConfigMap;

/// Resource limits for one binding's invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Wall-clock budget for one invocation; elapsing it fails the request.
    pub timeout: Duration,
    /// Memory ceiling, advisory for the hosting runtime.
    pub memory_mb: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            memory_mb: 128,
        }
    }
}

/// The frozen declaration of one compute binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSpec {
    /// Logical name, unique within a deployment.
    pub name: String,
    /// Entry reference resolved against the handler registry at activation.
    pub entry: String,
    /// Effective configuration: base merged with per-binding overrides.
    pub config: ConfigMap,
    /// Baseline keys this binding requires; checked at build time.
    pub required_keys: Vec<String>,
    /// Invocation limits.
    pub limits: Limits,
}
