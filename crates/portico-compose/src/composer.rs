//! # Composer and Deployment
//!
//! `Composer` is the single-threaded builder for the whole composition
//! graph; `Deployment` is the frozen result. Declarations return typed
//! handles, and later declarations reference entities only through those
//! handles — never by name — so the graph cannot contain a dangling
//! reference.
//!
//! Validation that needs the whole graph (required configuration keys,
//! seed key coverage) is deferred to `build()`; everything that can be
//! checked locally (duplicate names, wildcard ambiguity) fails at the
//! declaring call.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use portico_core::{
    BillingMode, Capability, ConfigMap, GrantSet, IndexSpec, Item, KeyAttribute, KeySchema,
    TableSpec,
};

use crate::binding::{BindingSpec, Limits};
use crate::error::CompositionError;
use crate::routes::{MethodBinding, RouteTree, Verb};
use crate::seed::{SeedAssignment, SeedSpec};

/// Issues a distinct id per composer so foreign handles are detectable.
static COMPOSER_IDS: AtomicU32 = AtomicU32::new(0);

macro_rules! declare_handle {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            composer: u32,
            index: usize,
        }

        impl $name {
            const KIND: &'static str = $kind;
        }
    };
}

declare_handle!(
    /// Reference to a registered table.
    TableHandle,
    "table"
);
declare_handle!(
    /// Reference to a registered compute binding.
    BindingHandle,
    "binding"
);
declare_handle!(
    /// Reference to a registered authorizer.
    AuthorizerHandle,
    "authorizer"
);
declare_handle!(
    /// Reference to a route-tree node.
    RouteHandle,
    "route"
);

/// Authorization requirement on one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    /// The method is open; no gate runs.
    None,
    /// The method is gated by the referenced authorizer.
    Custom(AuthorizerHandle),
}

/// The frozen declaration of one authorization gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizerSpec {
    /// Authorizer name, unique within a deployment.
    pub name: String,
    /// Request header carrying the credential (lowercase).
    pub identity_header: String,
    /// Index of the compute binding that makes the allow/deny decision.
    pub decision_binding: usize,
    /// Decision-cache time-to-live. Zero mandates fresh evaluation on
    /// every request.
    pub cache_ttl: Duration,
}

/// The single-threaded composition builder.
#[derive(Debug)]
pub struct Composer {
    id: u32,
    base_config: ConfigMap,
    tables: Vec<TableSpec>,
    bindings: Vec<BindingSpec>,
    grants: Vec<GrantSet>,
    authorizers: Vec<AuthorizerSpec>,
    seeds: Vec<SeedSpec>,
    routes: RouteTree,
}

impl Composer {
    /// Start composing with the deployment's base configuration.
    ///
    /// Every binding's effective configuration is this base merged with the
    /// binding's own overrides.
    pub fn new(base_config: ConfigMap) -> Self {
        Self {
            id: COMPOSER_IDS.fetch_add(1, Ordering::Relaxed),
            base_config,
            tables: Vec::new(),
            bindings: Vec::new(),
            grants: Vec::new(),
            authorizers: Vec::new(),
            seeds: Vec::new(),
            routes: RouteTree::new(),
        }
    }

    // ── Storage schema ───────────────────────────────────────────────

    /// Define a table with a partition key and optional sort key.
    pub fn table(
        &mut self,
        name: impl Into<String>,
        partition: KeyAttribute,
        sort: Option<KeyAttribute>,
    ) -> Result<TableHandle, CompositionError> {
        let name = name.into();
        if self.tables.iter().any(|t| t.name == name) {
            return Err(CompositionError::DuplicateTable(name));
        }
        let index = self.tables.len();
        self.tables
            .push(TableSpec::new(name, KeySchema::new(partition, sort)));
        Ok(TableHandle {
            composer: self.id,
            index,
        })
    }

    /// Add a secondary index to a table.
    ///
    /// The index partition key need not match the table's.
    pub fn index(
        &mut self,
        table: TableHandle,
        name: impl Into<String>,
        partition: KeyAttribute,
        sort: Option<KeyAttribute>,
    ) -> Result<(), CompositionError> {
        let table_idx = self.check_table(table)?;
        let name = name.into();
        let spec = &mut self.tables[table_idx];
        if spec.indexes.iter().any(|ix| ix.name == name) {
            return Err(CompositionError::DuplicateIndex {
                table: spec.name.clone(),
                index: name,
            });
        }
        spec.indexes.push(IndexSpec {
            name,
            key_schema: KeySchema::new(partition, sort),
        });
        Ok(())
    }

    /// Override a table's billing mode (on-demand by default).
    pub fn billing(
        &mut self,
        table: TableHandle,
        mode: BillingMode,
    ) -> Result<(), CompositionError> {
        let idx = self.check_table(table)?;
        self.tables[idx].billing = mode;
        Ok(())
    }

    /// The name a table handle refers to.
    pub fn table_name(&self, table: TableHandle) -> Result<&str, CompositionError> {
        let idx = self.check_table(table)?;
        Ok(&self.tables[idx].name)
    }

    // ── Compute bindings ─────────────────────────────────────────────

    /// Define a compute binding.
    ///
    /// `overrides` are merged over the base configuration (override wins);
    /// `required_keys` name baseline keys that must be present in the
    /// merged result, checked at [`Composer::build()`].
    pub fn binding(
        &mut self,
        name: impl Into<String>,
        entry: impl Into<String>,
        overrides: ConfigMap,
        required_keys: &[&str],
        limits: Limits,
    ) -> Result<BindingHandle, CompositionError> {
        let name = name.into();
        if self.bindings.iter().any(|b| b.name == name) {
            return Err(CompositionError::DuplicateBinding(name));
        }
        let index = self.bindings.len();
        self.bindings.push(BindingSpec {
            name,
            entry: entry.into(),
            config: ConfigMap::merged(&self.base_config, &overrides),
            required_keys: required_keys.iter().map(|k| k.to_string()).collect(),
            limits,
        });
        self.grants.push(GrantSet::new());
        Ok(BindingHandle {
            composer: self.id,
            index,
        })
    }

    // ── Permission grants ────────────────────────────────────────────

    /// Grant a binding a capability on a table.
    ///
    /// Idempotent: repeating a grant is a no-op, and capabilities on the
    /// same table merge monotonically.
    pub fn grant(
        &mut self,
        binding: BindingHandle,
        table: TableHandle,
        capability: Capability,
    ) -> Result<(), CompositionError> {
        let binding_idx = self.check_binding(binding)?;
        let table_idx = self.check_table(table)?;
        let table_name = self.tables[table_idx].name.clone();
        self.grants[binding_idx].add(table_name, capability);
        Ok(())
    }

    // ── Authorizers ──────────────────────────────────────────────────

    /// Define an authorization gate.
    ///
    /// `identity_header` names the request header carrying the credential;
    /// `decision` is the binding invoked to decide; `cache_ttl` of zero
    /// mandates a fresh decision per request.
    pub fn authorizer(
        &mut self,
        name: impl Into<String>,
        identity_header: impl Into<String>,
        decision: BindingHandle,
        cache_ttl: Duration,
    ) -> Result<AuthorizerHandle, CompositionError> {
        let name = name.into();
        if self.authorizers.iter().any(|a| a.name == name) {
            return Err(CompositionError::DuplicateAuthorizer(name));
        }
        let decision_binding = self.check_binding(decision)?;
        let index = self.authorizers.len();
        self.authorizers.push(AuthorizerSpec {
            name,
            identity_header: identity_header.into().to_ascii_lowercase(),
            decision_binding,
            cache_ttl,
        });
        Ok(AuthorizerHandle {
            composer: self.id,
            index,
        })
    }

    // ── Seeds ────────────────────────────────────────────────────────

    /// Declare a one-shot seed under a stable identifier.
    pub fn seed(
        &mut self,
        stable_id: impl Into<String>,
        assignments: Vec<(TableHandle, Vec<Item>)>,
    ) -> Result<(), CompositionError> {
        let stable_id = stable_id.into();
        if self.seeds.iter().any(|s| s.stable_id == stable_id) {
            return Err(CompositionError::DuplicateSeed(stable_id));
        }
        let mut resolved = Vec::with_capacity(assignments.len());
        for (table, items) in assignments {
            let table_idx = self.check_table(table)?;
            resolved.push(SeedAssignment {
                table: self.tables[table_idx].name.clone(),
                items,
            });
        }
        self.seeds.push(SeedSpec {
            stable_id,
            assignments: resolved,
        });
        Ok(())
    }

    // ── Route tree ───────────────────────────────────────────────────

    /// The root route node.
    pub fn root(&self) -> RouteHandle {
        RouteHandle {
            composer: self.id,
            index: self.routes.root(),
        }
    }

    /// Add a child segment under a node. `{name}` declares a wildcard
    /// capture; at most one wildcard child per parent.
    pub fn child(
        &mut self,
        parent: RouteHandle,
        segment: &str,
    ) -> Result<RouteHandle, CompositionError> {
        let parent_idx = self.check_route(parent)?;
        let index = self.routes.add_child(parent_idx, segment)?;
        Ok(RouteHandle {
            composer: self.id,
            index,
        })
    }

    /// Bind a verb on a node, optionally to a compute binding and
    /// optionally behind an authorizer. A method with no binding is a
    /// declared stub.
    pub fn method(
        &mut self,
        node: RouteHandle,
        verb: Verb,
        binding: Option<BindingHandle>,
        auth: AuthRequirement,
    ) -> Result<(), CompositionError> {
        let node_idx = self.check_route(node)?;
        let binding_idx = match binding {
            Some(handle) => Some(self.check_binding(handle)?),
            None => None,
        };
        let authorizer_idx = match auth {
            AuthRequirement::None => None,
            AuthRequirement::Custom(handle) => Some(self.check_authorizer(handle)?),
        };
        self.routes.add_method(
            node_idx,
            verb,
            MethodBinding {
                binding: binding_idx,
                authorizer: authorizer_idx,
            },
        )
    }

    // ── Build ────────────────────────────────────────────────────────

    /// Run deferred validations and freeze the graph.
    pub fn build(self) -> Result<Deployment, CompositionError> {
        // Required baseline keys must survive the merge.
        for binding in &self.bindings {
            for key in &binding.required_keys {
                if !binding.config.contains(key) {
                    return Err(CompositionError::InvalidConfig {
                        binding: binding.name.clone(),
                        missing_key: key.clone(),
                    });
                }
            }
        }

        // Every seed item must carry its table's full primary key; a seed
        // keyed any other way could not be re-run without duplicating rows.
        for seed in &self.seeds {
            for assignment in &seed.assignments {
                // Assignments were resolved through table handles, so the
                // lookup cannot miss.
                let Some(spec) = self.tables.iter().find(|t| t.name == assignment.table) else {
                    continue;
                };
                for item in &assignment.items {
                    item.primary_key(&spec.key_schema).map_err(|source| {
                        CompositionError::SeedItemKey {
                            stable_id: seed.stable_id.clone(),
                            table: assignment.table.clone(),
                            source,
                        }
                    })?;
                }
            }
        }

        Ok(Deployment {
            tables: self.tables,
            bindings: self.bindings,
            grants: self.grants,
            authorizers: self.authorizers,
            seeds: self.seeds,
            routes: self.routes,
        })
    }

    // ── Handle checks ────────────────────────────────────────────────

    fn check_table(&self, handle: TableHandle) -> Result<usize, CompositionError> {
        if handle.composer != self.id || handle.index >= self.tables.len() {
            return Err(CompositionError::ForeignHandle {
                kind: TableHandle::KIND,
            });
        }
        Ok(handle.index)
    }

    fn check_binding(&self, handle: BindingHandle) -> Result<usize, CompositionError> {
        if handle.composer != self.id || handle.index >= self.bindings.len() {
            return Err(CompositionError::ForeignHandle {
                kind: BindingHandle::KIND,
            });
        }
        Ok(handle.index)
    }

    fn check_authorizer(&self, handle: AuthorizerHandle) -> Result<usize, CompositionError> {
        if handle.composer != self.id || handle.index >= self.authorizers.len() {
            return Err(CompositionError::ForeignHandle {
                kind: AuthorizerHandle::KIND,
            });
        }
        Ok(handle.index)
    }

    fn check_route(&self, handle: RouteHandle) -> Result<usize, CompositionError> {
        if handle.composer != self.id || handle.index >= self.routes.len() {
            return Err(CompositionError::ForeignHandle {
                kind: RouteHandle::KIND,
            });
        }
        Ok(handle.index)
    }
}

/// The frozen composition graph. Immutable after `build()`; all request-time
/// code reads it through shared references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    tables: Vec<TableSpec>,
    bindings: Vec<BindingSpec>,
    grants: Vec<GrantSet>,
    authorizers: Vec<AuthorizerSpec>,
    seeds: Vec<SeedSpec>,
    routes: RouteTree,
}

impl Deployment {
    /// All table specs.
    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    /// All binding specs, indexed as `MethodBinding::binding` refers.
    pub fn bindings(&self) -> &[BindingSpec] {
        &self.bindings
    }

    /// The grant set frozen for one binding.
    pub fn grant_set(&self, binding: usize) -> &GrantSet {
        &self.grants[binding]
    }

    /// All authorizer specs, indexed as `MethodBinding::authorizer` refers.
    pub fn authorizers(&self) -> &[AuthorizerSpec] {
        &self.authorizers
    }

    /// All declared seeds.
    pub fn seeds(&self) -> &[SeedSpec] {
        &self.seeds
    }

    /// The route tree.
    pub fn routes(&self) -> &RouteTree {
        &self.routes
    }
}
