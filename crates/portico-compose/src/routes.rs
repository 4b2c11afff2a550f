//! # Route Tree
//!
//! A hierarchical namespace of path segments. Each node may expose HTTP
//! methods bound to a compute binding and, per method, an authorization
//! gate. Segments are literal (`reviews`) or a wildcard capture
//! (`{movieId}`); a parent holds at most one wildcard child.
//!
//! ## Resolution
//!
//! An inbound path is split on `/` and walked from the root: a literal
//! child matches exactly; when no literal matches, the wildcard child (if
//! any) matches and binds the segment text to its parameter name. Reaching
//! no node is distinguished from reaching a node with no binding for the
//! requested verb — the dispatcher maps the former to not-found and the
//! latter to method-not-allowed.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::CompositionError;

/// HTTP verbs a route node can bind.
///
/// OPTIONS is deliberately absent: preflight is satisfied automatically for
/// any node with at least one declared method, never bound explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verb {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP PATCH.
    Patch,
    /// HTTP DELETE.
    Delete,
}

impl Verb {
    /// All verbs, in canonical order.
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Put, Verb::Patch, Verb::Delete];

    /// Uppercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Parse an uppercase wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One path segment: a literal string or a named wildcard capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// Matches exactly this string.
    Literal(String),
    /// Matches any single segment, binding it to the parameter name.
    Param(String),
}

impl Segment {
    /// Parse a declared segment: `{name}` is a wildcard, anything else a
    /// literal. Empty segments, embedded slashes, and stray braces are
    /// rejected.
    pub fn parse(raw: &str) -> Result<Self, CompositionError> {
        if raw.is_empty() || raw.contains('/') {
            return Err(CompositionError::InvalidSegment(raw.to_string()));
        }
        if let Some(name) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if name.is_empty() || name.contains(['{', '}']) {
                return Err(CompositionError::InvalidSegment(raw.to_string()));
            }
            return Ok(Self::Param(name.to_string()));
        }
        if raw.contains(['{', '}']) {
            return Err(CompositionError::InvalidSegment(raw.to_string()));
        }
        Ok(Self::Literal(raw.to_string()))
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(s) => f.write_str(s),
            Self::Param(name) => write!(f, "{{{name}}}"),
        }
    }
}

/// The binding of one verb on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBinding {
    /// Index of the target compute binding in the deployment; `None` is a
    /// declared stub with no integration.
    pub binding: Option<usize>,
    /// Index of the authorizer gating this method, if any.
    pub authorizer: Option<usize>,
}

/// One node in the route tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteNode {
    /// The segment this node matches (the root matches the empty path).
    pub segment: Segment,
    /// Parent node index; the root has none.
    pub parent: Option<usize>,
    /// Literal children, segment string to node index.
    literal_children: BTreeMap<String, usize>,
    /// The single wildcard child, if any.
    wildcard_child: Option<usize>,
    /// Verb bindings on this node.
    pub methods: BTreeMap<Verb, MethodBinding>,
}

impl RouteNode {
    fn new(segment: Segment, parent: Option<usize>) -> Self {
        Self {
            segment,
            parent,
            literal_children: BTreeMap::new(),
            wildcard_child: None,
            methods: BTreeMap::new(),
        }
    }

    /// Whether any verb is declared on this node (preflight eligibility).
    pub fn has_methods(&self) -> bool {
        !self.methods.is_empty()
    }

    /// Verbs declared on this node, in canonical order.
    pub fn declared_verbs(&self) -> Vec<Verb> {
        self.methods.keys().copied().collect()
    }
}

/// A successful path resolution.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// The matched node.
    pub node: &'a RouteNode,
    /// Path parameters bound by wildcard segments along the walk.
    pub params: HashMap<String, String>,
}

/// One printable route-table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// The bound verb.
    pub verb: Verb,
    /// The full declared path (e.g., `/movies/{movieId}/reviews`).
    pub path: String,
    /// Target binding index, `None` for a stub.
    pub binding: Option<usize>,
    /// Gating authorizer index, if any.
    pub authorizer: Option<usize>,
}

/// The route tree: an arena of nodes rooted at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTree {
    nodes: Vec<RouteNode>,
}

impl RouteTree {
    /// A tree holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![RouteNode::new(Segment::Literal(String::new()), None)],
        }
    }

    /// The root node's index.
    pub fn root(&self) -> usize {
        0
    }

    /// The node at an index.
    pub fn node(&self, index: usize) -> &RouteNode {
        &self.nodes[index]
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Add a child under `parent`, parsing the raw segment.
    pub(crate) fn add_child(
        &mut self,
        parent: usize,
        raw_segment: &str,
    ) -> Result<usize, CompositionError> {
        let segment = Segment::parse(raw_segment)?;
        match &segment {
            Segment::Literal(s) => {
                if self.nodes[parent].literal_children.contains_key(s) {
                    return Err(CompositionError::DuplicateSegment(s.clone()));
                }
            }
            Segment::Param(name) => {
                if let Some(existing_idx) = self.nodes[parent].wildcard_child {
                    let existing = match &self.nodes[existing_idx].segment {
                        Segment::Param(n) => n.clone(),
                        Segment::Literal(s) => s.clone(),
                    };
                    if &existing == name {
                        return Err(CompositionError::DuplicateSegment(format!("{{{name}}}")));
                    }
                    return Err(CompositionError::AmbiguousWildcard {
                        existing,
                        attempted: name.clone(),
                    });
                }
            }
        }

        let index = self.nodes.len();
        self.nodes.push(RouteNode::new(segment.clone(), Some(parent)));
        match segment {
            Segment::Literal(s) => {
                self.nodes[parent].literal_children.insert(s, index);
            }
            Segment::Param(_) => {
                self.nodes[parent].wildcard_child = Some(index);
            }
        }
        Ok(index)
    }

    /// Bind a verb on a node.
    pub(crate) fn add_method(
        &mut self,
        node: usize,
        verb: Verb,
        method: MethodBinding,
    ) -> Result<(), CompositionError> {
        if self.nodes[node].methods.contains_key(&verb) {
            return Err(CompositionError::DuplicateMethod(verb));
        }
        self.nodes[node].methods.insert(verb, method);
        Ok(())
    }

    /// Resolve an inbound path to a node, binding wildcard parameters.
    ///
    /// Returns `None` when the walk reaches no node; the caller separately
    /// distinguishes a matched node with no binding for the requested verb.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_>> {
        let mut current = 0;
        let mut params = HashMap::new();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let node = &self.nodes[current];
            if let Some(&child) = node.literal_children.get(segment) {
                current = child;
                continue;
            }
            let child = node.wildcard_child?;
            if let Segment::Param(name) = &self.nodes[child].segment {
                params.insert(name.clone(), segment.to_string());
            }
            current = child;
        }

        Some(RouteMatch {
            node: &self.nodes[current],
            params,
        })
    }

    /// Every declared `(verb, path)` row, depth-first, for route-table
    /// printing and grant-coverage checks.
    pub fn routes(&self) -> Vec<RouteEntry> {
        let mut entries = Vec::new();
        self.collect_routes(0, String::new(), &mut entries);
        entries
    }

    fn collect_routes(&self, index: usize, prefix: String, entries: &mut Vec<RouteEntry>) {
        let node = &self.nodes[index];
        let path = if index == 0 {
            "/".to_string()
        } else {
            format!("{}/{}", if prefix == "/" { "" } else { &prefix }, node.segment)
        };

        for (verb, method) in &node.methods {
            entries.push(RouteEntry {
                verb: *verb,
                path: path.clone(),
                binding: method.binding,
                authorizer: method.authorizer,
            });
        }

        for &child in node.literal_children.values() {
            self.collect_routes(child, path.clone(), entries);
        }
        if let Some(child) = node.wildcard_child {
            self.collect_routes(child, path, entries);
        }
    }
}

impl Default for RouteTree {
    fn default() -> Self {
        Self::new()
    }
}
