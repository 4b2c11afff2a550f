//! # Configuration Maps
//!
//! An immutable key/value configuration record. Every compute binding
//! receives the deployment's base configuration merged with its own
//! overrides at composition time; there is no shared mutable configuration
//! anywhere in the system.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An ordered, immutable string-to-string configuration map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap {
    entries: BTreeMap<String, String>,
}

impl ConfigMap {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion for composition-time construction.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Functional merge: overrides win on key collision, inputs untouched.
    pub fn merged(base: &ConfigMap, overrides: &ConfigMap) -> ConfigMap {
        let mut entries = base.entries.clone();
        for (k, v) in &overrides.entries {
            entries.insert(k.clone(), v.clone());
        }
        ConfigMap { entries }
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins_on_collision() {
        let base = ConfigMap::new()
            .with("TABLE_NAME", "movieReviews")
            .with("REGION", "local");
        let overrides = ConfigMap::new().with("TABLE_NAME", "favouriteMovies");

        let merged = ConfigMap::merged(&base, &overrides);
        assert_eq!(merged.get("TABLE_NAME"), Some("favouriteMovies"));
        assert_eq!(merged.get("REGION"), Some("local"));
    }

    #[test]
    fn test_merge_does_not_mutate_inputs() {
        let base = ConfigMap::new().with("A", "1");
        let overrides = ConfigMap::new().with("A", "2");
        let _ = ConfigMap::merged(&base, &overrides);
        assert_eq!(base.get("A"), Some("1"));
        assert_eq!(overrides.get("A"), Some("2"));
    }

    #[test]
    fn test_merge_with_empty_base() {
        let merged = ConfigMap::merged(&ConfigMap::new(), &ConfigMap::new().with("K", "v"));
        assert_eq!(merged.get("K"), Some("v"));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_from_iterator() {
        let cfg: ConfigMap = [("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(cfg.get("A"), Some("1"));
        assert_eq!(cfg.get("B"), Some("2"));
    }

    #[test]
    fn test_iteration_is_key_ordered() {
        let cfg = ConfigMap::new().with("B", "2").with("A", "1");
        let keys: Vec<&str> = cfg.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }
}
