//! # Key Schemas and Ordered Key Values
//!
//! Defines the attribute types that can participate in a primary key, the
//! runtime values of those attributes, and the `(partition, sort?)` schema
//! shape shared by tables and secondary indexes.
//!
//! ## Ordering Invariant
//!
//! `KeyValue` implements a total order: numbers sort before strings, numbers
//! sort numerically, strings sort lexicographically by byte. Every range
//! query in the system is ordered by this one definition, so two components
//! can never disagree about result order.

use serde::{Deserialize, Serialize};

/// The type of a key attribute.
///
/// Only numbers and strings may participate in a primary key or index key.
/// Non-key attributes on an item are unconstrained JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// 64-bit signed integer key attribute.
    Number,
    /// UTF-8 string key attribute.
    String,
}

impl KeyType {
    /// Returns the type identifier string (`"N"` or `"S"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "N",
            Self::String => "S",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A runtime key value, totally ordered.
///
/// Within a table the schema fixes the variant, so ordering is natural
/// within a partition. The cross-variant order (numbers before strings)
/// exists only so `KeyValue` can live in ordered collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyValue {
    /// Numeric key value.
    N(i64),
    /// String key value.
    S(String),
}

impl KeyValue {
    /// The `KeyType` this value conforms to.
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::N(_) => KeyType::Number,
            Self::S(_) => KeyType::String,
        }
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (Self::N(a), Self::N(b)) => a.cmp(b),
            (Self::S(a), Self::S(b)) => a.cmp(b),
            (Self::N(_), Self::S(_)) => std::cmp::Ordering::Less,
            (Self::S(_), Self::N(_)) => std::cmp::Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::N(n) => write!(f, "{n}"),
            Self::S(s) => f.write_str(s),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(n: i64) -> Self {
        Self::N(n)
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        Self::S(s.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        Self::S(s)
    }
}

/// A named, typed key attribute (e.g., `movieId: Number`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyAttribute {
    /// Attribute name within an item.
    pub name: String,
    /// Required value type for the attribute.
    pub key_type: KeyType,
}

impl KeyAttribute {
    /// Create a key attribute.
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }

    /// Shorthand for a numeric key attribute.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, KeyType::Number)
    }

    /// Shorthand for a string key attribute.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, KeyType::String)
    }
}

/// The key shape of a table or secondary index: a partition key and an
/// optional sort key.
///
/// A schema with a sort key enables range queries within a partition; a
/// schema without one addresses at most one item per partition value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    /// Partition key attribute. Immutable once the table exists.
    pub partition: KeyAttribute,
    /// Optional sort key attribute.
    pub sort: Option<KeyAttribute>,
}

impl KeySchema {
    /// Create a schema from a partition key and optional sort key.
    pub fn new(partition: KeyAttribute, sort: Option<KeyAttribute>) -> Self {
        Self { partition, sort }
    }

    /// Whether this schema supports range queries (has a sort key).
    pub fn has_sort_key(&self) -> bool {
        self.sort.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_strings() {
        assert_eq!(KeyType::Number.as_str(), "N");
        assert_eq!(KeyType::String.as_str(), "S");
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(KeyValue::N(1) < KeyValue::N(2));
        assert!(KeyValue::N(-5) < KeyValue::N(0));
    }

    #[test]
    fn test_string_ordering() {
        assert!(KeyValue::S("2024-01-01".into()) < KeyValue::S("2024-06-15".into()));
    }

    #[test]
    fn test_numbers_sort_before_strings() {
        assert!(KeyValue::N(i64::MAX) < KeyValue::S(String::new()));
    }

    #[test]
    fn test_key_value_type() {
        assert_eq!(KeyValue::N(7).key_type(), KeyType::Number);
        assert_eq!(KeyValue::from("x").key_type(), KeyType::String);
    }

    #[test]
    fn test_schema_sort_key_presence() {
        let with_sort = KeySchema::new(
            KeyAttribute::number("movieId"),
            Some(KeyAttribute::string("reviewDate")),
        );
        assert!(with_sort.has_sort_key());

        let without = KeySchema::new(KeyAttribute::number("movieId"), None);
        assert!(!without.has_sort_key());
    }

    #[test]
    fn test_serde_roundtrip() {
        let kv = KeyValue::S("abc".into());
        let json = serde_json::to_string(&kv).unwrap();
        let parsed: KeyValue = serde_json::from_str(&json).unwrap();
        assert_eq!(kv, parsed);
    }
}
