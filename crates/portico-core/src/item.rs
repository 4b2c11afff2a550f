//! # Items and Primary Keys
//!
//! An `Item` is a stored record: a JSON object whose key attributes must
//! conform to the owning table's `KeySchema`. `Item::primary_key()` derives
//! the full `(partition, sort?)` key from the item's own fields.
//!
//! ## Determinism Invariant
//!
//! Keys come from item fields, never from a generator. Writing the same item
//! twice addresses the same storage slot, so bulk seeding can be re-run
//! without producing duplicate rows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::key::{KeyAttribute, KeySchema, KeyType, KeyValue};

/// Error extracting key attributes from an item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// A key attribute is absent from the item.
    #[error("item is missing key attribute '{0}'")]
    MissingKeyAttribute(String),

    /// A key attribute is present but has the wrong JSON type.
    #[error("key attribute '{name}' must be of type {expected}, got {actual}")]
    WrongKeyType {
        /// The offending attribute name.
        name: String,
        /// The type the schema requires.
        expected: KeyType,
        /// A description of the JSON type found.
        actual: String,
    },

    /// The item root is not a JSON object.
    #[error("item must be a JSON object")]
    NotAnObject,
}

/// A stored record: a JSON object with typed key attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(pub Map<String, Value>);

impl Item {
    /// Build an item from a JSON value, rejecting non-objects.
    pub fn from_value(value: Value) -> Result<Self, ItemError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ItemError::NotAnObject),
        }
    }

    /// Access an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The item as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Extract the value of one key attribute, enforcing its declared type.
    pub fn key_value(&self, attr: &KeyAttribute) -> Result<KeyValue, ItemError> {
        let value = self
            .0
            .get(&attr.name)
            .ok_or_else(|| ItemError::MissingKeyAttribute(attr.name.clone()))?;

        match (attr.key_type, value) {
            (KeyType::Number, Value::Number(n)) => {
                n.as_i64().map(KeyValue::N).ok_or_else(|| ItemError::WrongKeyType {
                    name: attr.name.clone(),
                    expected: KeyType::Number,
                    actual: "non-integer number".to_string(),
                })
            }
            (KeyType::String, Value::String(s)) => Ok(KeyValue::S(s.clone())),
            (expected, other) => Err(ItemError::WrongKeyType {
                name: attr.name.clone(),
                expected,
                actual: json_type_name(other).to_string(),
            }),
        }
    }

    /// Derive the full primary key from the item's own fields.
    ///
    /// Fails if a key attribute is missing or mistyped. A table whose schema
    /// has a sort key requires both components on every item.
    pub fn primary_key(&self, schema: &KeySchema) -> Result<PrimaryKey, ItemError> {
        let partition = self.key_value(&schema.partition)?;
        let sort = match &schema.sort {
            Some(attr) => Some(self.key_value(attr)?),
            None => None,
        };
        Ok(PrimaryKey { partition, sort })
    }
}

impl TryFrom<Value> for Item {
    type Error = ItemError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The full primary key of an item: partition value plus optional sort value.
///
/// Ordered by partition, then sort, matching storage iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Partition key value.
    pub partition: KeyValue,
    /// Sort key value, present when the schema declares one.
    pub sort: Option<KeyValue>,
}

impl PrimaryKey {
    /// A key with no sort component.
    pub fn partition_only(partition: impl Into<KeyValue>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    /// A composite key.
    pub fn composite(partition: impl Into<KeyValue>, sort: impl Into<KeyValue>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }
}

impl std::fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sort {
            Some(sort) => write!(f, "({}, {})", self.partition, sort),
            None => write!(f, "({})", self.partition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn review_schema() -> KeySchema {
        KeySchema::new(
            KeyAttribute::number("movieId"),
            Some(KeyAttribute::string("reviewDate")),
        )
    }

    fn review_item() -> Item {
        Item::from_value(json!({
            "movieId": 42,
            "reviewDate": "2024-03-01",
            "reviewerName": "alice",
            "rating": 5
        }))
        .unwrap()
    }

    #[test]
    fn test_primary_key_from_fields() {
        let key = review_item().primary_key(&review_schema()).unwrap();
        assert_eq!(key.partition, KeyValue::N(42));
        assert_eq!(key.sort, Some(KeyValue::S("2024-03-01".into())));
    }

    #[test]
    fn test_primary_key_is_deterministic() {
        let a = review_item().primary_key(&review_schema()).unwrap();
        let b = review_item().primary_key(&review_schema()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_key_attribute() {
        let item = Item::from_value(json!({"movieId": 42})).unwrap();
        let err = item.primary_key(&review_schema()).unwrap_err();
        assert_eq!(err, ItemError::MissingKeyAttribute("reviewDate".into()));
    }

    #[test]
    fn test_wrong_key_type() {
        let item = Item::from_value(json!({
            "movieId": "forty-two",
            "reviewDate": "2024-03-01"
        }))
        .unwrap();
        let err = item.primary_key(&review_schema()).unwrap_err();
        assert!(matches!(err, ItemError::WrongKeyType { ref name, .. } if name == "movieId"));
    }

    #[test]
    fn test_float_key_rejected() {
        let item = Item::from_value(json!({
            "movieId": 4.2,
            "reviewDate": "2024-03-01"
        }))
        .unwrap();
        assert!(item.primary_key(&review_schema()).is_err());
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(
            Item::from_value(json!([1, 2, 3])).unwrap_err(),
            ItemError::NotAnObject
        );
    }

    #[test]
    fn test_partition_only_schema_ignores_sort_fields() {
        let schema = KeySchema::new(KeyAttribute::number("movieId"), None);
        let key = review_item().primary_key(&schema).unwrap();
        assert_eq!(key, PrimaryKey::partition_only(42));
    }

    #[test]
    fn test_primary_key_ordering() {
        let a = PrimaryKey::composite(1, "2024-01-01");
        let b = PrimaryKey::composite(1, "2024-02-01");
        let c = PrimaryKey::composite(2, "2023-01-01");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_display() {
        assert_eq!(PrimaryKey::composite(42, "d").to_string(), "(42, d)");
        assert_eq!(PrimaryKey::partition_only(7).to_string(), "(7)");
    }
}
