//! Typed field paths into the persisted record shape.

use serde_json::{Map, Value};

/// Location of a logical field inside a persisted record.
///
/// Depth is fixed: a scalar property, or a to-one relation addressed through
/// its reference key (`{ "user": { "id": .. } }`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldPath {
    Scalar(String),
    Relation { property: String, key: String },
}

impl FieldPath {
    /// Top-level property name.
    #[must_use]
    pub fn property(&self) -> &str {
        match self {
            FieldPath::Scalar(property) | FieldPath::Relation { property, .. } => property,
        }
    }

    #[must_use]
    pub fn segments(&self) -> Vec<&str> {
        match self {
            FieldPath::Scalar(property) => vec![property.as_str()],
            FieldPath::Relation { property, key } => vec![property.as_str(), key.as_str()],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            FieldPath::Scalar(_) => 1,
            FieldPath::Relation { .. } => 2,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Place `value` at this path inside `target`, creating the relation object
    /// when needed.
    pub fn set(&self, target: &mut Map<String, Value>, value: Value) {
        match self {
            FieldPath::Scalar(property) => {
                target.insert(property.clone(), value);
            }
            FieldPath::Relation { property, key } => {
                let slot = target
                    .entry(property.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(inner) = slot {
                    inner.insert(key.clone(), value);
                }
            }
        }
    }

    /// A fresh object holding only `value` at this path.
    #[must_use]
    pub fn wrap(&self, value: Value) -> Map<String, Value> {
        let mut out = Map::new();
        self.set(&mut out, value);
        out
    }
}
