use serde_json::{Map, Value};

use crate::error::{OrmError, OrmResult};
use crate::metadata::EntityMetadata;

/// A plain JSON object keyed by entity property names.
///
/// Used for write payloads (`create`, `assign`, native updates), where a to-one
/// relation is either its key value or `{ "<reference column>": key }`.
pub type NativeRecord = Map<String, Value>;

/// A loaded entity row.
///
/// Values are keyed by property name; to-one relations hold the referenced
/// primary key value without loading the target.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityInstance {
    class_name: String,
    data: Map<String, Value>,
}

impl EntityInstance {
    #[must_use]
    pub fn new(class_name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            class_name: class_name.into(),
            data,
        }
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.data.get(property)
    }

    /// Primary key value of this instance.
    ///
    /// # Errors
    /// Returns `OrmError::MissingPrimaryKey` when the key is absent or null.
    pub fn primary_key(&self, meta: &EntityMetadata) -> OrmResult<&Value> {
        let pk = meta.primary_key()?;
        self.data
            .get(&pk.name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| OrmError::MissingPrimaryKey(meta.class_name.clone()))
    }
}

/// Serialize an entity instance into a plain object keyed by property name.
///
/// Hidden and non-persisted properties are left out.
#[must_use]
pub fn serialize(meta: &EntityMetadata, entity: &EntityInstance) -> Map<String, Value> {
    meta.props
        .iter()
        .filter(|p| !p.hidden && p.is_loadable())
        .filter_map(|p| entity.get(&p.name).map(|v| (p.name.clone(), v.clone())))
        .collect()
}
