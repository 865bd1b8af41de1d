//! Naming strategies used to translate between class, table, property and column names.
//!
//! The strategy is chosen once per ORM instance and shared by the metadata registry
//! and by every consumer that needs to reason about persisted names.

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

/// Conversion rules between logical and persisted names.
pub trait NamingStrategy: Send + Sync {
    /// `CustomUser` → `custom_user`.
    fn class_to_table_name(&self, class_name: &str) -> String;

    /// `custom_user` → `CustomUser`.
    fn entity_name(&self, table_name: &str) -> String {
        table_name.to_upper_camel_case()
    }

    /// `email_verified` → `emailVerified`.
    fn column_name_to_property(&self, column_name: &str) -> String;

    /// `emailVerified` → `email_verified`.
    fn property_to_column_name(&self, property_name: &str) -> String;

    /// Foreign key column for a to-one relation property: `user` → `user_id`.
    fn join_column_name(&self, property_name: &str) -> String;

    /// Synthetic path segment addressing a relation's own identifier.
    fn reference_column_name(&self) -> String {
        "id".to_owned()
    }
}

/// camelCase properties, `snake_case` tables and columns.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnderscoreNamingStrategy;

impl NamingStrategy for UnderscoreNamingStrategy {
    fn class_to_table_name(&self, class_name: &str) -> String {
        class_name.to_snake_case()
    }

    fn column_name_to_property(&self, column_name: &str) -> String {
        column_name.to_lower_camel_case()
    }

    fn property_to_column_name(&self, property_name: &str) -> String {
        property_name.to_snake_case()
    }

    fn join_column_name(&self, property_name: &str) -> String {
        format!(
            "{}_{}",
            self.property_to_column_name(property_name),
            self.reference_column_name()
        )
    }
}

/// Persisted names are kept exactly as declared on the entity.
#[derive(Clone, Copy, Debug, Default)]
pub struct EntityCaseNamingStrategy;

impl NamingStrategy for EntityCaseNamingStrategy {
    fn class_to_table_name(&self, class_name: &str) -> String {
        class_name.to_owned()
    }

    fn column_name_to_property(&self, column_name: &str) -> String {
        column_name.to_owned()
    }

    fn property_to_column_name(&self, property_name: &str) -> String {
        property_name.to_owned()
    }

    fn join_column_name(&self, property_name: &str) -> String {
        format!("{property_name}_{}", self.reference_column_name()).to_lower_camel_case()
    }
}

/// Serializable selector for the built-in strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategyKind {
    #[default]
    Underscore,
    EntityCase,
}

impl NamingStrategyKind {
    #[must_use]
    pub fn build(self) -> std::sync::Arc<dyn NamingStrategy> {
        match self {
            NamingStrategyKind::Underscore => std::sync::Arc::new(UnderscoreNamingStrategy),
            NamingStrategyKind::EntityCase => std::sync::Arc::new(EntityCaseNamingStrategy),
        }
    }
}
