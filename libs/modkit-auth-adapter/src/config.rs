//! Adapter configuration.
//!
//! Two loaders are provided, mirroring module configuration elsewhere:
//!
//! 1. **Lenient** (`from_figment_or_default`): a missing section yields defaults.
//! 2. **Strict** (`from_figment`): the section must exist and be valid.
//!
//! ```yaml
//! auth_adapter:
//!   generate_id: uuid
//!   debug_logs: true
//!   models:
//!     user:
//!       model_name: custom_user
//!       fields:
//!         email: email_address
//! ```

use std::collections::HashMap;

use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterResult};

/// Primary key generation for `create`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdGeneration {
    /// 32 random alphanumeric characters.
    #[default]
    Random,
    /// UUID v7.
    Uuid,
    /// Leave the key to entity defaults or the database.
    Disabled,
}

/// Renames applied to one framework model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Entity the model is stored as.
    pub model_name: Option<String>,
    /// Framework field → entity field.
    pub fields: HashMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterConfig {
    pub generate_id: IdGeneration,
    /// Per-model overrides keyed by framework model name.
    pub models: HashMap<String, ModelConfig>,
    /// Log every operation with its compiled filter and payload.
    pub debug_logs: bool,
}

impl AdapterConfig {
    /// Lenient loader: defaults when `key` is absent.
    ///
    /// # Errors
    /// Returns `AdapterError::Config` if the section exists but cannot be deserialized.
    pub fn from_figment_or_default(figment: &Figment, key: &str) -> AdapterResult<Self> {
        if !figment.contains(key) {
            return Ok(Self::default());
        }
        Self::from_figment(figment, key)
    }

    /// Strict loader.
    ///
    /// # Errors
    /// Returns `AdapterError::Config` if the section is missing or invalid.
    pub fn from_figment(figment: &Figment, key: &str) -> AdapterResult<Self> {
        figment
            .extract_inner(key)
            .map_err(|e| AdapterError::Config(format!("\"{key}\": {e}")))
    }

    #[must_use]
    pub fn model(&self, model: &str) -> Option<&ModelConfig> {
        self.models.get(model)
    }

    /// Entity name for a framework model.
    #[must_use]
    pub fn model_name<'a>(&'a self, model: &'a str) -> &'a str {
        self.model(model)
            .and_then(|m| m.model_name.as_deref())
            .unwrap_or(model)
    }

    /// Entity field name for a framework field of `model`.
    #[must_use]
    pub fn field_name<'a>(&'a self, model: &str, field: &'a str) -> &'a str {
        self.model(model)
            .and_then(|m| m.fields.get(field))
            .map_or(field, String::as_str)
    }
}
