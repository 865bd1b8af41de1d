use modkit_orm::OrmError;
use thiserror::Error;

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Adapter-level failure. Every message carries the `[ModKit ORM Adapter]` prefix.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(
        "[ModKit ORM Adapter] Cannot find metadata for \"{0}\" entity. Make sure it defined and listed in your ModKit ORM config."
    )]
    EntityNotFound(String),

    #[error("[ModKit ORM Adapter] Can't find property \"{field}\" on entity \"{entity}\".")]
    FieldNotFound { entity: String, field: String },

    /// A relation kind the adapter cannot address, or a to-one relation to a
    /// composite key.
    #[error("[ModKit ORM Adapter] {0}")]
    UnsupportedReference(String),

    #[error(
        "[ModKit ORM Adapter] Cannot serialize \"{field}\" into path, because it cannot be persisted in \"{table}\" table."
    )]
    UnsupportedField { field: String, table: String },

    #[error(
        "[ModKit ORM Adapter] The value for the field \"{field}\" must be an array when using the $in operator."
    )]
    InvalidOperatorValue { field: String },

    #[error("[ModKit ORM Adapter] {0}")]
    Orm(#[from] OrmError),

    #[error("[ModKit ORM Adapter] invalid configuration: {0}")]
    Config(String),
}
