use thiserror::Error;

use crate::metadata::FieldKind;

/// Library-local result type.
pub type OrmResult<T> = std::result::Result<T, OrmError>;

/// Typed error for metadata discovery, filter compilation and entity manager calls.
#[derive(Debug, Error)]
pub enum OrmError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error("unknown property \"{property}\" on entity \"{entity}\"")]
    UnknownProperty { entity: String, property: String },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("type mismatch for \"{property}\": expected {expected}, got {got}")]
    TypeMismatch {
        property: String,
        expected: FieldKind,
        got: &'static str,
    },

    #[error("property \"{property}\" on entity \"{entity}\" cannot be used here: {reason}")]
    UnsupportedProperty {
        entity: String,
        property: String,
        reason: &'static str,
    },

    #[error("entity \"{0}\" has no primary key value")]
    MissingPrimaryKey(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
