#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Authentication storage adapter over `ModKit` ORM.
//!
//! The authentication framework speaks in models, flat records and
//! `field <operator> value` clauses. This crate resolves those names against
//! the ORM's entity metadata ([`MetadataResolver`]), compiles records and
//! clauses into ORM payloads and filters ([`QueryCompiler`]), and exposes the
//! eight storage operations through [`AuthAdapter`].
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use modkit_auth_adapter::{AdapterConfig, AuthAdapter, OrmAdapter, Where};
//! use modkit_orm::{EntitySchema, FieldKind, Orm, OrmConfig, PropertySchema};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let orm = Orm::connect(
//!     &OrmConfig::default(),
//!     vec![
//!         EntitySchema::new("User")
//!             .property(PropertySchema::primary("id", FieldKind::String))
//!             .property(PropertySchema::scalar("email", FieldKind::String)),
//!     ],
//! )
//! .await?;
//! let adapter = OrmAdapter::new(Arc::new(orm), AdapterConfig::default());
//!
//! let user = adapter
//!     .find_one("user", &[Where::eq("email", "a@b.com")], None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod clause;
pub mod compiler;
pub mod config;
pub mod error;
pub mod id;
pub mod path;
pub mod resolver;

pub use adapter::{AuthAdapter, FindManyParams, OrmAdapter, Record};
pub use clause::{Connector, Operator, SortBy, Where};
pub use compiler::QueryCompiler;
pub use config::{AdapterConfig, IdGeneration, ModelConfig};
pub use error::{AdapterError, AdapterResult};
pub use id::IdGenerator;
pub use path::FieldPath;
pub use resolver::MetadataResolver;
