#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `ModKit` ORM: a small entity layer over `SeaORM`.
//!
//! Entities are described at runtime with [`EntitySchema`] builders instead of
//! generated models. The registry resolves table and column names through a
//! [`NamingStrategy`], and the [`EntityManager`] persists plain JSON records
//! using dynamically built `sea-query` statements.
//!
//! # Example
//! ```rust,no_run
//! use modkit_orm::{EntitySchema, FieldKind, Orm, OrmConfig, PropertySchema};
//!
//! # async fn run() -> modkit_orm::OrmResult<()> {
//! let orm = Orm::connect(
//!     &OrmConfig::default(),
//!     vec![
//!         EntitySchema::new("User")
//!             .property(PropertySchema::primary("id", FieldKind::String))
//!             .property(PropertySchema::scalar("email", FieldKind::String)),
//!     ],
//! )
//! .await?;
//! let user = orm.metadata().get("User");
//! # Ok(())
//! # }
//! ```

#![cfg_attr(
    not(any(feature = "pg", feature = "mysql", feature = "sqlite")),
    allow(unused_imports, unused_variables, dead_code, unreachable_code)
)]

pub use sea_orm::ConnectionTrait as DbConnTrait;
pub use sea_orm::{DatabaseBackend, DatabaseConnection};

pub mod config;
pub mod entity;
pub mod error;
pub mod filter;
pub mod manager;
pub mod metadata;
pub mod naming;
pub mod pool_opts;
pub mod value;

mod orm;

pub use config::{OrmConfig, PoolCfg};
pub use entity::{EntityInstance, NativeRecord, serialize};
pub use error::{OrmError, OrmResult};
pub use filter::{FilterCompiler, FilterQuery};
pub use manager::{EntityManager, FindOptions, OrderBy, SeaOrmEntityManager, SortOrder};
pub use metadata::{
    EntityMetadata, EntitySchema, FieldKind, MetadataStorage, PropertyDefault, PropertyDescriptor,
    PropertySchema, ReferenceKind,
};
pub use naming::{
    EntityCaseNamingStrategy, NamingStrategy, NamingStrategyKind, UnderscoreNamingStrategy,
};
pub use orm::Orm;
