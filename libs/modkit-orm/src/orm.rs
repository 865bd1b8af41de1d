use std::sync::Arc;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};

use crate::config::OrmConfig;
use crate::error::OrmResult;
use crate::manager::{EntityManager, SeaOrmEntityManager};
use crate::metadata::{EntitySchema, MetadataStorage};
use crate::naming::NamingStrategy;
use crate::pool_opts::ApplyPoolOpts;

/// A configured ORM instance: entity metadata, naming strategy and entity manager.
///
/// Cheap to share behind an `Arc`; every component is immutable after construction.
#[derive(Clone)]
pub struct Orm {
    metadata: Arc<MetadataStorage>,
    naming: Arc<dyn NamingStrategy>,
    em: Arc<dyn EntityManager>,
    conn: DatabaseConnection,
}

impl Orm {
    /// Open a connection pool from `cfg` and register `schemas`.
    ///
    /// # Errors
    /// Returns `OrmError::InvalidMetadata` for inconsistent schemas and
    /// `OrmError::Db` when the database cannot be reached.
    pub async fn connect(cfg: &OrmConfig, schemas: Vec<EntitySchema>) -> OrmResult<Self> {
        let naming = cfg.naming.build();
        let metadata = MetadataStorage::discover(schemas, naming.as_ref())?;

        let mut opts = ConnectOptions::new(cfg.dsn.clone()).apply(&cfg.pool);
        if cfg.is_in_memory_sqlite() {
            opts.max_connections(1).min_connections(1);
        }
        opts.sqlx_logging(cfg.sql_logging);

        let conn = Database::connect(opts).await?;
        tracing::info!(
            entities = metadata.len(),
            backend = ?conn.get_database_backend(),
            "ORM connected"
        );

        Ok(Self::with_metadata(conn, naming, metadata))
    }

    /// Build an ORM over an existing connection.
    ///
    /// # Errors
    /// Returns `OrmError::InvalidMetadata` for inconsistent schemas.
    pub fn new(
        conn: DatabaseConnection,
        naming: Arc<dyn NamingStrategy>,
        schemas: Vec<EntitySchema>,
    ) -> OrmResult<Self> {
        let metadata = MetadataStorage::discover(schemas, naming.as_ref())?;
        Ok(Self::with_metadata(conn, naming, metadata))
    }

    fn with_metadata(
        conn: DatabaseConnection,
        naming: Arc<dyn NamingStrategy>,
        metadata: MetadataStorage,
    ) -> Self {
        let em = SeaOrmEntityManager::new(conn.clone(), naming.reference_column_name());
        Self {
            metadata: Arc::new(metadata),
            naming,
            em: Arc::new(em),
            conn,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &Arc<MetadataStorage> {
        &self.metadata
    }

    #[must_use]
    pub fn naming(&self) -> &Arc<dyn NamingStrategy> {
        &self.naming
    }

    /// Underlying connection, for schema setup and raw statements.
    #[must_use]
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    #[must_use]
    pub fn em(&self) -> &dyn EntityManager {
        self.em.as_ref()
    }
}
