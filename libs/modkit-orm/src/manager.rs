//! Entity manager: the persistence boundary consumed by adapters.
//!
//! Statements are built with `sea-query` against the resolved metadata, so one
//! implementation serves every registered entity without generated models.

use async_trait::async_trait;
use sea_orm::sea_query::{
    Alias, Asterisk, DeleteStatement, Expr, Func, Order, Query, SelectStatement, SimpleExpr,
    UpdateStatement,
};
use sea_orm::{
    Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{EntityInstance, NativeRecord};
use crate::error::{OrmError, OrmResult};
use crate::filter::{FilterCompiler, FilterQuery};
use crate::metadata::{EntityMetadata, PropertyDescriptor, ReferenceKind};
use crate::value::{coerce, decode};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl From<SortOrder> for Order {
    fn from(value: SortOrder) -> Self {
        match value {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

/// Ordering by an entity property; to-one relations order by their key column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub property: String,
    pub order: SortOrder,
}

#[derive(Clone, Debug, Default)]
pub struct FindOptions {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order_by: Vec<OrderBy>,
}

/// Persistence operations over registered entities.
///
/// `create`, `assign_and_flush` and `remove_and_flush` are units of work: they run
/// in a transaction that is rolled back before any error is returned.
#[async_trait]
pub trait EntityManager: Send + Sync {
    /// Insert a new entity, applying property defaults, and return it as stored.
    async fn create(&self, meta: &EntityMetadata, data: NativeRecord) -> OrmResult<EntityInstance>;

    async fn find_one(
        &self,
        meta: &EntityMetadata,
        filter: &FilterQuery,
    ) -> OrmResult<Option<EntityInstance>>;

    async fn find(
        &self,
        meta: &EntityMetadata,
        filter: &FilterQuery,
        options: &FindOptions,
    ) -> OrmResult<Vec<EntityInstance>>;

    async fn count(&self, meta: &EntityMetadata, filter: &FilterQuery) -> OrmResult<u64>;

    /// Apply `data` to a loaded entity, flush it, and return the stored state.
    async fn assign_and_flush(
        &self,
        meta: &EntityMetadata,
        entity: EntityInstance,
        data: NativeRecord,
    ) -> OrmResult<EntityInstance>;

    /// Bulk update without loading entities. Returns the affected row count.
    async fn native_update(
        &self,
        meta: &EntityMetadata,
        filter: &FilterQuery,
        data: NativeRecord,
    ) -> OrmResult<u64>;

    async fn remove_and_flush(&self, meta: &EntityMetadata, entity: &EntityInstance)
    -> OrmResult<()>;

    /// Bulk delete. Returns the deleted row count.
    async fn native_delete(&self, meta: &EntityMetadata, filter: &FilterQuery) -> OrmResult<u64>;
}

/// [`EntityManager`] over a `SeaORM` connection.
#[derive(Clone)]
pub struct SeaOrmEntityManager {
    conn: DatabaseConnection,
    reference_key: String,
}

impl SeaOrmEntityManager {
    #[must_use]
    pub fn new(conn: DatabaseConnection, reference_key: impl Into<String>) -> Self {
        Self {
            conn,
            reference_key: reference_key.into(),
        }
    }

    #[must_use]
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    fn condition(&self, meta: &EntityMetadata, filter: &FilterQuery) -> OrmResult<Condition> {
        FilterCompiler::new(meta, &self.reference_key).compile(filter)
    }

    fn pk_condition(meta: &EntityMetadata, pk: &Value) -> OrmResult<Condition> {
        let prop = meta.primary_key()?;
        let column = prop.column().unwrap_or(prop.name.as_str());
        Ok(Condition::all()
            .add(Expr::col(Alias::new(column)).eq(coerce(&prop.name, prop.field_kind, pk)?)))
    }

    /// Column/value pairs for a write payload.
    ///
    /// Shadow properties are dropped; to-one relations accept either the key
    /// value or `{ "<reference key>": value }`.
    fn column_values(
        &self,
        meta: &EntityMetadata,
        data: &NativeRecord,
    ) -> OrmResult<Vec<(String, sea_orm::Value)>> {
        let mut out = Vec::with_capacity(data.len());
        for (name, value) in data {
            let prop = meta.require_property(name)?;
            if !prop.persist {
                continue;
            }
            let column = writable_column(meta, prop)?;
            let value = match (prop.kind, value) {
                (ReferenceKind::ManyToOne, Value::Object(inner)) => {
                    inner.get(&self.reference_key).ok_or_else(|| {
                        OrmError::InvalidQuery(format!(
                            "relation \"{}.{}\" expects \"{}\"",
                            meta.class_name, prop.name, self.reference_key
                        ))
                    })?
                }
                _ => value,
            };
            out.push((column.to_owned(), coerce(&prop.name, prop.field_kind, value)?));
        }
        Ok(out)
    }

    fn select(meta: &EntityMetadata) -> SelectStatement {
        let mut select = Query::select();
        select
            .columns(
                meta.loadable_props()
                    .filter_map(PropertyDescriptor::column)
                    .map(Alias::new),
            )
            .from(Alias::new(meta.table_name.as_str()));
        select
    }

    fn update_statement(
        meta: &EntityMetadata,
        values: Vec<(String, sea_orm::Value)>,
        cond: Condition,
    ) -> UpdateStatement {
        let mut update = Query::update();
        update
            .table(Alias::new(meta.table_name.as_str()))
            .values(
                values
                    .into_iter()
                    .map(|(column, value)| (Alias::new(column), SimpleExpr::Value(value))),
            )
            .cond_where(cond);
        update
    }

    fn delete_statement(meta: &EntityMetadata, cond: Condition) -> DeleteStatement {
        let mut delete = Query::delete();
        delete
            .from_table(Alias::new(meta.table_name.as_str()))
            .cond_where(cond);
        delete
    }

    async fn rollback(meta: &EntityMetadata, txn: DatabaseTransaction, err: OrmError) -> OrmError {
        tracing::debug!(entity = %meta.class_name, error = %err, "rolling back unit of work");
        if let Err(rollback_err) = txn.rollback().await {
            tracing::warn!(
                entity = %meta.class_name,
                error = %rollback_err,
                "failed to roll back transaction"
            );
        }
        err
    }

    async fn insert_in<C: ConnectionTrait>(
        conn: &C,
        meta: &EntityMetadata,
        mut values: Vec<(String, sea_orm::Value)>,
        pk: Option<Value>,
    ) -> OrmResult<EntityInstance> {
        let mut insert = Query::insert();
        insert
            .into_table(Alias::new(meta.table_name.as_str()))
            .columns(values.iter().map(|(column, _)| Alias::new(column.as_str())));
        insert
            .values(values.drain(..).map(|(_, value)| SimpleExpr::Value(value)))
            .map_err(|e| OrmError::InvalidQuery(e.to_string()))?;

        let backend = conn.get_database_backend();
        let pk = match pk {
            Some(pk) => {
                conn.execute(backend.build(&insert)).await?;
                pk
            }
            None if backend == DbBackend::Postgres => {
                // no last_insert_id on Postgres
                let prop = meta.primary_key()?;
                let column = writable_column(meta, prop)?;
                insert.returning_col(Alias::new(column));
                let row = conn
                    .query_one(backend.build(&insert))
                    .await?
                    .ok_or_else(|| OrmError::MissingPrimaryKey(meta.class_name.clone()))?;
                decode(&row, column, prop.field_kind)?
            }
            None => {
                let result = conn.execute(backend.build(&insert)).await?;
                Value::from(result.last_insert_id())
            }
        };

        Self::load_by_pk(conn, meta, &pk)
            .await?
            .ok_or_else(|| OrmError::MissingPrimaryKey(meta.class_name.clone()))
    }

    async fn update_in<C: ConnectionTrait>(
        conn: &C,
        meta: &EntityMetadata,
        values: Vec<(String, sea_orm::Value)>,
        pk: &Value,
    ) -> OrmResult<Option<EntityInstance>> {
        if !values.is_empty() {
            let update = Self::update_statement(meta, values, Self::pk_condition(meta, pk)?);
            let backend = conn.get_database_backend();
            conn.execute(backend.build(&update)).await?;
        }
        Self::load_by_pk(conn, meta, pk).await
    }

    async fn load_by_pk<C: ConnectionTrait>(
        conn: &C,
        meta: &EntityMetadata,
        pk: &Value,
    ) -> OrmResult<Option<EntityInstance>> {
        let mut select = Self::select(meta);
        select.cond_where(Self::pk_condition(meta, pk)?).limit(1);
        Self::fetch(conn, meta, &select)
            .await
            .map(|rows| rows.into_iter().next())
    }

    async fn fetch<C: ConnectionTrait>(
        conn: &C,
        meta: &EntityMetadata,
        select: &SelectStatement,
    ) -> OrmResult<Vec<EntityInstance>> {
        let backend = conn.get_database_backend();
        let stmt = backend.build(select);
        tracing::trace!(entity = %meta.class_name, sql = %stmt, "select");

        let rows = conn.query_all(stmt).await?;
        rows.iter()
            .map(|row| -> OrmResult<EntityInstance> {
                let mut data = Map::new();
                for prop in meta.loadable_props() {
                    if let Some(column) = prop.column() {
                        data.insert(prop.name.clone(), decode(row, column, prop.field_kind)?);
                    }
                }
                Ok(EntityInstance::new(meta.class_name.as_str(), data))
            })
            .collect()
    }
}

fn writable_column<'p>(meta: &EntityMetadata, prop: &'p PropertyDescriptor) -> OrmResult<&'p str> {
    let unsupported = |reason| OrmError::UnsupportedProperty {
        entity: meta.class_name.clone(),
        property: prop.name.clone(),
        reason,
    };
    if !prop.kind.is_owning() {
        return Err(unsupported("only scalar and to-one properties can be written"));
    }
    prop.column()
        .ok_or_else(|| unsupported("relations to composite keys cannot be written"))
}

/// Properties missing from `data` that carry a value generator.
fn with_generated(
    meta: &EntityMetadata,
    mut data: NativeRecord,
    pick: impl Fn(&PropertyDescriptor) -> Option<&crate::metadata::PropertyDefault>,
) -> NativeRecord {
    for prop in &meta.props {
        if data.contains_key(&prop.name) {
            continue;
        }
        if let Some(default) = pick(prop) {
            data.insert(prop.name.clone(), default.generate());
        }
    }
    data
}

#[async_trait]
impl EntityManager for SeaOrmEntityManager {
    async fn create(&self, meta: &EntityMetadata, data: NativeRecord) -> OrmResult<EntityInstance> {
        let data = with_generated(meta, data, |p| p.default.as_ref());
        let pk_prop = meta.primary_key()?;
        let pk = data.get(&pk_prop.name).filter(|v| !v.is_null()).cloned();
        let values = self.column_values(meta, &data)?;

        let txn = self.conn.begin().await?;
        let result = Self::insert_in(&txn, meta, values, pk).await;
        match result {
            Ok(entity) => {
                txn.commit().await?;
                tracing::debug!(entity = %meta.class_name, "created entity");
                Ok(entity)
            }
            Err(err) => Err(Self::rollback(meta, txn, err).await),
        }
    }

    async fn find_one(
        &self,
        meta: &EntityMetadata,
        filter: &FilterQuery,
    ) -> OrmResult<Option<EntityInstance>> {
        let mut select = Self::select(meta);
        select.cond_where(self.condition(meta, filter)?).limit(1);
        Ok(Self::fetch(&self.conn, meta, &select).await?.into_iter().next())
    }

    async fn find(
        &self,
        meta: &EntityMetadata,
        filter: &FilterQuery,
        options: &FindOptions,
    ) -> OrmResult<Vec<EntityInstance>> {
        let mut select = Self::select(meta);
        select.cond_where(self.condition(meta, filter)?);

        for order in &options.order_by {
            let prop = meta.require_property(&order.property)?;
            let column = writable_column(meta, prop)?;
            select.order_by(Alias::new(column), order.order.into());
        }
        if let Some(limit) = options.limit {
            select.limit(limit);
        }
        if let Some(offset) = options.offset {
            if options.limit.is_none() {
                // SQLite and MySQL only accept OFFSET after a LIMIT
                select.limit(i64::MAX.unsigned_abs());
            }
            select.offset(offset);
        }

        Self::fetch(&self.conn, meta, &select).await
    }

    async fn count(&self, meta: &EntityMetadata, filter: &FilterQuery) -> OrmResult<u64> {
        let mut select = Query::select();
        select
            .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
            .from(Alias::new(meta.table_name.as_str()))
            .cond_where(self.condition(meta, filter)?);

        let backend = self.conn.get_database_backend();
        let row = self.conn.query_one(backend.build(&select)).await?;
        let count = match row {
            Some(row) => row.try_get::<i64>("", "count")?,
            None => 0,
        };
        Ok(count.unsigned_abs())
    }

    async fn assign_and_flush(
        &self,
        meta: &EntityMetadata,
        entity: EntityInstance,
        data: NativeRecord,
    ) -> OrmResult<EntityInstance> {
        let pk = entity.primary_key(meta)?.clone();
        let data = with_generated(meta, data, |p| p.on_update.as_ref());
        let values = self.column_values(meta, &data)?;

        let txn = self.conn.begin().await?;
        let result = Self::update_in(&txn, meta, values, &pk).await;
        match result {
            Ok(Some(updated)) => {
                txn.commit().await?;
                Ok(updated)
            }
            Ok(None) => {
                let err = OrmError::MissingPrimaryKey(meta.class_name.clone());
                Err(Self::rollback(meta, txn, err).await)
            }
            Err(err) => Err(Self::rollback(meta, txn, err).await),
        }
    }

    async fn native_update(
        &self,
        meta: &EntityMetadata,
        filter: &FilterQuery,
        data: NativeRecord,
    ) -> OrmResult<u64> {
        let values = self.column_values(meta, &data)?;
        if values.is_empty() {
            return Ok(0);
        }
        let update = Self::update_statement(meta, values, self.condition(meta, filter)?);
        let backend = self.conn.get_database_backend();
        let result = self.conn.execute(backend.build(&update)).await?;
        Ok(result.rows_affected())
    }

    async fn remove_and_flush(
        &self,
        meta: &EntityMetadata,
        entity: &EntityInstance,
    ) -> OrmResult<()> {
        let cond = Self::pk_condition(meta, entity.primary_key(meta)?)?;
        let delete = Self::delete_statement(meta, cond);

        let txn = self.conn.begin().await?;
        let backend = txn.get_database_backend();
        let result = txn.execute(backend.build(&delete)).await;
        match result {
            Ok(_) => {
                txn.commit().await?;
                Ok(())
            }
            Err(err) => Err(Self::rollback(meta, txn, err.into()).await),
        }
    }

    async fn native_delete(&self, meta: &EntityMetadata, filter: &FilterQuery) -> OrmResult<u64> {
        let delete = Self::delete_statement(meta, self.condition(meta, filter)?);
        let backend = self.conn.get_database_backend();
        let result = self.conn.execute(backend.build(&delete)).await?;
        Ok(result.rows_affected())
    }
}
