use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use modkit_orm::{EntityInstance, EntityMetadata, FieldKind, FilterQuery, FindOptions, OrderBy, Orm};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clause::{SortBy, Where};
use crate::compiler::QueryCompiler;
use crate::config::AdapterConfig;
use crate::error::AdapterResult;
use crate::id::{IdGenerator, generate_id};
use crate::resolver::MetadataResolver;

/// A record in the framework's field vocabulary.
pub type Record = Map<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindManyParams {
    #[serde(rename = "where")]
    pub filter: Vec<Where>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<SortBy>,
}

/// Storage contract the authentication framework drives.
///
/// Model and field names are the framework's; an empty `filter` matches every
/// record.
#[async_trait]
pub trait AuthAdapter: Send + Sync {
    fn id(&self) -> &'static str;

    async fn create(&self, model: &str, data: Record, select: Option<&[String]>)
    -> AdapterResult<Record>;

    async fn find_one(
        &self,
        model: &str,
        filter: &[Where],
        select: Option<&[String]>,
    ) -> AdapterResult<Option<Record>>;

    async fn find_many(&self, model: &str, params: FindManyParams) -> AdapterResult<Vec<Record>>;

    async fn count(&self, model: &str, filter: &[Where]) -> AdapterResult<u64>;

    /// Update the first matching record and return its new state.
    async fn update(&self, model: &str, filter: &[Where], update: Record)
    -> AdapterResult<Option<Record>>;

    async fn update_many(&self, model: &str, filter: &[Where], update: Record) -> AdapterResult<u64>;

    /// Delete the first matching record, if any.
    async fn delete(&self, model: &str, filter: &[Where]) -> AdapterResult<()>;

    async fn delete_many(&self, model: &str, filter: &[Where]) -> AdapterResult<u64>;
}

/// [`AuthAdapter`] backed by a `ModKit` [`Orm`].
#[derive(Clone)]
pub struct OrmAdapter {
    orm: Arc<Orm>,
    compiler: QueryCompiler,
    config: AdapterConfig,
    id_generator: Option<IdGenerator>,
}

impl OrmAdapter {
    #[must_use]
    pub fn new(orm: Arc<Orm>, config: AdapterConfig) -> Self {
        let resolver = MetadataResolver::new(orm.metadata().clone(), orm.naming().clone());
        Self {
            orm,
            compiler: QueryCompiler::new(resolver),
            config,
            id_generator: None,
        }
    }

    /// Use `generator` for new primary keys, regardless of `generate_id`.
    #[must_use]
    pub fn with_id_generator(
        mut self,
        generator: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    #[must_use]
    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn entity(&self, model: &str) -> AdapterResult<Arc<EntityMetadata>> {
        self.compiler
            .resolver()
            .entity_metadata(self.config.model_name(model))
    }

    fn rename_record(&self, model: &str, record: Record) -> Record {
        record
            .into_iter()
            .map(|(field, value)| (self.config.field_name(model, &field).to_owned(), value))
            .collect()
    }

    fn rename_clauses(&self, model: &str, filter: &[Where]) -> Vec<Where> {
        filter
            .iter()
            .map(|w| Where {
                field: self.config.field_name(model, &w.field).to_owned(),
                ..w.clone()
            })
            .collect()
    }

    /// Output key → framework field, for fields renamed by configuration.
    fn output_renames(
        &self,
        meta: &EntityMetadata,
        model: &str,
    ) -> AdapterResult<HashMap<String, String>> {
        let Some(overrides) = self.config.model(model) else {
            return Ok(HashMap::new());
        };
        let resolver = self.compiler.resolver();
        overrides
            .fields
            .iter()
            .map(|(field, configured)| -> AdapterResult<(String, String)> {
                let prop = resolver.property_metadata(meta, configured)?;
                Ok((resolver.referenced_property_name(meta, prop)?, field.clone()))
            })
            .collect()
    }

    fn output(
        &self,
        meta: &EntityMetadata,
        model: &str,
        entity: &EntityInstance,
        select: Option<&[String]>,
    ) -> AdapterResult<Record> {
        let renames = self.output_renames(meta, model)?;
        if renames.is_empty() {
            return self.compiler.normalize_output(meta, entity, select);
        }

        let select: Option<Vec<String>> = select.map(|fields| {
            fields
                .iter()
                .map(|field| {
                    renames
                        .iter()
                        .find(|(_, original)| *original == field)
                        .map_or_else(|| field.clone(), |(key, _)| key.clone())
                })
                .collect()
        });

        let out = self
            .compiler
            .normalize_output(meta, entity, select.as_deref())?;
        Ok(out
            .into_iter()
            .map(|(key, value)| match renames.get(&key) {
                Some(field) => (field.clone(), value),
                None => (key, value),
            })
            .collect())
    }

    fn filter(
        &self,
        meta: &EntityMetadata,
        model: &str,
        filter: &[Where],
    ) -> AdapterResult<FilterQuery> {
        let clauses = self.rename_clauses(model, filter);
        let compiled = self.compiler.normalize_where_clauses(meta, Some(&clauses))?;
        if self.config.debug_logs {
            tracing::debug!(model, entity = %meta.class_name, filter = ?compiled, "compiled filter");
        }
        Ok(compiled)
    }

    fn input(&self, meta: &EntityMetadata, model: &str, data: Record) -> AdapterResult<Record> {
        let input = self
            .compiler
            .normalize_input(meta, &self.rename_record(model, data))?;
        if self.config.debug_logs {
            tracing::debug!(model, entity = %meta.class_name, payload = ?input, "normalized input");
        }
        Ok(input)
    }
}

#[async_trait]
impl AuthAdapter for OrmAdapter {
    fn id(&self) -> &'static str {
        "modkit-orm"
    }

    async fn create(
        &self,
        model: &str,
        data: Record,
        select: Option<&[String]>,
    ) -> AdapterResult<Record> {
        let meta = self.entity(model)?;
        let mut input = self.input(&meta, model, data)?;

        let pk = meta.primary_key()?;
        let missing = input.get(&pk.name).is_none_or(Value::is_null);
        if missing
            && pk.field_kind == FieldKind::String
            && let Some(id) = generate_id(self.config.generate_id, self.id_generator.as_ref(), model)
        {
            input.insert(pk.name.clone(), Value::String(id));
        }

        let entity = self.orm.em().create(&meta, input).await?;
        tracing::debug!(model, entity = %meta.class_name, "record created");
        self.output(&meta, model, &entity, select)
    }

    async fn find_one(
        &self,
        model: &str,
        filter: &[Where],
        select: Option<&[String]>,
    ) -> AdapterResult<Option<Record>> {
        let meta = self.entity(model)?;
        let filter = self.filter(&meta, model, filter)?;

        match self.orm.em().find_one(&meta, &filter).await? {
            Some(entity) => self.output(&meta, model, &entity, select).map(Some),
            None => Ok(None),
        }
    }

    async fn find_many(&self, model: &str, params: FindManyParams) -> AdapterResult<Vec<Record>> {
        let meta = self.entity(model)?;
        let filter = self.filter(&meta, model, &params.filter)?;

        let mut options = FindOptions {
            limit: params.limit,
            offset: params.offset,
            order_by: Vec::new(),
        };
        if let Some(sort) = &params.sort_by {
            let field = self.config.field_name(model, &sort.field);
            let path = self.compiler.resolver().field_path(&meta, field, false)?;
            options.order_by.push(OrderBy {
                property: path.property().to_owned(),
                order: sort.direction,
            });
        }

        let rows = self.orm.em().find(&meta, &filter, &options).await?;
        rows.iter()
            .map(|row| self.output(&meta, model, row, None))
            .collect()
    }

    async fn count(&self, model: &str, filter: &[Where]) -> AdapterResult<u64> {
        let meta = self.entity(model)?;
        let filter = self.filter(&meta, model, filter)?;
        Ok(self.orm.em().count(&meta, &filter).await?)
    }

    async fn update(
        &self,
        model: &str,
        filter: &[Where],
        update: Record,
    ) -> AdapterResult<Option<Record>> {
        let meta = self.entity(model)?;
        let filter = self.filter(&meta, model, filter)?;
        let input = self.input(&meta, model, update)?;

        let Some(entity) = self.orm.em().find_one(&meta, &filter).await? else {
            return Ok(None);
        };
        let updated = self.orm.em().assign_and_flush(&meta, entity, input).await?;
        self.output(&meta, model, &updated, None).map(Some)
    }

    async fn update_many(
        &self,
        model: &str,
        filter: &[Where],
        update: Record,
    ) -> AdapterResult<u64> {
        let meta = self.entity(model)?;
        let filter = self.filter(&meta, model, filter)?;
        let input = self.input(&meta, model, update)?;

        let affected = self.orm.em().native_update(&meta, &filter, input).await?;
        tracing::debug!(model, affected, "records updated");
        Ok(affected)
    }

    async fn delete(&self, model: &str, filter: &[Where]) -> AdapterResult<()> {
        let meta = self.entity(model)?;
        let filter = self.filter(&meta, model, filter)?;

        if let Some(entity) = self.orm.em().find_one(&meta, &filter).await? {
            self.orm.em().remove_and_flush(&meta, &entity).await?;
        }
        Ok(())
    }

    async fn delete_many(&self, model: &str, filter: &[Where]) -> AdapterResult<u64> {
        let meta = self.entity(model)?;
        let filter = self.filter(&meta, model, filter)?;

        let affected = self.orm.em().native_delete(&meta, &filter).await?;
        tracing::debug!(model, affected, "records deleted");
        Ok(affected)
    }
}
