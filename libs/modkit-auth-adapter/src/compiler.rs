//! Translation between framework records/clauses and ORM records/filters.

use modkit_orm::{EntityInstance, EntityMetadata, FilterQuery, NativeRecord, serialize};
use serde_json::{Map, Value};

use crate::clause::{Connector, Operator, Where};
use crate::error::{AdapterError, AdapterResult};
use crate::resolver::MetadataResolver;

/// Stateless compiler over a [`MetadataResolver`].
#[derive(Clone)]
pub struct QueryCompiler {
    resolver: MetadataResolver,
}

impl QueryCompiler {
    #[must_use]
    pub fn new(resolver: MetadataResolver) -> Self {
        Self { resolver }
    }

    #[must_use]
    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    /// Flat framework record → ORM write payload.
    ///
    /// # Errors
    /// Fails when a key cannot be resolved to a property path.
    pub fn normalize_input(
        &self,
        meta: &EntityMetadata,
        record: &Map<String, Value>,
    ) -> AdapterResult<NativeRecord> {
        let mut out = NativeRecord::new();
        for (field, value) in record {
            self.resolver
                .field_path(meta, field, false)?
                .set(&mut out, value.clone());
        }
        Ok(out)
    }

    /// Loaded entity → flat framework record, optionally restricted to `select`.
    ///
    /// `select` is matched against logical names (`userId`), not property names.
    ///
    /// # Errors
    /// Fails when a serialized property has no logical name.
    pub fn normalize_output(
        &self,
        meta: &EntityMetadata,
        entity: &EntityInstance,
        select: Option<&[String]>,
    ) -> AdapterResult<Map<String, Value>> {
        let mut out = Map::new();
        for (key, value) in serialize(meta, entity) {
            let prop = self.resolver.property_metadata(meta, &key)?;
            let name = self.resolver.referenced_property_name(meta, prop)?;
            if select.is_some_and(|select| !select.contains(&name)) {
                continue;
            }
            out.insert(name, value);
        }
        Ok(out)
    }

    /// Clause list → ORM filter.
    ///
    /// No clauses match everything. Several clauses are grouped by connector:
    /// `AND` clauses under `$and`, `OR` clauses under `$or`, each keyed by its
    /// position in `clauses`. Both groups must hold.
    ///
    /// # Errors
    /// Resolution errors from strict field paths, and
    /// `AdapterError::InvalidOperatorValue` for `in` without an array.
    pub fn normalize_where_clauses(
        &self,
        meta: &EntityMetadata,
        clauses: Option<&[Where]>,
    ) -> AdapterResult<FilterQuery> {
        match clauses.unwrap_or_default() {
            [] => Ok(FilterQuery::new()),
            [single] => self.clause(meta, single),
            many => {
                let mut and = Map::new();
                let mut or = Map::new();
                for (index, clause) in many.iter().enumerate() {
                    let group = match clause.connector {
                        Connector::And => &mut and,
                        Connector::Or => &mut or,
                    };
                    group.insert(index.to_string(), Value::Object(self.clause(meta, clause)?));
                }

                let mut filter = FilterQuery::new();
                if !and.is_empty() {
                    filter.insert("$and".to_owned(), Value::Object(and));
                }
                if !or.is_empty() {
                    filter.insert("$or".to_owned(), Value::Object(or));
                }
                Ok(filter)
            }
        }
    }

    fn clause(&self, meta: &EntityMetadata, clause: &Where) -> AdapterResult<FilterQuery> {
        let path = self.resolver.field_path(meta, &clause.field, true)?;
        let value = &clause.value;

        let condition = match clause.operator {
            Operator::Eq => value.clone(),
            Operator::In => {
                if !value.is_array() {
                    return Err(AdapterError::InvalidOperatorValue {
                        field: clause.field.clone(),
                    });
                }
                op("$in", value.clone())
            }
            Operator::Contains => op("$like", format!("%{}%", text(value)).into()),
            Operator::StartsWith => op("$like", format!("{}%", text(value)).into()),
            Operator::EndsWith => op("$like", format!("%{}", text(value)).into()),
            Operator::Gt => op("$gt", value.clone()),
            Operator::Gte => op("$gte", value.clone()),
            Operator::Lt => op("$lt", value.clone()),
            Operator::Lte => op("$lte", value.clone()),
            Operator::Ne => op("$ne", value.clone()),
        };

        Ok(path.wrap(condition))
    }
}

fn op(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_owned(), value);
    Value::Object(map)
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
