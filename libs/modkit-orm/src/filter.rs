//! Native filter (`FilterQuery`) → `sea_orm::Condition` compiler.
//!
//! A filter is a JSON object in the entity's property vocabulary:
//!
//! ```json
//! { "email": "a@b.com" }
//! { "id": { "$in": ["u1", "u2"] } }
//! { "user": { "id": "u1" } }
//! { "$and": { "0": { "name": { "$like": "%al%" } }, "1": { "emailVerified": true } },
//!   "$or":  [ { "age": { "$gt": 18 } }, { "age": null } ] }
//! ```
//!
//! Sibling keys combine with AND. `$and` / `$or` hold either an array or an
//! object of sub-filters (object keys are only there to keep siblings apart).

use sea_orm::Condition;
use sea_orm::sea_query::{Alias, Expr, SimpleExpr};
use serde_json::{Map, Value};

use crate::error::{OrmError, OrmResult};
use crate::metadata::{EntityMetadata, PropertyDescriptor, ReferenceKind};
use crate::value::coerce;

/// Filter object keyed by property names and `$`-prefixed operators.
pub type FilterQuery = Map<String, Value>;

fn is_operator_map(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

fn as_object<'v>(key: &str, value: &'v Value) -> OrmResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| OrmError::InvalidFilter(format!("\"{key}\" expects an object")))
}

/// Compiles filters for one entity.
pub struct FilterCompiler<'a> {
    meta: &'a EntityMetadata,
    reference_key: &'a str,
}

impl<'a> FilterCompiler<'a> {
    /// `reference_key` is the naming strategy's reference column marker, the key
    /// used to address a to-one relation's identifier (`{ "user": { "id": .. } }`).
    #[must_use]
    pub fn new(meta: &'a EntityMetadata, reference_key: &'a str) -> Self {
        Self {
            meta,
            reference_key,
        }
    }

    /// Compile a whole filter. An empty filter matches every row.
    ///
    /// # Errors
    /// Returns `OrmError::InvalidFilter` for malformed filters, `UnknownProperty`
    /// for properties the entity does not declare, `UnsupportedProperty` for
    /// properties that have no single column, and `TypeMismatch` for values that
    /// do not fit the column.
    pub fn compile(&self, filter: &FilterQuery) -> OrmResult<Condition> {
        self.object(filter)
    }

    fn object(&self, filter: &Map<String, Value>) -> OrmResult<Condition> {
        let mut cond = Condition::all();
        for (key, value) in filter {
            let part = match key.as_str() {
                "$and" => self.group(key, value, Condition::all())?,
                "$or" => self.group(key, value, Condition::any())?,
                "$not" => self.object(as_object(key, value)?)?.not(),
                op if op.starts_with('$') => {
                    return Err(OrmError::InvalidFilter(format!(
                        "operator \"{op}\" must be applied to a property"
                    )));
                }
                property => self.property(property, value)?,
            };
            cond = cond.add(part);
        }
        Ok(cond)
    }

    fn group(&self, key: &str, value: &Value, mut acc: Condition) -> OrmResult<Condition> {
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(items) => items.values().collect(),
            _ => {
                return Err(OrmError::InvalidFilter(format!(
                    "\"{key}\" expects an array or an object of filters"
                )));
            }
        };
        for item in items {
            acc = acc.add(self.object(as_object(key, item)?)?);
        }
        Ok(acc)
    }

    fn property(&self, name: &str, value: &Value) -> OrmResult<Condition> {
        let prop = self.meta.require_property(name)?;
        let unsupported = |reason| OrmError::UnsupportedProperty {
            entity: self.meta.class_name.clone(),
            property: prop.name.clone(),
            reason,
        };

        if !prop.persist {
            return Err(unsupported("shadow properties cannot be queried"));
        }
        if !prop.kind.is_owning() {
            return Err(unsupported("only scalar and to-one properties can be queried"));
        }
        let column = prop
            .column()
            .ok_or_else(|| unsupported("relations to composite keys cannot be queried"))?;

        // `{ "user": { "id": x } }` addresses the foreign key column directly
        let value = match (prop.kind, value) {
            (ReferenceKind::ManyToOne, Value::Object(inner))
                if inner.len() == 1 && inner.contains_key(self.reference_key) =>
            {
                &inner[self.reference_key]
            }
            _ => value,
        };

        self.comparison(prop, column, value)
    }

    fn comparison(
        &self,
        prop: &PropertyDescriptor,
        column: &str,
        value: &Value,
    ) -> OrmResult<Condition> {
        match value {
            Value::Object(ops) if is_operator_map(ops) => {
                let mut cond = Condition::all();
                for (op, operand) in ops {
                    cond = cond.add(Self::operator(prop, column, op, operand)?);
                }
                Ok(cond)
            }
            Value::Object(_) => Err(OrmError::InvalidFilter(format!(
                "nested filter on \"{}.{}\" is not supported",
                self.meta.class_name, prop.name
            ))),
            Value::Array(_) => Ok(Condition::all().add(Self::operator(prop, column, "$in", value)?)),
            _ => Ok(Condition::all().add(Self::operator(prop, column, "$eq", value)?)),
        }
    }

    fn operator(
        prop: &PropertyDescriptor,
        column: &str,
        op: &str,
        operand: &Value,
    ) -> OrmResult<SimpleExpr> {
        let col = Expr::col(Alias::new(column));
        let value = |v: &Value| coerce(&prop.name, prop.field_kind, v);
        let list = |v: &Value| -> OrmResult<Vec<sea_orm::Value>> {
            v.as_array()
                .ok_or_else(|| {
                    OrmError::InvalidFilter(format!("\"{op}\" on \"{}\" expects an array", prop.name))
                })?
                .iter()
                .map(value)
                .collect()
        };

        Ok(match op {
            "$eq" if operand.is_null() => col.is_null(),
            "$eq" => col.eq(value(operand)?),
            "$ne" if operand.is_null() => col.is_not_null(),
            "$ne" => col.ne(value(operand)?),
            "$gt" => col.gt(value(operand)?),
            "$gte" => col.gte(value(operand)?),
            "$lt" => col.lt(value(operand)?),
            "$lte" => col.lte(value(operand)?),
            "$in" => {
                let values = list(operand)?;
                if values.is_empty() {
                    // IN () → always false
                    Expr::cust("1=0")
                } else {
                    col.is_in(values)
                }
            }
            "$nin" => {
                let values = list(operand)?;
                if values.is_empty() {
                    Expr::cust("1=1")
                } else {
                    col.is_not_in(values)
                }
            }
            "$like" => {
                let pattern = operand.as_str().ok_or_else(|| {
                    OrmError::InvalidFilter(format!("\"$like\" on \"{}\" expects a string", prop.name))
                })?;
                col.like(pattern)
            }
            other => {
                return Err(OrmError::InvalidFilter(format!(
                    "unsupported operator \"{other}\" on \"{}\"",
                    prop.name
                )));
            }
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::metadata::{EntitySchema, FieldKind, MetadataStorage, PropertySchema};
    use crate::naming::UnderscoreNamingStrategy;
    use sea_orm::sea_query::{Asterisk, Query, QueryStatementWriter, SqliteQueryBuilder};
    use serde_json::json;
    use std::sync::Arc;

    fn session_meta() -> Arc<EntityMetadata> {
        MetadataStorage::discover(
            vec![
                EntitySchema::new("User").property(PropertySchema::primary("id", FieldKind::String)),
                EntitySchema::new("Session")
                    .property(PropertySchema::primary("id", FieldKind::String))
                    .property(PropertySchema::scalar("token", FieldKind::String))
                    .property(PropertySchema::scalar("attempts", FieldKind::I64))
                    .property(PropertySchema::scalar("label", FieldKind::String).shadow())
                    .property(PropertySchema::many_to_one("user", "User")),
            ],
            &UnderscoreNamingStrategy,
        )
        .unwrap()
        .get("Session")
        .unwrap()
    }

    fn render(filter: &Value) -> String {
        let meta = session_meta();
        let cond = FilterCompiler::new(&meta, "id")
            .compile(filter.as_object().unwrap())
            .unwrap();
        Query::select()
            .column(Asterisk)
            .from(Alias::new("session"))
            .cond_where(cond)
            .to_string(SqliteQueryBuilder)
    }

    fn compile_err(filter: &Value) -> OrmError {
        let meta = session_meta();
        FilterCompiler::new(&meta, "id")
            .compile(filter.as_object().unwrap())
            .unwrap_err()
    }

    #[test]
    fn empty_filter_has_no_where_clause() {
        assert!(!render(&json!({})).contains("WHERE"));
    }

    #[test]
    fn equality_and_null_checks() {
        let sql = render(&json!({"token": "t1"}));
        assert!(sql.contains(r#""token" = 't1'"#), "{sql}");

        let sql = render(&json!({"token": null}));
        assert!(sql.contains(r#""token" IS NULL"#), "{sql}");

        let sql = render(&json!({"token": {"$ne": null}}));
        assert!(sql.contains(r#""token" IS NOT NULL"#), "{sql}");
    }

    #[test]
    fn relation_key_targets_join_column() {
        let sql = render(&json!({"user": {"id": "u1"}}));
        assert!(sql.contains(r#""user_id" = 'u1'"#), "{sql}");

        let sql = render(&json!({"user": {"id": {"$in": ["u1", "u2"]}}}));
        assert!(sql.contains(r#""user_id" IN ('u1', 'u2')"#), "{sql}");

        let sql = render(&json!({"user": "u3"}));
        assert!(sql.contains(r#""user_id" = 'u3'"#), "{sql}");
    }

    #[test]
    fn comparison_and_like_operators() {
        let sql = render(&json!({"attempts": {"$gte": 3, "$lt": 10}}));
        assert!(sql.contains(r#""attempts" >= 3"#), "{sql}");
        assert!(sql.contains(r#""attempts" < 10"#), "{sql}");

        let sql = render(&json!({"token": {"$like": "%abc%"}}));
        assert!(sql.contains(r#""token" LIKE '%abc%'"#), "{sql}");
    }

    #[test]
    fn empty_in_matches_nothing() {
        let sql = render(&json!({"id": {"$in": []}}));
        assert!(sql.contains("1=0"), "{sql}");
    }

    #[test]
    fn groups_accept_objects_and_arrays() {
        let sql = render(&json!({
            "$and": {"0": {"token": "a"}, "2": {"attempts": 1}},
            "$or": [{"id": "x"}, {"id": "y"}]
        }));
        assert!(sql.contains(r#""token" = 'a'"#), "{sql}");
        assert!(sql.contains(r#""attempts" = 1"#), "{sql}");
        assert!(sql.contains(r#""id" = 'x' OR "id" = 'y'"#), "{sql}");
    }

    #[test]
    fn rejects_invalid_filters() {
        assert!(matches!(
            compile_err(&json!({"missing": 1})),
            OrmError::UnknownProperty { .. }
        ));
        assert!(matches!(
            compile_err(&json!({"label": "x"})),
            OrmError::UnsupportedProperty { .. }
        ));
        assert!(matches!(
            compile_err(&json!({"attempts": "many"})),
            OrmError::TypeMismatch { .. }
        ));
        assert!(matches!(
            compile_err(&json!({"token": {"$regex": "a"}})),
            OrmError::InvalidFilter(_)
        ));
        assert!(matches!(
            compile_err(&json!({"$gt": 1})),
            OrmError::InvalidFilter(_)
        ));
        assert!(matches!(
            compile_err(&json!({"token": {"$in": "a"}})),
            OrmError::InvalidFilter(_)
        ));
    }
}
