//! JSON ⇄ `SeaORM` value conversion driven by [`FieldKind`].

use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::QueryResult;
use serde_json::Value as Json;

use crate::error::{OrmError, OrmResult};
use crate::metadata::FieldKind;

pub(crate) fn now_rfc3339() -> String {
    format_datetime(&Utc::now())
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn json_type_name(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn null_of(kind: FieldKind) -> sea_orm::Value {
    match kind {
        FieldKind::String => sea_orm::Value::String(None),
        FieldKind::I64 => sea_orm::Value::BigInt(None),
        FieldKind::F64 => sea_orm::Value::Double(None),
        FieldKind::Bool => sea_orm::Value::Bool(None),
        FieldKind::DateTimeUtc => sea_orm::Value::ChronoDateTimeUtc(None),
    }
}

/// Coerce a JSON value into a typed `SeaORM` value for the given column kind.
///
/// # Errors
/// Returns `OrmError::TypeMismatch` when the JSON value cannot represent `kind`.
pub fn coerce(property: &str, kind: FieldKind, v: &Json) -> OrmResult<sea_orm::Value> {
    let mismatch = || OrmError::TypeMismatch {
        property: property.to_owned(),
        expected: kind,
        got: json_type_name(v),
    };

    Ok(match (kind, v) {
        (_, Json::Null) => null_of(kind),

        (FieldKind::String, Json::String(s)) => sea_orm::Value::String(Some(Box::new(s.clone()))),

        (FieldKind::I64, Json::Number(n)) => {
            sea_orm::Value::BigInt(Some(n.as_i64().ok_or_else(mismatch)?))
        }

        (FieldKind::F64, Json::Number(n)) => {
            sea_orm::Value::Double(Some(n.as_f64().ok_or_else(mismatch)?))
        }

        (FieldKind::Bool, Json::Bool(b)) => sea_orm::Value::Bool(Some(*b)),

        (FieldKind::DateTimeUtc, Json::String(s)) => {
            let dt = DateTime::parse_from_rfc3339(s)
                .map_err(|_| mismatch())?
                .with_timezone(&Utc);
            sea_orm::Value::ChronoDateTimeUtc(Some(Box::new(dt)))
        }

        _ => return Err(mismatch()),
    })
}

/// Read one column of a result row back into JSON.
///
/// # Errors
/// Returns `OrmError::Db` when the column is missing or has an incompatible type.
pub fn decode(row: &QueryResult, column: &str, kind: FieldKind) -> OrmResult<Json> {
    Ok(match kind {
        FieldKind::String => row
            .try_get::<Option<String>>("", column)?
            .map_or(Json::Null, Json::String),
        FieldKind::I64 => row
            .try_get::<Option<i64>>("", column)?
            .map_or(Json::Null, Json::from),
        FieldKind::F64 => row
            .try_get::<Option<f64>>("", column)?
            .map_or(Json::Null, Json::from),
        FieldKind::Bool => row
            .try_get::<Option<bool>>("", column)?
            .map_or(Json::Null, Json::Bool),
        FieldKind::DateTimeUtc => row
            .try_get::<Option<DateTime<Utc>>>("", column)?
            .map_or(Json::Null, |dt| Json::String(format_datetime(&dt))),
    })
}
