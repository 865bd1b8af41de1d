#![allow(dead_code)]

use std::sync::Arc;

use modkit_auth_adapter::{AdapterConfig, OrmAdapter, Record};
use modkit_orm::{
    DbConnTrait, EntitySchema, FieldKind, Orm, OrmConfig, PropertyDefault, PropertySchema,
};
use serde_json::Value;

const DDL: &[&str] = &[
    "CREATE TABLE user (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        email_verified BOOLEAN NOT NULL,
        image TEXT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE session (
        id TEXT PRIMARY KEY NOT NULL,
        token TEXT NOT NULL,
        user_id TEXT NOT NULL REFERENCES user(id),
        expires_at TEXT NOT NULL,
        ip_address TEXT NULL
    )",
    "CREATE TABLE verification (
        id TEXT PRIMARY KEY NOT NULL,
        identifier TEXT NOT NULL,
        value TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )",
    "CREATE TABLE custom_user (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        email_address TEXT NOT NULL
    )",
];

fn timestamps(schema: EntitySchema) -> EntitySchema {
    schema
        .property(
            PropertySchema::scalar("createdAt", FieldKind::DateTimeUtc)
                .default_value(PropertyDefault::Now),
        )
        .property(
            PropertySchema::scalar("updatedAt", FieldKind::DateTimeUtc)
                .default_value(PropertyDefault::Now)
                .on_update(PropertyDefault::Now),
        )
}

pub fn schemas() -> Vec<EntitySchema> {
    vec![
        timestamps(
            EntitySchema::new("User")
                .property(PropertySchema::primary("id", FieldKind::String))
                .property(PropertySchema::scalar("name", FieldKind::String))
                .property(PropertySchema::scalar("email", FieldKind::String))
                .property(
                    PropertySchema::scalar("emailVerified", FieldKind::Bool)
                        .default_value(PropertyDefault::Value(Value::Bool(false))),
                )
                .property(PropertySchema::scalar("image", FieldKind::String).nullable())
                .property(PropertySchema::one_to_many("sessions", "Session")),
        ),
        EntitySchema::new("Session")
            .property(PropertySchema::primary("id", FieldKind::String))
            .property(PropertySchema::scalar("token", FieldKind::String))
            .property(PropertySchema::many_to_one("user", "User"))
            .property(PropertySchema::scalar("expiresAt", FieldKind::DateTimeUtc))
            .property(PropertySchema::scalar("ipAddress", FieldKind::String).nullable()),
        EntitySchema::new("Verification")
            .property(
                PropertySchema::primary("id", FieldKind::String)
                    .default_value(PropertyDefault::UuidV7),
            )
            .property(PropertySchema::scalar("identifier", FieldKind::String))
            .property(PropertySchema::scalar("value", FieldKind::String))
            .property(PropertySchema::scalar("expiresAt", FieldKind::DateTimeUtc)),
        EntitySchema::new("CustomUser")
            .property(PropertySchema::primary("id", FieldKind::String))
            .property(PropertySchema::scalar("name", FieldKind::String))
            .property(PropertySchema::scalar("emailAddress", FieldKind::String)),
    ]
}

pub async fn orm() -> anyhow::Result<Arc<Orm>> {
    let orm = Orm::connect(&OrmConfig::default(), schemas()).await?;
    for ddl in DDL {
        orm.conn().execute_unprepared(ddl).await?;
    }
    Ok(Arc::new(orm))
}

pub async fn adapter(config: AdapterConfig) -> anyhow::Result<OrmAdapter> {
    Ok(OrmAdapter::new(orm().await?, config))
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub fn str_field<'r>(record: &'r Record, field: &str) -> &'r str {
    record
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("{field} missing in {record:?}"))
}
