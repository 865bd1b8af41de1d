#![cfg(feature = "sqlite")]

use modkit_orm::{
    DbConnTrait, EntityMetadata, EntitySchema, FieldKind, FindOptions, NativeRecord, OrderBy, Orm,
    OrmConfig, OrmError, PropertyDefault, PropertySchema, SortOrder, UnderscoreNamingStrategy,
};
use sea_orm::{ConnectOptions, Database};
use serde_json::{Value, json};
use std::sync::Arc;

const DDL: &[&str] = &[
    "CREATE TABLE user (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        email_verified BOOLEAN NOT NULL,
        age INTEGER NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE session (
        id TEXT PRIMARY KEY NOT NULL,
        token TEXT NOT NULL,
        user_id TEXT NOT NULL REFERENCES user(id),
        expires_at TEXT NOT NULL
    )",
    "CREATE TABLE counter (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        label TEXT NOT NULL
    )",
];

fn schemas() -> Vec<EntitySchema> {
    vec![
        EntitySchema::new("User")
            .property(
                PropertySchema::primary("id", FieldKind::String)
                    .default_value(PropertyDefault::UuidV7),
            )
            .property(PropertySchema::scalar("name", FieldKind::String))
            .property(PropertySchema::scalar("email", FieldKind::String))
            .property(
                PropertySchema::scalar("emailVerified", FieldKind::Bool)
                    .default_value(PropertyDefault::Value(json!(false))),
            )
            .property(PropertySchema::scalar("age", FieldKind::I64).nullable())
            .property(
                PropertySchema::scalar("createdAt", FieldKind::DateTimeUtc)
                    .default_value(PropertyDefault::Now),
            )
            .property(
                PropertySchema::scalar("updatedAt", FieldKind::DateTimeUtc)
                    .default_value(PropertyDefault::Now)
                    .on_update(PropertyDefault::Now),
            ),
        EntitySchema::new("Session")
            .property(PropertySchema::primary("id", FieldKind::String))
            .property(PropertySchema::scalar("token", FieldKind::String))
            .property(PropertySchema::many_to_one("user", "User"))
            .property(PropertySchema::scalar("expiresAt", FieldKind::DateTimeUtc)),
        EntitySchema::new("Counter")
            .property(PropertySchema::primary("id", FieldKind::I64))
            .property(PropertySchema::scalar("label", FieldKind::String)),
    ]
}

async fn setup() -> anyhow::Result<Orm> {
    let orm = Orm::connect(&OrmConfig::default(), schemas()).await?;
    for ddl in DDL {
        orm.conn().execute_unprepared(ddl).await?;
    }
    Ok(orm)
}

fn meta(orm: &Orm, class: &str) -> Arc<EntityMetadata> {
    orm.metadata().get(class).unwrap()
}

fn record(v: Value) -> NativeRecord {
    match v {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

async fn seed_users(orm: &Orm) -> anyhow::Result<()> {
    let users = meta(orm, "User");
    for (id, name, age) in [("u1", "Ann", 31), ("u2", "Bob", 25), ("u3", "Cid", 40)] {
        orm.em()
            .create(
                &users,
                record(json!({"id": id, "name": name, "email": format!("{id}@x.io"), "age": age})),
            )
            .await?;
    }
    Ok(())
}

#[tokio::test]
async fn create_applies_defaults_and_returns_stored_row() -> anyhow::Result<()> {
    let orm = setup().await?;
    let users = meta(&orm, "User");

    let user = orm
        .em()
        .create(&users, record(json!({"name": "Ann", "email": "ann@x.io"})))
        .await?;

    let id = user.get("id").and_then(Value::as_str).unwrap();
    assert_eq!(id.len(), 36);
    assert_eq!(user.get("emailVerified"), Some(&json!(false)));
    assert_eq!(user.get("age"), Some(&Value::Null));
    assert!(user.get("createdAt").and_then(Value::as_str).is_some());

    let found = orm
        .em()
        .find_one(&users, &record(json!({"id": id})))
        .await?
        .unwrap();
    assert_eq!(found, user);
    Ok(())
}

#[tokio::test]
async fn integer_keys_come_from_the_database() -> anyhow::Result<()> {
    let orm = setup().await?;
    let counters = meta(&orm, "Counter");

    let first = orm.em().create(&counters, record(json!({"label": "a"}))).await?;
    let second = orm.em().create(&counters, record(json!({"label": "b"}))).await?;

    assert_eq!(first.get("id"), Some(&json!(1)));
    assert_eq!(second.get("id"), Some(&json!(2)));
    Ok(())
}

#[tokio::test]
async fn orm_over_existing_connection() -> anyhow::Result<()> {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1);
    let conn = Database::connect(opts).await?;
    conn.execute_unprepared(DDL[2]).await?;

    let orm = Orm::new(conn, Arc::new(UnderscoreNamingStrategy), schemas())?;
    assert_eq!(orm.metadata().len(), 3);

    let counters = meta(&orm, "Counter");
    let counter = orm.em().create(&counters, record(json!({"label": "a"}))).await?;
    assert_eq!(counter.class_name(), "Counter");
    assert_eq!(orm.em().count(&counters, &NativeRecord::new()).await?, 1);
    Ok(())
}

#[tokio::test]
async fn find_sorts_and_pages() -> anyhow::Result<()> {
    let orm = setup().await?;
    seed_users(&orm).await?;
    let users = meta(&orm, "User");

    let options = FindOptions {
        limit: Some(2),
        offset: Some(1),
        order_by: vec![OrderBy {
            property: "age".to_owned(),
            order: SortOrder::Desc,
        }],
    };
    let page = orm.em().find(&users, &record(json!({})), &options).await?;
    let ids: Vec<_> = page.iter().map(|u| u.get("id").cloned()).collect();
    assert_eq!(ids, vec![Some(json!("u1")), Some(json!("u2"))]);

    let only_offset = FindOptions {
        offset: Some(2),
        order_by: vec![OrderBy {
            property: "name".to_owned(),
            order: SortOrder::Asc,
        }],
        ..FindOptions::default()
    };
    let tail = orm.em().find(&users, &record(json!({})), &only_offset).await?;
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].get("name"), Some(&json!("Cid")));
    Ok(())
}

#[tokio::test]
async fn count_honors_operators_and_groups() -> anyhow::Result<()> {
    let orm = setup().await?;
    seed_users(&orm).await?;
    let users = meta(&orm, "User");

    assert_eq!(orm.em().count(&users, &record(json!({}))).await?, 3);
    assert_eq!(
        orm.em()
            .count(&users, &record(json!({"age": {"$gte": 31}})))
            .await?,
        2
    );
    assert_eq!(
        orm.em()
            .count(
                &users,
                &record(json!({"$or": [{"name": "Bob"}, {"email": {"$like": "u3%"}}]}))
            )
            .await?,
        2
    );
    assert_eq!(
        orm.em()
            .count(&users, &record(json!({"id": {"$in": []}})))
            .await?,
        0
    );
    Ok(())
}

#[tokio::test]
async fn relations_are_written_and_filtered_by_key() -> anyhow::Result<()> {
    let orm = setup().await?;
    seed_users(&orm).await?;
    let sessions = meta(&orm, "Session");

    orm.em()
        .create(
            &sessions,
            record(json!({
                "id": "s1", "token": "t1", "user": {"id": "u1"},
                "expiresAt": "2030-01-01T00:00:00Z"
            })),
        )
        .await?;
    orm.em()
        .create(
            &sessions,
            record(json!({
                "id": "s2", "token": "t2", "user": "u2",
                "expiresAt": "2020-01-01T00:00:00Z"
            })),
        )
        .await?;

    let s1 = orm
        .em()
        .find_one(&sessions, &record(json!({"user": {"id": "u1"}})))
        .await?
        .unwrap();
    assert_eq!(s1.get("id"), Some(&json!("s1")));
    assert_eq!(s1.get("user"), Some(&json!("u1")));
    assert_eq!(s1.get("expiresAt"), Some(&json!("2030-01-01T00:00:00.000Z")));

    let expired = orm
        .em()
        .native_delete(
            &sessions,
            &record(json!({"expiresAt": {"$lt": "2025-01-01T00:00:00Z"}})),
        )
        .await?;
    assert_eq!(expired, 1);
    assert_eq!(orm.em().count(&sessions, &record(json!({}))).await?, 1);
    Ok(())
}

#[tokio::test]
async fn assign_and_native_update() -> anyhow::Result<()> {
    let orm = setup().await?;
    seed_users(&orm).await?;
    let users = meta(&orm, "User");

    let ann = orm
        .em()
        .find_one(&users, &record(json!({"id": "u1"})))
        .await?
        .unwrap();
    let updated = orm
        .em()
        .assign_and_flush(&users, ann, record(json!({"name": "Anna", "emailVerified": true})))
        .await?;
    assert_eq!(updated.get("name"), Some(&json!("Anna")));
    assert_eq!(updated.get("emailVerified"), Some(&json!(true)));
    assert_eq!(updated.get("email"), Some(&json!("u1@x.io")));

    let affected = orm
        .em()
        .native_update(
            &users,
            &record(json!({"age": {"$lt": 35}})),
            record(json!({"age": null})),
        )
        .await?;
    assert_eq!(affected, 2);
    assert_eq!(
        orm.em().count(&users, &record(json!({"age": null}))).await?,
        2
    );
    Ok(())
}

#[tokio::test]
async fn remove_and_flush_deletes_one_row() -> anyhow::Result<()> {
    let orm = setup().await?;
    seed_users(&orm).await?;
    let users = meta(&orm, "User");

    let bob = orm
        .em()
        .find_one(&users, &record(json!({"name": "Bob"})))
        .await?
        .unwrap();
    orm.em().remove_and_flush(&users, &bob).await?;

    assert!(
        orm.em()
            .find_one(&users, &record(json!({"id": "u2"})))
            .await?
            .is_none()
    );
    assert_eq!(orm.em().count(&users, &record(json!({}))).await?, 2);
    Ok(())
}

#[tokio::test]
async fn failed_create_leaves_no_row() -> anyhow::Result<()> {
    let orm = setup().await?;
    seed_users(&orm).await?;
    let users = meta(&orm, "User");

    let err = orm
        .em()
        .create(&users, record(json!({"id": "u1", "name": "Dup", "email": "d@x.io"})))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Db(_)));

    let err = orm
        .em()
        .create(&users, record(json!({"name": "X", "email": "x@x.io", "nickname": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::UnknownProperty { .. }));

    assert_eq!(orm.em().count(&users, &record(json!({}))).await?, 3);
    Ok(())
}
