//! Entity metadata: declarative schemas in, resolved immutable descriptors out.
//!
//! Applications describe their entities with [`EntitySchema`] / [`PropertySchema`].
//! [`MetadataStorage::discover`] resolves table and column names through the
//! configured [`NamingStrategy`], links to-one relations to their targets and
//! freezes the result. The storage is read-only afterwards and shared via `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::naming::NamingStrategy;

/// Logical value types a persisted column can hold.
///
/// Drives value coercion in filters and writes, and row decoding on reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Bool,
    DateTimeUtc,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::String => write!(f, "String"),
            FieldKind::I64 => write!(f, "I64"),
            FieldKind::F64 => write!(f, "F64"),
            FieldKind::Bool => write!(f, "Bool"),
            FieldKind::DateTimeUtc => write!(f, "DateTimeUtc"),
        }
    }
}

/// How a property is stored relative to its owning entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    Scalar,
    ManyToOne,
    OneToMany,
    ManyToMany,
    Embedded,
}

impl ReferenceKind {
    /// Whether the property owns a column on the entity's table.
    #[must_use]
    pub fn is_owning(self) -> bool {
        matches!(self, ReferenceKind::Scalar | ReferenceKind::ManyToOne)
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Scalar => write!(f, "scalar"),
            ReferenceKind::ManyToOne => write!(f, "m:1"),
            ReferenceKind::OneToMany => write!(f, "1:m"),
            ReferenceKind::ManyToMany => write!(f, "m:n"),
            ReferenceKind::Embedded => write!(f, "embedded"),
        }
    }
}

/// Value generated by the entity manager when a property is not supplied.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyDefault {
    UuidV7,
    Now,
    Value(Value),
}

impl PropertyDefault {
    #[must_use]
    pub fn generate(&self) -> Value {
        match self {
            PropertyDefault::UuidV7 => Value::String(uuid::Uuid::now_v7().to_string()),
            PropertyDefault::Now => Value::String(crate::value::now_rfc3339()),
            PropertyDefault::Value(v) => v.clone(),
        }
    }
}

/// Resolved description of a single entity property.
#[derive(Clone, Debug)]
pub struct PropertyDescriptor {
    pub name: String,
    /// Persisted columns. One for scalars, embeddables and single-key relations,
    /// empty for collections.
    pub field_names: Vec<String>,
    pub kind: ReferenceKind,
    /// Value type of the column; for relations, the referenced key's type.
    pub field_kind: FieldKind,
    pub primary: bool,
    pub nullable: bool,
    /// `false` marks shadow properties that never reach the database.
    pub persist: bool,
    pub hidden: bool,
    pub default: Option<PropertyDefault>,
    pub on_update: Option<PropertyDefault>,
    /// Class name of the relation target.
    pub target: Option<String>,
    /// Primary key property names of the relation target.
    pub referenced_pks: Vec<String>,
}

impl PropertyDescriptor {
    /// Column holding this property's value, if it maps to exactly one.
    #[must_use]
    pub fn column(&self) -> Option<&str> {
        match self.field_names.as_slice() {
            [single] => Some(single.as_str()),
            _ => None,
        }
    }

    /// Whether rows carry a value for this property.
    #[must_use]
    pub fn is_loadable(&self) -> bool {
        self.persist && self.kind.is_owning() && self.column().is_some()
    }
}

/// Resolved, immutable description of an entity.
#[derive(Clone, Debug)]
pub struct EntityMetadata {
    pub class_name: String,
    pub table_name: String,
    pub props: Vec<PropertyDescriptor>,
    pub primary_keys: Vec<String>,
}

impl EntityMetadata {
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.props.iter().find(|p| p.name == name)
    }

    /// Looks up a property or reports it as unknown on this entity.
    ///
    /// # Errors
    /// Returns `OrmError::UnknownProperty` when the entity has no such property.
    pub fn require_property(&self, name: &str) -> OrmResult<&PropertyDescriptor> {
        self.property(name).ok_or_else(|| OrmError::UnknownProperty {
            entity: self.class_name.clone(),
            property: name.to_owned(),
        })
    }

    /// The single primary key property.
    ///
    /// # Errors
    /// Returns `OrmError::UnsupportedProperty` for composite keys and
    /// `OrmError::InvalidMetadata` when no key is declared.
    pub fn primary_key(&self) -> OrmResult<&PropertyDescriptor> {
        match self.primary_keys.as_slice() {
            [single] => self.require_property(single),
            [] => Err(OrmError::InvalidMetadata(format!(
                "entity \"{}\" declares no primary key",
                self.class_name
            ))),
            [first, ..] => Err(OrmError::UnsupportedProperty {
                entity: self.class_name.clone(),
                property: first.clone(),
                reason: "composite primary keys are not supported",
            }),
        }
    }

    pub fn loadable_props(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.props.iter().filter(|p| p.is_loadable())
    }
}

/// Declarative property definition.
#[derive(Clone, Debug)]
pub struct PropertySchema {
    name: String,
    kind: ReferenceKind,
    field_kind: FieldKind,
    column: Option<String>,
    target: Option<String>,
    primary: bool,
    nullable: bool,
    persist: bool,
    hidden: bool,
    default: Option<PropertyDefault>,
    on_update: Option<PropertyDefault>,
}

impl PropertySchema {
    fn new(name: impl Into<String>, kind: ReferenceKind, field_kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            field_kind,
            column: None,
            target: None,
            primary: false,
            nullable: false,
            persist: true,
            hidden: false,
            default: None,
            on_update: None,
        }
    }

    #[must_use]
    pub fn primary(name: impl Into<String>, field_kind: FieldKind) -> Self {
        let mut prop = Self::new(name, ReferenceKind::Scalar, field_kind);
        prop.primary = true;
        prop
    }

    #[must_use]
    pub fn scalar(name: impl Into<String>, field_kind: FieldKind) -> Self {
        Self::new(name, ReferenceKind::Scalar, field_kind)
    }

    #[must_use]
    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        // field kind is replaced by the target's key kind during discovery
        let mut prop = Self::new(name, ReferenceKind::ManyToOne, FieldKind::String);
        prop.target = Some(target.into());
        prop
    }

    #[must_use]
    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        let mut prop = Self::new(name, ReferenceKind::OneToMany, FieldKind::String);
        prop.target = Some(target.into());
        prop
    }

    #[must_use]
    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        let mut prop = Self::new(name, ReferenceKind::ManyToMany, FieldKind::String);
        prop.target = Some(target.into());
        prop
    }

    /// An embeddable stored inline as one object column.
    #[must_use]
    pub fn embedded(name: impl Into<String>) -> Self {
        Self::new(name, ReferenceKind::Embedded, FieldKind::String)
    }

    /// Overrides the column name produced by the naming strategy.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the property as a shadow property that is never persisted.
    #[must_use]
    pub fn shadow(mut self) -> Self {
        self.persist = false;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, default: PropertyDefault) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn on_update(mut self, value: PropertyDefault) -> Self {
        self.on_update = Some(value);
        self
    }
}

/// Declarative entity definition.
#[derive(Clone, Debug)]
pub struct EntitySchema {
    class_name: String,
    table_name: Option<String>,
    properties: Vec<PropertySchema>,
}

impl EntitySchema {
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            table_name: None,
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    #[must_use]
    pub fn property(mut self, property: PropertySchema) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

/// Registry of resolved entity metadata keyed by class name.
#[derive(Debug, Default)]
pub struct MetadataStorage {
    entities: HashMap<String, Arc<EntityMetadata>>,
}

impl MetadataStorage {
    /// Resolves every schema against the naming strategy and links relations.
    ///
    /// # Errors
    /// Returns `OrmError::InvalidMetadata` for duplicate entities or properties,
    /// relations to unknown entities and relations to keyless entities.
    pub fn discover(schemas: Vec<EntitySchema>, naming: &dyn NamingStrategy) -> OrmResult<Self> {
        let mut keys: HashMap<String, Vec<(String, String, FieldKind)>> = HashMap::new();
        for schema in &schemas {
            let pks = schema
                .properties
                .iter()
                .filter(|p| p.primary)
                .map(|p| {
                    let column = p
                        .column
                        .clone()
                        .unwrap_or_else(|| naming.property_to_column_name(&p.name));
                    (p.name.clone(), column, p.field_kind)
                })
                .collect();
            if keys.insert(schema.class_name.clone(), pks).is_some() {
                return Err(OrmError::InvalidMetadata(format!(
                    "entity \"{}\" is registered twice",
                    schema.class_name
                )));
            }
        }

        let mut entities = HashMap::with_capacity(schemas.len());
        for schema in schemas {
            let meta = Self::resolve(schema, naming, &keys)?;
            tracing::debug!(
                entity = %meta.class_name,
                table = %meta.table_name,
                props = meta.props.len(),
                "discovered entity"
            );
            entities.insert(meta.class_name.clone(), Arc::new(meta));
        }

        Ok(Self { entities })
    }

    fn resolve(
        schema: EntitySchema,
        naming: &dyn NamingStrategy,
        keys: &HashMap<String, Vec<(String, String, FieldKind)>>,
    ) -> OrmResult<EntityMetadata> {
        let table_name = schema
            .table_name
            .unwrap_or_else(|| naming.class_to_table_name(&schema.class_name));

        let mut props: Vec<PropertyDescriptor> = Vec::with_capacity(schema.properties.len());
        for p in schema.properties {
            if props.iter().any(|existing| existing.name == p.name) {
                return Err(OrmError::InvalidMetadata(format!(
                    "property \"{}\" is declared twice on entity \"{}\"",
                    p.name, schema.class_name
                )));
            }

            let mut field_kind = p.field_kind;
            let mut referenced_pks = Vec::new();
            let field_names = match p.kind {
                // embeddables are stored as a single object column
                ReferenceKind::Scalar | ReferenceKind::Embedded => vec![
                    p.column
                        .clone()
                        .unwrap_or_else(|| naming.property_to_column_name(&p.name)),
                ],
                ReferenceKind::ManyToOne => {
                    let target = p.target.as_deref().unwrap_or_default();
                    let target_keys = keys.get(target).ok_or_else(|| {
                        OrmError::InvalidMetadata(format!(
                            "property \"{}\" on entity \"{}\" references unknown entity \"{target}\"",
                            p.name, schema.class_name
                        ))
                    })?;
                    let Some((_, _, key_kind)) = target_keys.first() else {
                        return Err(OrmError::InvalidMetadata(format!(
                            "entity \"{target}\" referenced by \"{}.{}\" declares no primary key",
                            schema.class_name, p.name
                        )));
                    };
                    field_kind = *key_kind;
                    referenced_pks = target_keys.iter().map(|(name, _, _)| name.clone()).collect();

                    match (&p.column, target_keys.as_slice()) {
                        (Some(column), [_]) => vec![column.clone()],
                        (None, [_]) => vec![naming.join_column_name(&p.name)],
                        (_, many) => many
                            .iter()
                            .map(|(_, column, _)| {
                                format!("{}_{column}", naming.property_to_column_name(&p.name))
                            })
                            .collect(),
                    }
                }
                ReferenceKind::OneToMany | ReferenceKind::ManyToMany => Vec::new(),
            };

            props.push(PropertyDescriptor {
                name: p.name,
                field_names,
                kind: p.kind,
                field_kind,
                primary: p.primary,
                nullable: p.nullable,
                persist: p.persist,
                hidden: p.hidden,
                default: p.default,
                on_update: p.on_update,
                target: p.target,
                referenced_pks,
            });
        }

        let primary_keys = props
            .iter()
            .filter(|p| p.primary)
            .map(|p| p.name.clone())
            .collect();

        Ok(EntityMetadata {
            class_name: schema.class_name,
            table_name,
            props,
            primary_keys,
        })
    }

    #[must_use]
    pub fn has(&self, class_name: &str) -> bool {
        self.entities.contains_key(class_name)
    }

    #[must_use]
    pub fn get(&self, class_name: &str) -> Option<Arc<EntityMetadata>> {
        self.entities.get(class_name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityMetadata>> {
        self.entities.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::naming::UnderscoreNamingStrategy;

    fn schemas() -> Vec<EntitySchema> {
        vec![
            EntitySchema::new("User")
                .property(
                    PropertySchema::primary("id", FieldKind::String)
                        .default_value(PropertyDefault::UuidV7),
                )
                .property(PropertySchema::scalar("email", FieldKind::String))
                .property(PropertySchema::scalar("emailVerified", FieldKind::Bool))
                .property(PropertySchema::one_to_many("sessions", "Session"))
                .property(PropertySchema::embedded("address")),
            EntitySchema::new("Session")
                .property(PropertySchema::primary("id", FieldKind::I64))
                .property(PropertySchema::many_to_one("user", "User")),
        ]
    }

    #[test]
    fn discover_resolves_names_and_relations() {
        let storage = MetadataStorage::discover(schemas(), &UnderscoreNamingStrategy).unwrap();
        assert_eq!(storage.len(), 2);

        let user = storage.get("User").unwrap();
        assert_eq!(user.table_name, "user");
        assert_eq!(user.primary_keys, vec!["id".to_owned()]);
        assert_eq!(
            user.property("emailVerified").unwrap().field_names,
            vec!["email_verified".to_owned()]
        );
        assert!(user.property("sessions").unwrap().field_names.is_empty());
        let address = user.property("address").unwrap();
        assert_eq!(address.column(), Some("address"));
        assert!(!address.is_loadable());
        assert_eq!(user.loadable_props().count(), 3);

        let session = storage.get("Session").unwrap();
        let rel = session.property("user").unwrap();
        assert_eq!(rel.kind, ReferenceKind::ManyToOne);
        assert_eq!(rel.column(), Some("user_id"));
        assert_eq!(rel.field_kind, FieldKind::String);
        assert_eq!(rel.referenced_pks, vec!["id".to_owned()]);
    }

    #[test]
    fn discover_rejects_unknown_relation_target() {
        let err = MetadataStorage::discover(
            vec![EntitySchema::new("Session").property(PropertySchema::many_to_one("user", "User"))],
            &UnderscoreNamingStrategy,
        )
        .unwrap_err();
        assert!(matches!(err, OrmError::InvalidMetadata(_)));
    }

    #[test]
    fn discover_rejects_duplicate_entities() {
        let err = MetadataStorage::discover(
            vec![EntitySchema::new("User"), EntitySchema::new("User")],
            &UnderscoreNamingStrategy,
        )
        .unwrap_err();
        assert!(err.to_string().contains("registered twice"));
    }

    #[test]
    fn composite_target_yields_one_column_per_key() {
        let storage = MetadataStorage::discover(
            vec![
                EntitySchema::new("Tenant")
                    .property(PropertySchema::primary("orgId", FieldKind::String))
                    .property(PropertySchema::primary("slug", FieldKind::String)),
                EntitySchema::new("Member").property(PropertySchema::many_to_one("tenant", "Tenant")),
            ],
            &UnderscoreNamingStrategy,
        )
        .unwrap();

        let tenant = storage.get("Tenant").unwrap();
        assert!(tenant.primary_key().is_err());

        let member = storage.get("Member").unwrap();
        let rel = member.property("tenant").unwrap();
        assert_eq!(rel.referenced_pks.len(), 2);
        assert_eq!(
            rel.field_names,
            vec!["tenant_org_id".to_owned(), "tenant_slug".to_owned()]
        );
        assert!(!rel.is_loadable());
    }
}
