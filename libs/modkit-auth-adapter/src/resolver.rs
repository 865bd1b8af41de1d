//! Model and field name resolution against the ORM metadata registry.

use std::sync::Arc;

use modkit_orm::{EntityMetadata, MetadataStorage, NamingStrategy, PropertyDescriptor, ReferenceKind};

use crate::error::{AdapterError, AdapterResult};
use crate::path::FieldPath;

/// Resolves framework model and field names into ORM metadata and field paths.
///
/// Holds only shared, read-only state; every method is a pure lookup.
#[derive(Clone)]
pub struct MetadataResolver {
    metadata: Arc<MetadataStorage>,
    naming: Arc<dyn NamingStrategy>,
}

impl MetadataResolver {
    #[must_use]
    pub fn new(metadata: Arc<MetadataStorage>, naming: Arc<dyn NamingStrategy>) -> Self {
        Self { metadata, naming }
    }

    #[must_use]
    pub fn naming(&self) -> &dyn NamingStrategy {
        self.naming.as_ref()
    }

    /// Entity name as the registry indexes it: `custom_user` → `CustomUser`.
    #[must_use]
    pub fn normalize_entity_name(&self, name: &str) -> String {
        self.naming
            .entity_name(&self.naming.class_to_table_name(name))
    }

    /// # Errors
    /// Returns `AdapterError::EntityNotFound` with the normalized name when the
    /// entity is not registered.
    pub fn entity_metadata(&self, model: &str) -> AdapterResult<Arc<EntityMetadata>> {
        let name = self.normalize_entity_name(model);
        self.metadata
            .get(&name)
            .ok_or(AdapterError::EntityNotFound(name))
    }

    /// First property named `field` (scalar or to-one), or whose persisted
    /// columns contain `field`'s column name.
    ///
    /// Collections own no columns; when nothing else matches they are still
    /// found by name so callers can reject them as unsupported references.
    ///
    /// # Errors
    /// Returns `AdapterError::FieldNotFound` when nothing matches.
    pub fn property_metadata<'m>(
        &self,
        meta: &'m EntityMetadata,
        field: &str,
    ) -> AdapterResult<&'m PropertyDescriptor> {
        let column = self.naming.property_to_column_name(field);
        meta.props
            .iter()
            .find(|prop| {
                let by_name = prop.name == field
                    && matches!(prop.kind, ReferenceKind::Scalar | ReferenceKind::ManyToOne);
                by_name || prop.field_names.contains(&column)
            })
            .or_else(|| {
                meta.props
                    .iter()
                    .find(|prop| prop.name == field && !prop.kind.is_owning())
            })
            .ok_or_else(|| AdapterError::FieldNotFound {
                entity: meta.class_name.clone(),
                field: field.to_owned(),
            })
    }

    /// Path addressing `field` inside a persisted record.
    ///
    /// With `strict`, shadow properties are rejected; filters use strict
    /// resolution, record payloads do not.
    ///
    /// # Errors
    /// `FieldNotFound`, `UnsupportedField` for strict shadow properties, and
    /// `UnsupportedReference` for collections, embeddables and to-one relations
    /// to composite keys.
    pub fn field_path(
        &self,
        meta: &EntityMetadata,
        field: &str,
        strict: bool,
    ) -> AdapterResult<FieldPath> {
        let prop = self.property_metadata(meta, field)?;

        if strict && !prop.persist {
            return Err(AdapterError::UnsupportedField {
                field: field.to_owned(),
                table: meta.table_name.clone(),
            });
        }

        match prop.kind {
            ReferenceKind::Scalar => Ok(FieldPath::Scalar(prop.name.clone())),
            ReferenceKind::ManyToOne if prop.referenced_pks.len() > 1 => {
                Err(AdapterError::UnsupportedReference(format!(
                    "The \"{field}\" field references to a table \"{}\" with complex primary key, which is not supported",
                    prop.name
                )))
            }
            ReferenceKind::ManyToOne => Ok(FieldPath::Relation {
                property: prop.name.clone(),
                key: self.naming.reference_column_name(),
            }),
            _ => Err(AdapterError::UnsupportedReference(format!(
                "Cannot normalize \"{field}\" field name into path for \"{}\" entity.",
                meta.class_name
            ))),
        }
    }

    /// Logical field name reported for `prop` in output records.
    ///
    /// Scalars keep their name; to-one relations report their foreign key as a
    /// property (`user` → `userId`).
    ///
    /// # Errors
    /// Returns `AdapterError::UnsupportedReference` for any other reference kind.
    pub fn referenced_property_name(
        &self,
        meta: &EntityMetadata,
        prop: &PropertyDescriptor,
    ) -> AdapterResult<String> {
        match prop.kind {
            ReferenceKind::Scalar => Ok(prop.name.clone()),
            ReferenceKind::ManyToOne => Ok(self
                .naming
                .column_name_to_property(&self.naming.join_column_name(&prop.name))),
            kind => Err(AdapterError::UnsupportedReference(format!(
                "Reference kind {kind} is not supported. Defined in \"{}\" entity for \"{}\" field.",
                meta.class_name, prop.name
            ))),
        }
    }
}
