//! Entity registry and relation resolution.
//!
//! Resolution is a pure lookup: it follows inverse sides to the owning
//! declaration, fills in default join-column / join-table names, and checks
//! that every referenced column exists.

use crate::metadata::entity::EntityMetadata;
use crate::metadata::relation::{
    ForeignKeyColumn, JoinColumn, JoinTableDef, JoinTableDescriptor, RelationDescriptor,
    RelationKind, RelationMetadata,
};
use crate::relation_id::error::RelationIdError;
use std::collections::HashMap;

/// All known entities, by name
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: HashMap<String, EntityMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity; a later registration under the same name replaces the earlier one.
    #[must_use]
    pub fn register(mut self, entity: EntityMetadata) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    pub fn entity(&self, name: &str) -> Option<&EntityMetadata> {
        self.entities.get(name)
    }

    /// Resolve `alias.relation` where `bindings` maps query aliases to entity names.
    pub fn resolve_path(
        &self,
        bindings: &HashMap<String, String>,
        path: &str,
    ) -> Result<RelationDescriptor, RelationIdError> {
        let (alias, relation) = path
            .split_once('.')
            .ok_or_else(|| RelationIdError::InvalidPath {
                path: path.to_string(),
                reason: "expected `alias.relation`".into(),
            })?;
        if relation.contains('.') {
            return Err(RelationIdError::InvalidPath {
                path: path.to_string(),
                reason: "nested relation paths are not supported".into(),
            });
        }
        let entity = bindings.get(alias).ok_or_else(|| RelationIdError::UnknownRelation {
            path: path.to_string(),
            reason: format!("alias \"{alias}\" is not bound in this query"),
        })?;
        self.resolve(entity, relation).map_err(|e| e.with_path(path))
    }

    /// Resolve relation `property` declared on entity `entity`.
    pub fn resolve(&self, entity: &str, property: &str) -> Result<RelationDescriptor, RelationIdError> {
        let path = format!("{entity}.{property}");
        let unknown = |reason: String| RelationIdError::UnknownRelation {
            path: path.clone(),
            reason,
        };

        let source = self
            .entity(entity)
            .ok_or_else(|| unknown(format!("entity \"{entity}\" is not registered")))?;
        let relation = source
            .find_relation(property)
            .ok_or_else(|| unknown(format!("\"{entity}\" declares no relation \"{property}\"")))?;
        let target = self.entity(&relation.target).ok_or_else(|| {
            unknown(format!("target entity \"{}\" is not registered", relation.target))
        })?;

        let mut descriptor = RelationDescriptor {
            entity: source.name.clone(),
            property: relation.property.clone(),
            kind: relation.kind,
            is_owning_side: relation.owner,
            source_table: source.table_name.clone(),
            target_entity: target.name.clone(),
            target_table: target.table_name.clone(),
            foreign_key: Vec::new(),
            join_table: None,
            target_primary_key: target.primary_key().cloned().collect(),
        };
        if descriptor.target_primary_key.is_empty() {
            return Err(unknown(format!("target \"{}\" has no primary key", target.name)));
        }

        match (relation.kind, relation.owner) {
            (RelationKind::ManyToOne | RelationKind::OneToOne, true) => {
                let columns = owning_join_columns(relation, target);
                check_referenced(&columns, target).map_err(unknown)?;
                descriptor.foreign_key = to_foreign_key(columns);
            }
            (RelationKind::ManyToOne, false) => {
                return Err(unknown("many-to-one relations are always owning".into()));
            }
            (RelationKind::OneToOne | RelationKind::OneToMany, _) => {
                let expected = if relation.kind == RelationKind::OneToOne {
                    RelationKind::OneToOne
                } else {
                    RelationKind::ManyToOne
                };
                let owning = self.owning_counterpart(relation, source, target, expected).map_err(unknown)?;
                let columns = owning_join_columns(owning, source);
                check_referenced(&columns, source).map_err(unknown)?;
                descriptor.is_owning_side = false;
                descriptor.foreign_key = to_foreign_key(columns);
            }
            (RelationKind::ManyToMany, true) => {
                let jt = owning_join_table(relation, source, target);
                check_referenced(&jt.join_columns, source).map_err(unknown)?;
                check_referenced(&jt.inverse_join_columns, target).map_err(unknown)?;
                descriptor.join_table = Some(JoinTableDescriptor {
                    name: jt.name,
                    source_columns: jt.join_columns,
                    target_columns: jt.inverse_join_columns,
                });
            }
            (RelationKind::ManyToMany, false) => {
                let owning = self
                    .owning_counterpart(relation, source, target, RelationKind::ManyToMany)
                    .map_err(unknown)?;
                let jt = owning_join_table(owning, target, source);
                check_referenced(&jt.join_columns, target).map_err(unknown)?;
                check_referenced(&jt.inverse_join_columns, source).map_err(unknown)?;
                descriptor.join_table = Some(JoinTableDescriptor {
                    name: jt.name,
                    source_columns: jt.inverse_join_columns,
                    target_columns: jt.join_columns,
                });
            }
        }

        log::debug!(
            "resolved {path}: {:?} owning={} -> {}",
            descriptor.kind,
            descriptor.is_owning_side,
            descriptor.target_table
        );
        Ok(descriptor)
    }

    // The owning relation on `target` that an inverse `relation` points at.
    fn owning_counterpart<'a>(
        &self,
        relation: &RelationMetadata,
        source: &EntityMetadata,
        target: &'a EntityMetadata,
        expected: RelationKind,
    ) -> Result<&'a RelationMetadata, String> {
        let inverse = relation.inverse_property.as_deref().ok_or_else(|| {
            format!("inverse relation \"{}\" does not name its owning side", relation.property)
        })?;
        let owning = target
            .find_relation(inverse)
            .ok_or_else(|| format!("\"{}\" declares no relation \"{inverse}\"", target.name))?;
        if !owning.owner || owning.kind != expected {
            return Err(format!(
                "\"{}.{inverse}\" must be an owning {expected:?} relation",
                target.name
            ));
        }
        if owning.target != source.name {
            return Err(format!(
                "\"{}.{inverse}\" targets \"{}\", not \"{}\"",
                target.name, owning.target, source.name
            ));
        }
        Ok(owning)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// Declared join columns, or `<property><ReferencedPk>` for every pk column of `referenced`.
fn owning_join_columns(relation: &RelationMetadata, referenced: &EntityMetadata) -> Vec<JoinColumn> {
    if !relation.join_columns.is_empty() {
        return relation.join_columns.clone();
    }
    referenced
        .primary_key()
        .map(|pk| {
            JoinColumn::new(
                format!("{}{}", relation.property, capitalize(&pk.column)),
                pk.column.clone(),
            )
        })
        .collect()
}

// Declared join table, or `<owner>_<property>_<target>` with `<table><Pk>` columns.
fn owning_join_table(
    relation: &RelationMetadata,
    owner: &EntityMetadata,
    target: &EntityMetadata,
) -> JoinTableDef {
    let declared = relation.join_table.clone();
    let mut jt = declared.unwrap_or_else(|| {
        JoinTableDef::new(format!(
            "{}_{}_{}",
            owner.table_name, relation.property, target.table_name
        ))
    });
    if jt.join_columns.is_empty() {
        jt.join_columns = default_join_table_columns(owner);
    }
    if jt.inverse_join_columns.is_empty() {
        jt.inverse_join_columns = default_join_table_columns(target);
    }
    jt
}

fn default_join_table_columns(entity: &EntityMetadata) -> Vec<JoinColumn> {
    entity
        .primary_key()
        .map(|pk| {
            JoinColumn::new(
                format!("{}{}", entity.table_name, capitalize(&pk.column)),
                pk.column.clone(),
            )
        })
        .collect()
}

fn check_referenced(columns: &[JoinColumn], referenced: &EntityMetadata) -> Result<(), String> {
    if columns.is_empty() {
        return Err(format!("\"{}\" has no key columns to reference", referenced.name));
    }
    for jc in columns {
        if referenced.find_column(&jc.referenced_column).is_none() {
            return Err(format!(
                "\"{}\" references unknown column \"{}.{}\"",
                jc.column, referenced.table_name, jc.referenced_column
            ));
        }
    }
    Ok(())
}

fn to_foreign_key(columns: Vec<JoinColumn>) -> Vec<ForeignKeyColumn> {
    columns
        .into_iter()
        .map(|jc| ForeignKeyColumn {
            column: jc.column,
            referenced_column: jc.referenced_column,
        })
        .collect()
}
