//! Select query builder.
//!
//! `SelectQuery` builds a sea-query `SelectStatement` over one root entity
//! and carries the relation-id requests registered on it. Building methods
//! live here; execution methods are in the execution module.

use crate::config::RelationIdConfig;
use crate::metadata::{EntityMetadata, MetadataRegistry, RelationDescriptor, RelationKind};
use crate::query::hydrate::SelectedColumn;
use crate::relation_id::planner::{self, quote_column, Name};
use crate::relation_id::{
    AliasGenerator, RegisteredRelationId, RelationIdError, RelationIdOptions, RelationIdRegistry,
    RelationIdRequest,
};
use sea_query::{Condition, Expr, ExprTrait, JoinType, Order, Query, SelectStatement};
use std::collections::HashMap;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Query over one root entity, with relation ids mapped onto its results
///
/// The root entity's columns are selected as `<alias>_<column>`. Joins only
/// filter; relation ids can be requested on the root alias.
///
/// # Example
///
/// ```
/// use relid::{ColumnType, EntityMetadata, MetadataRegistry, RelationMetadata, SelectQuery};
/// use sea_query::Order;
///
/// # fn main() -> Result<(), relid::RelationIdError> {
/// let registry = MetadataRegistry::new()
///     .register(
///         EntityMetadata::new("Post", "post")
///             .primary_column("id", ColumnType::Integer)
///             .column("title", ColumnType::Text)
///             .relation(RelationMetadata::one_to_one("category", "Category")),
///     )
///     .register(EntityMetadata::new("Category", "category").primary_column("id", ColumnType::Integer));
///
/// let query = SelectQuery::new(&registry, "Post", "post")?
///     .load_relation_id_and_map("categoryId", "post.category")?
///     .order_by("post.id", Order::Asc);
/// assert!(query.to_sql_string().contains("\"post\".\"categoryId\" AS \"relid_post_category\""));
/// # Ok(())
/// # }
/// ```
pub struct SelectQuery<'m> {
    pub(crate) metadata: &'m MetadataRegistry,
    pub(crate) entity: &'m EntityMetadata,
    pub(crate) alias: String,
    pub(crate) config: RelationIdConfig,
    /// Query alias -> entity name, root and joins
    pub(crate) bindings: HashMap<String, String>,
    pub(crate) statement: SelectStatement,
    pub(crate) aliases: AliasGenerator,
    pub(crate) columns: Vec<SelectedColumn>,
    pub(crate) relation_ids: RelationIdRegistry,
}

impl<'m> SelectQuery<'m> {
    /// Select every column of `entity`, aliased as `alias`, with default settings.
    pub fn new(metadata: &'m MetadataRegistry, entity: &str, alias: &str) -> Result<Self, RelationIdError> {
        Self::with_config(metadata, entity, alias, RelationIdConfig::default())
    }

    pub fn with_config(
        metadata: &'m MetadataRegistry,
        entity: &str,
        alias: &str,
        config: RelationIdConfig,
    ) -> Result<Self, RelationIdError> {
        let meta = metadata.entity(entity).ok_or_else(|| RelationIdError::UnknownRelation {
            path: entity.to_string(),
            reason: format!("entity \"{entity}\" is not registered"),
        })?;
        if meta.primary_key().next().is_none() {
            return Err(RelationIdError::UnknownRelation {
                path: entity.to_string(),
                reason: format!("entity \"{entity}\" has no primary key"),
            });
        }

        let mut aliases = AliasGenerator::new(config.alias_prefix.clone(), config.max_alias_length);
        let mut statement = Query::select();
        let mut columns = Vec::with_capacity(meta.columns.len());
        for column in &meta.columns {
            let selected = aliases.reserve(&format!("{alias}_{}", column.column), 0)?;
            statement.expr_as(
                Expr::col((Name(alias.to_string()), Name(column.column.clone()))),
                Name(selected.clone()),
            );
            columns.push(SelectedColumn {
                property: column.property.clone(),
                column: column.column.clone(),
                alias: selected,
                column_type: column.column_type,
                primary: column.primary,
            });
        }
        statement.from_as(Name(meta.table_name.clone()), Name(alias.to_string()));

        Ok(Self {
            metadata,
            entity: meta,
            alias: alias.to_string(),
            config,
            bindings: HashMap::from([(alias.to_string(), meta.name.clone())]),
            statement,
            aliases,
            columns,
            relation_ids: RelationIdRegistry::new(),
        })
    }

    /// Add a filter condition
    ///
    /// Accepts anything implementing `IntoCondition`: expressions built with
    /// `Expr`, or `Condition::all()` / `Condition::any()` groups.
    pub fn filter<F>(mut self, condition: F) -> Self
    where
        F: sea_query::IntoCondition,
    {
        self.statement.cond_where(condition.into_condition());
        self
    }

    /// `alias.property = value`, resolving the property to its column.
    pub fn where_eq<V>(mut self, path: &str, value: V) -> Result<Self, RelationIdError>
    where
        V: Into<sea_query::Value>,
    {
        let (alias, column) = self.resolve_column(path).ok_or_else(|| RelationIdError::InvalidPath {
            path: path.to_string(),
            reason: "not a declared property of a bound alias".into(),
        })?;
        self.statement
            .and_where(Expr::col((Name(alias), Name(column))).eq(value.into()));
        Ok(self)
    }

    /// Add an ORDER BY clause
    ///
    /// `path` is `alias.property` or a bare property of the root alias.
    /// Names that are not declared properties are used as column names.
    pub fn order_by(mut self, path: &str, order: Order) -> Self {
        let (alias, column) = self.resolve_column(path).unwrap_or_else(|| match path.split_once('.') {
            Some((alias, column)) => (alias.to_string(), column.to_string()),
            None => (self.alias.clone(), path.to_string()),
        });
        self.statement.order_by((Name(alias), Name(column)), order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.statement.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.statement.offset(offset);
        self
    }

    /// INNER JOIN the target of `relation` (`alias.relation`) as `alias`.
    ///
    /// The joined entity is only available for filtering and ordering.
    pub fn inner_join(self, relation: &str, alias: &str) -> Result<Self, RelationIdError> {
        self.join(JoinType::InnerJoin, relation, alias)
    }

    /// LEFT JOIN the target of `relation` (`alias.relation`) as `alias`.
    pub fn left_join(self, relation: &str, alias: &str) -> Result<Self, RelationIdError> {
        self.join(JoinType::LeftJoin, relation, alias)
    }

    fn join(mut self, join: JoinType, relation: &str, alias: &str) -> Result<Self, RelationIdError> {
        let descriptor = self.metadata.resolve_path(&self.bindings, relation)?;
        if self.bindings.contains_key(alias) || self.aliases.is_used(alias) {
            return Err(RelationIdError::InvalidPath {
                path: relation.to_string(),
                reason: format!("alias \"{alias}\" is already in use"),
            });
        }
        let source = relation.split_once('.').map_or("", |(a, _)| a).to_string();
        self.aliases.reserve(alias, 0)?;

        match (descriptor.kind, descriptor.is_owning_side) {
            (RelationKind::ManyToMany, _) => {
                let Some(jt) = &descriptor.join_table else {
                    return Err(RelationIdError::UnknownRelation {
                        path: relation.to_string(),
                        reason: "many-to-many relation has no join table".into(),
                    });
                };
                let link = self.aliases.subquery_alias()?;
                let to_link = column_pairs(
                    jt.source_columns
                        .iter()
                        .map(|c| (quote_column(&link, &c.column), quote_column(&source, &c.referenced_column))),
                );
                let to_target = column_pairs(
                    jt.target_columns
                        .iter()
                        .map(|c| (quote_column(alias, &c.referenced_column), quote_column(&link, &c.column))),
                );
                self.statement
                    .join_as(join, Name(jt.name.clone()), Name(link), to_link)
                    .join_as(join, Name(descriptor.target_table.clone()), Name(alias.to_string()), to_target);
            }
            _ => {
                let on = join_condition(&descriptor, &source, alias);
                self.statement
                    .join_as(join, Name(descriptor.target_table.clone()), Name(alias.to_string()), on);
            }
        }

        log::debug!("joined {relation} as {alias} ({join:?})");
        self.bindings.insert(alias.to_string(), descriptor.target_entity);
        Ok(self)
    }

    /// Map the id(s) of `relation` onto `output` of every result.
    ///
    /// `relation` is `alias.relationProperty` on the root alias; `output` is
    /// a dot-separated property path. May be called any number of times.
    ///
    /// # Errors
    ///
    /// Unknown or malformed paths fail here, before anything is executed.
    pub fn load_relation_id_and_map(self, output: &str, relation: &str) -> Result<Self, RelationIdError> {
        self.load_relation_id_and_map_with(output, relation, RelationIdOptions::default())
    }

    pub fn load_relation_id_and_map_with(
        mut self,
        output: &str,
        relation: &str,
        options: RelationIdOptions,
    ) -> Result<Self, RelationIdError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::plan_span(relation).entered();

        let request = RelationIdRequest::parse(output, relation, &self.config.alias_prefix, options)?;
        let descriptor = self.metadata.resolve_path(&self.bindings, relation)?;
        if request.source_alias != self.alias {
            return Err(RelationIdError::UnknownRelation {
                path: relation.to_string(),
                reason: format!("relation ids can only be loaded on the root alias \"{}\"", self.alias),
            });
        }

        let index = self.relation_ids.len();
        let fragments = planner::plan(&request, &descriptor, index, &mut self.aliases)?;
        let mixed_map = !request
            .options
            .disable_mixed_map
            .unwrap_or(self.config.disable_mixed_map);

        #[cfg(feature = "metrics")]
        METRICS.record_planned(fragments.len());

        self.relation_ids.attach(
            &mut self.statement,
            RegisteredRelationId {
                request,
                kind: descriptor.kind,
                is_multi_valued: descriptor.is_multi_valued(),
                mixed_map,
                fragments,
            },
        );
        Ok(self)
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn entity(&self) -> &EntityMetadata {
        self.entity
    }

    pub fn relation_ids(&self) -> &RelationIdRegistry {
        &self.relation_ids
    }

    pub fn columns(&self) -> &[SelectedColumn] {
        &self.columns
    }

    pub fn statement(&self) -> &SelectStatement {
        &self.statement
    }

    // `alias.property` (or a root property) -> (alias, column) if declared.
    fn resolve_column(&self, path: &str) -> Option<(String, String)> {
        let (alias, property) = path.split_once('.').unwrap_or((self.alias.as_str(), path));
        let entity = self.metadata.entity(self.bindings.get(alias)?)?;
        entity
            .find_property(property)
            .map(|c| (alias.to_string(), c.column.clone()))
    }
}

fn column_pairs(pairs: impl Iterator<Item = (String, String)>) -> Condition {
    pairs.fold(Condition::all(), |cond, (left, right)| {
        cond.add(Expr::cust(format!("{left} = {right}")))
    })
}

// ON condition for single-table joins.
fn join_condition(descriptor: &RelationDescriptor, source: &str, target: &str) -> Condition {
    let pairs = descriptor.foreign_key.iter().map(|fk| {
        if descriptor.is_owning_side {
            (quote_column(target, &fk.referenced_column), quote_column(source, &fk.column))
        } else {
            (quote_column(target, &fk.column), quote_column(source, &fk.referenced_column))
        }
    });
    column_pairs(pairs)
}
