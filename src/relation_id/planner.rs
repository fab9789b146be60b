//! Identifier fragment planning.
//!
//! Turns one [`RelationIdRequest`] and its resolved [`RelationDescriptor`]
//! into the select expressions that yield the related ids:
//!
//! | relation | shape |
//! |---|---|
//! | owning `ManyToOne` / `OneToOne` | the foreign-key column of the source row |
//! | owning single-valued with a filter, or a join column on a non-key target column | scalar subquery on the target table |
//! | inverse `OneToOne` | scalar subquery on the target, first key ascending |
//! | `OneToMany` | `ARRAY(...)` subquery on the target |
//! | `ManyToMany` | `ARRAY(...)` subquery on the join table, joined to the target when filtered or keyed on non-key columns |
//!
//! Composite keys produce one fragment per key column. List fragments of the
//! same request share their ordering so the mapper can zip them by position.

use crate::metadata::entity::ColumnMetadata;
use crate::metadata::relation::{JoinColumn, JoinTableDescriptor, RelationDescriptor, RelationKind};
use crate::relation_id::alias::AliasGenerator;
use crate::relation_id::error::RelationIdError;
use crate::relation_id::request::RelationIdRequest;
use crate::value::ColumnType;
use sea_query::{Condition, Expr, Iden, JoinType, Order, PostgresQueryBuilder, Query, SelectStatement};

/// How a fragment obtains its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentShape {
    /// A column already present on the source row
    DirectColumn,
    /// Correlated subquery returning at most one value
    ScalarSubquery,
    /// Correlated `ARRAY(...)` subquery returning every matching value
    ListSubquery,
}

/// One select expression produced for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFragment {
    pub output_alias: String,
    pub expression_sql: String,
    /// Target key property this fragment yields
    pub key_property: String,
    pub column_type: ColumnType,
    pub shape: FragmentShape,
}

/// Identifier usable wherever sea-query expects an `Iden`.
pub(crate) struct Name(pub String);

impl Iden for Name {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// Quote an identifier the PostgreSQL way.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"table"."column"`
pub fn quote_column(table: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(table), quote_ident(column))
}

/// Plan the fragments of one request.
///
/// `request_index` is the request's position on the query and seeds the
/// collision suffix of its aliases.
pub fn plan(
    request: &RelationIdRequest,
    descriptor: &RelationDescriptor,
    request_index: usize,
    aliases: &mut AliasGenerator,
) -> Result<Vec<PlannedFragment>, RelationIdError> {
    let keys = &descriptor.target_primary_key;
    let base = request.base_alias();
    let source = request.source_alias.as_str();
    let composite = keys.len() > 1;

    let mut fragments = Vec::with_capacity(keys.len());
    for key in keys {
        let alias_base = if composite {
            format!("{base}_{}", key.property)
        } else {
            base.clone()
        };
        let output_alias = aliases.reserve(&alias_base, request_index)?;

        let (shape, expression_sql) = match (descriptor.kind, descriptor.is_owning_side) {
            (RelationKind::ManyToOne | RelationKind::OneToOne, true) => {
                owning_single(request, descriptor, key, aliases)?
            }
            (RelationKind::OneToOne, false) => (
                FragmentShape::ScalarSubquery,
                inverse_subquery(request, descriptor, key, aliases, false)?,
            ),
            (RelationKind::OneToMany, _) => (
                FragmentShape::ListSubquery,
                inverse_subquery(request, descriptor, key, aliases, true)?,
            ),
            (RelationKind::ManyToMany, _) => (
                FragmentShape::ListSubquery,
                join_table_subquery(request, descriptor, key, aliases)?,
            ),
            (RelationKind::ManyToOne, false) => {
                return Err(unknown(request, "many-to-one relations are always owning"));
            }
        };

        log::debug!(
            "planned {} as {shape:?} -> \"{output_alias}\" (source {source})",
            request.relation_property_path
        );
        fragments.push(PlannedFragment {
            output_alias,
            expression_sql,
            key_property: key.property.clone(),
            column_type: key.column_type,
            shape,
        });
    }
    Ok(fragments)
}

fn owning_single(
    request: &RelationIdRequest,
    descriptor: &RelationDescriptor,
    key: &ColumnMetadata,
    aliases: &mut AliasGenerator,
) -> Result<(FragmentShape, String), RelationIdError> {
    let source = request.source_alias.as_str();
    let direct = descriptor
        .foreign_key
        .iter()
        .find(|fk| fk.referenced_column == key.column);
    if let (Some(fk), None) = (direct, &request.options.filter) {
        return Ok((FragmentShape::DirectColumn, quote_column(source, &fk.column)));
    }
    if descriptor.foreign_key.is_empty() {
        return Err(unknown(request, "owning relation has no join columns"));
    }

    // Filtered, or the join columns reference non-key target columns.
    let sq = aliases.subquery_alias()?;
    let mut cond = Condition::all();
    for fk in &descriptor.foreign_key {
        cond = cond.add(Expr::cust(format!(
            "{} = {}",
            quote_column(&sq, &fk.referenced_column),
            quote_column(source, &fk.column)
        )));
    }
    if let Some(filter) = &request.options.filter {
        cond = cond.add(filter(sq.as_str()));
    }
    let mut select = Query::select();
    select
        .column((Name(sq.clone()), Name(key.column.clone())))
        .from_as(Name(descriptor.target_table.clone()), Name(sq.clone()))
        .cond_where(cond)
        .limit(1);
    Ok((FragmentShape::ScalarSubquery, scalar(&select)))
}

// Foreign key on the target table: inverse one-to-one and one-to-many.
fn inverse_subquery(
    request: &RelationIdRequest,
    descriptor: &RelationDescriptor,
    key: &ColumnMetadata,
    aliases: &mut AliasGenerator,
    list: bool,
) -> Result<String, RelationIdError> {
    let source = request.source_alias.as_str();
    let sq = aliases.subquery_alias()?;

    let mut cond = Condition::all();
    for fk in &descriptor.foreign_key {
        cond = cond.add(Expr::cust(format!(
            "{} = {}",
            quote_column(&sq, &fk.column),
            quote_column(source, &fk.referenced_column)
        )));
    }
    if let Some(filter) = &request.options.filter {
        cond = cond.add(filter(sq.as_str()));
    }

    let mut select = Query::select();
    select
        .column((Name(sq.clone()), Name(key.column.clone())))
        .from_as(Name(descriptor.target_table.clone()), Name(sq.clone()))
        .cond_where(cond);
    for pk in &descriptor.target_primary_key {
        select.order_by((Name(sq.clone()), Name(pk.column.clone())), Order::Asc);
    }

    if list {
        Ok(array(&select))
    } else {
        select.limit(1);
        Ok(scalar(&select))
    }
}

fn join_table_subquery(
    request: &RelationIdRequest,
    descriptor: &RelationDescriptor,
    key: &ColumnMetadata,
    aliases: &mut AliasGenerator,
) -> Result<String, RelationIdError> {
    let source = request.source_alias.as_str();
    let jt = descriptor
        .join_table
        .as_ref()
        .ok_or_else(|| unknown(request, "many-to-many relation has no join table"))?;
    let sq = aliases.subquery_alias()?;

    let mut cond = Condition::all();
    for sc in &jt.source_columns {
        cond = cond.add(Expr::cust(format!(
            "{} = {}",
            quote_column(&sq, &sc.column),
            quote_column(source, &sc.referenced_column)
        )));
    }

    let keyed = descriptor
        .target_primary_key
        .iter()
        .all(|pk| jt.target_columns.iter().any(|c| c.referenced_column == pk.column));

    let mut select = Query::select();
    select.from_as(Name(jt.name.clone()), Name(sq.clone()));

    if keyed && request.options.filter.is_none() {
        select.column((Name(sq.clone()), Name(join_target_column(request, jt, key)?.column.clone())));
        for pk in &descriptor.target_primary_key {
            select.order_by((Name(sq.clone()), Name(join_target_column(request, jt, pk)?.column.clone())), Order::Asc);
        }
    } else {
        let target = aliases.subquery_alias()?;
        let mut on = Condition::all();
        for tc in &jt.target_columns {
            on = on.add(Expr::cust(format!(
                "{} = {}",
                quote_column(&target, &tc.referenced_column),
                quote_column(&sq, &tc.column)
            )));
        }
        select
            .column((Name(target.clone()), Name(key.column.clone())))
            .join_as(
                JoinType::InnerJoin,
                Name(descriptor.target_table.clone()),
                Name(target.clone()),
                on,
            );
        if let Some(filter) = &request.options.filter {
            cond = cond.add(filter(target.as_str()));
        }
        for pk in &descriptor.target_primary_key {
            select.order_by((Name(target.clone()), Name(pk.column.clone())), Order::Asc);
        }
    }

    select.cond_where(cond);
    Ok(array(&select))
}

fn join_target_column<'a>(
    request: &RelationIdRequest,
    jt: &'a JoinTableDescriptor,
    pk: &ColumnMetadata,
) -> Result<&'a JoinColumn, RelationIdError> {
    jt.target_columns
        .iter()
        .find(|c| c.referenced_column == pk.column)
        .ok_or_else(|| {
            unknown(
                request,
                &format!("join table \"{}\" has no column for \"{}\"", jt.name, pk.column),
            )
        })
}

fn scalar(select: &SelectStatement) -> String {
    format!("({})", select.to_string(PostgresQueryBuilder))
}

fn array(select: &SelectStatement) -> String {
    format!("ARRAY({})", select.to_string(PostgresQueryBuilder))
}

fn unknown(request: &RelationIdRequest, reason: &str) -> RelationIdError {
    RelationIdError::UnknownRelation {
        path: request.relation_property_path.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityMetadata, JoinTableDef, MetadataRegistry, RelationMetadata};
    use crate::relation_id::request::RelationIdOptions;

    fn registry() -> MetadataRegistry {
        MetadataRegistry::new()
            .register(
                EntityMetadata::new("Post", "post")
                    .primary_column("id", ColumnType::Integer)
                    .relation(RelationMetadata::one_to_one("category", "Category"))
                    .relation(RelationMetadata::many_to_one("section", "Category"))
                    .relation(RelationMetadata::many_to_many("tags", "Tag")),
            )
            .register(
                EntityMetadata::new("Category", "category")
                    .primary_column("id", ColumnType::Integer)
                    .relation(RelationMetadata::one_to_one_inverse("post", "Post", "category"))
                    .relation(RelationMetadata::one_to_many("posts", "Post", "section")),
            )
            .register(
                EntityMetadata::new("Tag", "tag")
                    .primary_column("id", ColumnType::Integer)
                    .primary_column("lang", ColumnType::Text)
                    .relation(RelationMetadata::many_to_many_inverse("posts", "Post", "tags")),
            )
    }

    fn plan_one(entity: &str, path: &str, options: RelationIdOptions) -> Vec<PlannedFragment> {
        let registry = registry();
        let (_, relation) = path.split_once('.').unwrap();
        let descriptor = registry.resolve(entity, relation).unwrap();
        let request = RelationIdRequest::parse("out", path, "relid", options).unwrap();
        let mut aliases = AliasGenerator::new("relid", 63);
        plan(&request, &descriptor, 0, &mut aliases).unwrap()
    }

    #[test]
    fn test_owning_side_selects_foreign_key_column() {
        let fragments = plan_one("Post", "post.category", RelationIdOptions::new());
        assert_eq!(fragments.len(), 1);
        let f = &fragments[0];
        assert_eq!(f.shape, FragmentShape::DirectColumn);
        assert_eq!(f.expression_sql, "\"post\".\"categoryId\"");
        assert_eq!(f.output_alias, "relid_post_category");
        assert_eq!(f.key_property, "id");
    }

    #[test]
    fn test_owning_side_with_filter_uses_subquery() {
        let options = RelationIdOptions::new()
            .filter(|t| Condition::all().add(Expr::cust(format!("{} > 0", quote_column(t, "id")))));
        let f = &plan_one("Post", "post.category", options)[0];
        assert_eq!(f.shape, FragmentShape::ScalarSubquery);
        assert!(f.expression_sql.starts_with("(SELECT \"relid_sq1\".\"id\" FROM \"category\" AS \"relid_sq1\""));
        assert!(f.expression_sql.contains("\"relid_sq1\".\"id\" = \"post\".\"categoryId\""));
        assert!(f.expression_sql.contains("\"relid_sq1\".\"id\" > 0"));
        assert!(f.expression_sql.contains("LIMIT 1"));
    }

    #[test]
    fn test_inverse_one_to_one_is_limited_and_ordered() {
        let f = &plan_one("Category", "category.post", RelationIdOptions::new())[0];
        assert_eq!(f.shape, FragmentShape::ScalarSubquery);
        assert!(f.expression_sql.contains("FROM \"post\" AS \"relid_sq1\""));
        assert!(f.expression_sql.contains("\"relid_sq1\".\"categoryId\" = \"category\".\"id\""));
        assert!(f.expression_sql.contains("ORDER BY \"relid_sq1\".\"id\" ASC"));
        assert!(f.expression_sql.ends_with("LIMIT 1)"));
    }

    #[test]
    fn test_one_to_many_is_an_array() {
        let f = &plan_one("Category", "category.posts", RelationIdOptions::new())[0];
        assert_eq!(f.shape, FragmentShape::ListSubquery);
        assert!(f.expression_sql.starts_with("ARRAY(SELECT \"relid_sq1\".\"id\" FROM \"post\""));
        assert!(!f.expression_sql.contains("LIMIT"));
    }

    #[test]
    fn test_many_to_many_composite_key_goes_through_join_table() {
        let fragments = plan_one("Post", "post.tags", RelationIdOptions::new());
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].output_alias, "relid_post_tags_id");
        assert_eq!(fragments[1].output_alias, "relid_post_tags_lang");
        assert_eq!(fragments[1].column_type, ColumnType::Text);
        for f in &fragments {
            assert!(f.expression_sql.contains("FROM \"post_tags_tag\""));
            assert!(f.expression_sql.contains("\"postId\" = \"post\".\"id\""));
            assert!(f.expression_sql.contains("ORDER BY"));
            assert!(f.expression_sql.contains("\"tagId\" ASC"));
            assert!(f.expression_sql.contains("\"tagLang\" ASC"));
        }
        assert!(fragments[0].expression_sql.starts_with("ARRAY(SELECT \"relid_sq1\".\"tagId\""));
        assert!(fragments[1].expression_sql.starts_with("ARRAY(SELECT \"relid_sq2\".\"tagLang\""));
    }

    #[test]
    fn test_inverse_many_to_many_swaps_columns() {
        let registry = registry();
        let descriptor = registry.resolve("Tag", "posts").unwrap();
        let request = RelationIdRequest::parse("postIds", "tag.posts", "relid", RelationIdOptions::new()).unwrap();
        let mut aliases = AliasGenerator::new("relid", 63);
        let f = &plan(&request, &descriptor, 0, &mut aliases).unwrap()[0];
        assert!(f.expression_sql.starts_with("ARRAY(SELECT \"relid_sq1\".\"postId\""));
        assert!(f.expression_sql.contains("\"relid_sq1\".\"tagId\" = \"tag\".\"id\""));
        assert!(f.expression_sql.contains("\"relid_sq1\".\"tagLang\" = \"tag\".\"lang\""));
    }

    fn positive_id(t: &str) -> Condition {
        Condition::all().add(Expr::cust(format!("{} > 0", quote_column(t, "id"))))
    }

    #[test]
    fn test_filter_lands_in_one_to_many_array() {
        let f = &plan_one("Category", "category.posts", RelationIdOptions::new().filter(positive_id))[0];
        assert_eq!(f.shape, FragmentShape::ListSubquery);
        assert!(f.expression_sql.starts_with("ARRAY(SELECT \"relid_sq1\".\"id\" FROM \"post\" AS \"relid_sq1\""));
        assert!(f.expression_sql.contains("\"relid_sq1\".\"sectionId\" = \"category\".\"id\""));
        assert!(f.expression_sql.contains("\"relid_sq1\".\"id\" > 0"));
    }

    #[test]
    fn test_filter_lands_on_many_to_many_target() {
        let fragments = plan_one("Post", "post.tags", RelationIdOptions::new().filter(positive_id));
        let f = &fragments[0];
        assert!(f.expression_sql.starts_with("ARRAY(SELECT \"relid_sq2\".\"id\" FROM \"post_tags_tag\" AS \"relid_sq1\""));
        assert!(f.expression_sql.contains("INNER JOIN \"tag\" AS \"relid_sq2\""));
        assert!(f.expression_sql.contains("\"relid_sq2\".\"id\" = \"relid_sq1\".\"tagId\""));
        assert!(f.expression_sql.contains("\"relid_sq2\".\"id\" > 0"));
        assert!(f.expression_sql.contains("\"relid_sq1\".\"postId\" = \"post\".\"id\""));
        assert!(f.expression_sql.contains("ORDER BY \"relid_sq2\".\"id\" ASC, \"relid_sq2\".\"lang\" ASC"));
        assert!(fragments[1].expression_sql.starts_with("ARRAY(SELECT \"relid_sq4\".\"lang\""));
        assert!(fragments[1].expression_sql.contains("\"relid_sq4\".\"id\" > 0"));
    }

    fn coded_registry() -> MetadataRegistry {
        MetadataRegistry::new()
            .register(
                EntityMetadata::new("Post", "post")
                    .primary_column("id", ColumnType::Integer)
                    .relation(RelationMetadata::many_to_one("category", "Category").join_column("categoryCode", "code"))
                    .relation(RelationMetadata::many_to_many("labels", "Category").join_table(
                        JoinTableDef::new("post_labels")
                            .join_column("postId", "id")
                            .inverse_join_column("categoryCode", "code"),
                    )),
            )
            .register(
                EntityMetadata::new("Category", "category")
                    .primary_column("id", ColumnType::Integer)
                    .column("code", ColumnType::Text),
            )
    }

    #[test]
    fn test_join_column_on_non_key_column_looks_up_the_key() {
        let registry = coded_registry();
        let descriptor = registry.resolve("Post", "category").unwrap();
        assert_eq!(descriptor.foreign_key[0].referenced_column, "code");

        let request = RelationIdRequest::parse("categoryId", "post.category", "relid", RelationIdOptions::new()).unwrap();
        let mut aliases = AliasGenerator::new("relid", 63);
        let f = &plan(&request, &descriptor, 0, &mut aliases).unwrap()[0];
        assert_eq!(f.shape, FragmentShape::ScalarSubquery);
        assert!(f.expression_sql.starts_with("(SELECT \"relid_sq1\".\"id\" FROM \"category\" AS \"relid_sq1\""));
        assert!(f.expression_sql.contains("\"relid_sq1\".\"code\" = \"post\".\"categoryCode\""));
        assert!(f.expression_sql.ends_with("LIMIT 1)"));
    }

    #[test]
    fn test_join_table_on_non_key_column_joins_the_target() {
        let registry = coded_registry();
        let descriptor = registry.resolve("Post", "labels").unwrap();
        let request = RelationIdRequest::parse("labelIds", "post.labels", "relid", RelationIdOptions::new()).unwrap();
        let mut aliases = AliasGenerator::new("relid", 63);
        let f = &plan(&request, &descriptor, 0, &mut aliases).unwrap()[0];
        assert!(f.expression_sql.starts_with("ARRAY(SELECT \"relid_sq2\".\"id\" FROM \"post_labels\" AS \"relid_sq1\""));
        assert!(f.expression_sql.contains("INNER JOIN \"category\" AS \"relid_sq2\" ON \"relid_sq2\".\"code\" = \"relid_sq1\".\"categoryCode\""));
        assert!(f.expression_sql.contains("ORDER BY \"relid_sq2\".\"id\" ASC"));
    }

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_column("p", "id"), "\"p\".\"id\"");
    }
}
