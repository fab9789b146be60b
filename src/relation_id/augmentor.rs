//! Attaching planned fragments to a select statement.

use crate::metadata::relation::RelationKind;
use crate::relation_id::planner::{Name, PlannedFragment};
use crate::relation_id::request::RelationIdRequest;
use sea_query::{Expr, SelectStatement};

/// A request together with the fragments attached for it
#[derive(Debug, Clone)]
pub struct RegisteredRelationId {
    pub request: RelationIdRequest,
    pub kind: RelationKind,
    pub is_multi_valued: bool,
    /// Write a single-column key as its bare value instead of `{ key: value }`
    pub mixed_map: bool,
    /// One per target key column, in key order
    pub fragments: Vec<PlannedFragment>,
}

impl RegisteredRelationId {
    pub fn target_property_path(&self) -> &str {
        &self.request.output_property_path
    }
}

/// Mapping table of one query: everything the mapper consults after execution
#[derive(Debug, Clone, Default)]
pub struct RelationIdRegistry {
    entries: Vec<RegisteredRelationId>,
}

impl RelationIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select every fragment of `entry` on `statement` and register it.
    ///
    /// Existing selections, conditions, ordering and pagination are left
    /// untouched; fragments are only ever appended.
    pub fn attach(&mut self, statement: &mut SelectStatement, entry: RegisteredRelationId) {
        for fragment in &entry.fragments {
            statement.expr_as(
                Expr::cust(fragment.expression_sql.clone()),
                Name(fragment.output_alias.clone()),
            );
        }
        self.entries.push(entry);
    }

    /// Output alias of every attached fragment, in attach order.
    pub fn output_aliases(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|e| e.fragments.iter().map(|f| f.output_alias.as_str()))
    }

    pub fn entries(&self) -> &[RegisteredRelationId] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation_id::planner::FragmentShape;
    use crate::relation_id::request::RelationIdOptions;
    use crate::value::ColumnType;
    use sea_query::{Order, PostgresQueryBuilder, Query};

    fn entry(output: &str, alias: &str) -> RegisteredRelationId {
        let request = RelationIdRequest::parse(output, "post.category", "relid", RelationIdOptions::new()).unwrap();
        RegisteredRelationId {
            request,
            kind: RelationKind::ManyToOne,
            is_multi_valued: false,
            mixed_map: true,
            fragments: vec![PlannedFragment {
                output_alias: alias.into(),
                expression_sql: "\"post\".\"categoryId\"".into(),
                key_property: "id".into(),
                column_type: ColumnType::Integer,
                shape: FragmentShape::DirectColumn,
            }],
        }
    }

    #[test]
    fn test_attach_appends_and_keeps_clauses() {
        let mut statement = Query::select();
        statement
            .column((Name("post".into()), Name("id".into())))
            .from_as(Name("post".into()), Name("post".into()))
            .and_where(Expr::cust("\"post\".\"id\" = 1"))
            .order_by((Name("post".into()), Name("id".into())), Order::Asc)
            .limit(5);
        let before = statement.to_string(PostgresQueryBuilder);

        let mut registry = RelationIdRegistry::new();
        registry.attach(&mut statement, entry("categoryId", "relid_post_category"));
        registry.attach(&mut statement, entry("otherId", "relid_post_category_1"));
        let after = statement.to_string(PostgresQueryBuilder);

        assert!(after.contains("\"post\".\"categoryId\" AS \"relid_post_category\""));
        assert!(after.contains("\"post\".\"categoryId\" AS \"relid_post_category_1\""));
        let tail = |sql: &str| sql.split_once(" FROM ").map(|(_, t)| t.to_string());
        assert_eq!(tail(&before), tail(&after));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.output_aliases().collect::<Vec<_>>(),
            vec!["relid_post_category", "relid_post_category_1"]
        );
        assert_eq!(registry.entries()[1].target_property_path(), "otherId");
    }
}
