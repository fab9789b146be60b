//! Relation declarations and their resolved form.
//!
//! [`RelationMetadata`] is what an entity declares. [`RelationDescriptor`] is
//! what the registry hands out after following inverse sides and applying
//! default column naming: every column the planner needs, on both tables.

use crate::metadata::entity::ColumnMetadata;

/// Kind of relation between two entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    /// Whether one source row relates to any number of target rows.
    pub fn is_to_many(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }
}

/// A foreign-key column and the column it references on the other table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinColumn {
    pub column: String,
    pub referenced_column: String,
}

impl JoinColumn {
    pub fn new(column: impl Into<String>, referenced_column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            referenced_column: referenced_column.into(),
        }
    }
}

/// Join table declared on the owning side of a many-to-many relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTableDef {
    pub name: String,
    /// Join-table columns referencing the owning entity
    pub join_columns: Vec<JoinColumn>,
    /// Join-table columns referencing the target entity
    pub inverse_join_columns: Vec<JoinColumn>,
}

impl JoinTableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            join_columns: Vec::new(),
            inverse_join_columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn join_column(mut self, column: impl Into<String>, referenced: impl Into<String>) -> Self {
        self.join_columns.push(JoinColumn::new(column, referenced));
        self
    }

    #[must_use]
    pub fn inverse_join_column(mut self, column: impl Into<String>, referenced: impl Into<String>) -> Self {
        self.inverse_join_columns.push(JoinColumn::new(column, referenced));
        self
    }
}

/// A relation as declared on its entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMetadata {
    pub property: String,
    pub kind: RelationKind,
    /// Target entity name
    pub target: String,
    /// Whether this side stores the foreign key (or owns the join table)
    pub owner: bool,
    /// Property of the relation on the target pointing back at this one
    pub inverse_property: Option<String>,
    /// Foreign-key columns on this table (owning one-to-one / many-to-one)
    pub join_columns: Vec<JoinColumn>,
    /// Join table (owning many-to-many)
    pub join_table: Option<JoinTableDef>,
}

impl RelationMetadata {
    fn declare(property: impl Into<String>, kind: RelationKind, target: impl Into<String>, owner: bool) -> Self {
        Self {
            property: property.into(),
            kind,
            target: target.into(),
            owner,
            inverse_property: None,
            join_columns: Vec::new(),
            join_table: None,
        }
    }

    pub fn many_to_one(property: impl Into<String>, target: impl Into<String>) -> Self {
        Self::declare(property, RelationKind::ManyToOne, target, true)
    }

    /// Owning one-to-one: the foreign key lives on this entity's table.
    pub fn one_to_one(property: impl Into<String>, target: impl Into<String>) -> Self {
        Self::declare(property, RelationKind::OneToOne, target, true)
    }

    /// Inverse one-to-one: `inverse_property` is the owning relation on the target.
    pub fn one_to_one_inverse(
        property: impl Into<String>,
        target: impl Into<String>,
        inverse_property: impl Into<String>,
    ) -> Self {
        Self::declare(property, RelationKind::OneToOne, target, false).inverse_side(inverse_property)
    }

    /// `inverse_property` is the many-to-one relation on the target.
    pub fn one_to_many(
        property: impl Into<String>,
        target: impl Into<String>,
        inverse_property: impl Into<String>,
    ) -> Self {
        Self::declare(property, RelationKind::OneToMany, target, false).inverse_side(inverse_property)
    }

    /// Owning many-to-many: this side declares the join table.
    pub fn many_to_many(property: impl Into<String>, target: impl Into<String>) -> Self {
        Self::declare(property, RelationKind::ManyToMany, target, true)
    }

    pub fn many_to_many_inverse(
        property: impl Into<String>,
        target: impl Into<String>,
        inverse_property: impl Into<String>,
    ) -> Self {
        Self::declare(property, RelationKind::ManyToMany, target, false).inverse_side(inverse_property)
    }

    #[must_use]
    pub fn inverse_side(mut self, property: impl Into<String>) -> Self {
        self.inverse_property = Some(property.into());
        self
    }

    #[must_use]
    pub fn join_column(mut self, column: impl Into<String>, referenced: impl Into<String>) -> Self {
        self.join_columns.push(JoinColumn::new(column, referenced));
        self
    }

    #[must_use]
    pub fn join_table(mut self, join_table: JoinTableDef) -> Self {
        self.join_table = Some(join_table);
        self
    }
}

/// A foreign-key column resolved against both tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyColumn {
    /// Column holding the key; on the source table for owning sides, on the
    /// target table for inverse sides
    pub column: String,
    /// Column it references on the opposite table
    pub referenced_column: String,
}

/// Join table resolved from the point of view of the requesting entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTableDescriptor {
    pub name: String,
    /// Join-table columns referencing the source entity
    pub source_columns: Vec<JoinColumn>,
    /// Join-table columns referencing the target entity
    pub target_columns: Vec<JoinColumn>,
}

/// Everything the planner needs to know about one relation
///
/// Exactly one representation is populated per kind and side:
///
/// | kind | owning | populated |
/// |---|---|---|
/// | `ManyToOne`, `OneToOne` | yes | `foreign_key` on the source table |
/// | `OneToOne`, `OneToMany` | no | `foreign_key` on the target table |
/// | `ManyToMany` | either | `join_table` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDescriptor {
    pub entity: String,
    pub property: String,
    pub kind: RelationKind,
    pub is_owning_side: bool,
    pub source_table: String,
    pub target_entity: String,
    pub target_table: String,
    pub foreign_key: Vec<ForeignKeyColumn>,
    pub join_table: Option<JoinTableDescriptor>,
    /// Primary-key columns of the target, in declaration order
    pub target_primary_key: Vec<ColumnMetadata>,
}

impl RelationDescriptor {
    /// Whether the identifier is a list rather than a single value.
    pub fn is_multi_valued(&self) -> bool {
        self.kind.is_to_many()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_side() {
        assert!(RelationMetadata::many_to_one("category", "Category").owner);
        assert!(RelationMetadata::one_to_one("category", "Category").owner);
        let inverse = RelationMetadata::one_to_one_inverse("post", "Post", "category2");
        assert!(!inverse.owner);
        assert_eq!(inverse.inverse_property.as_deref(), Some("category2"));
        assert!(!RelationMetadata::one_to_many("posts", "Post", "category").owner);
        assert!(RelationMetadata::many_to_many("tags", "Tag").owner);
    }

    #[test]
    fn test_to_many() {
        assert!(RelationKind::OneToMany.is_to_many());
        assert!(RelationKind::ManyToMany.is_to_many());
        assert!(!RelationKind::OneToOne.is_to_many());
        assert!(!RelationKind::ManyToOne.is_to_many());
    }

    #[test]
    fn test_join_table_builder() {
        let jt = JoinTableDef::new("post_tags")
            .join_column("post_id", "id")
            .inverse_join_column("tag_id", "id");
        assert_eq!(jt.join_columns, vec![JoinColumn::new("post_id", "id")]);
        assert_eq!(jt.inverse_join_columns, vec![JoinColumn::new("tag_id", "id")]);
    }
}
