//! Entity and column declarations.

use crate::metadata::relation::RelationMetadata;
use crate::value::ColumnType;

/// One declared column of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Property name on result objects
    pub property: String,
    /// Column name in the table
    pub column: String,
    pub column_type: ColumnType,
    pub primary: bool,
}

impl ColumnMetadata {
    /// A column whose name equals its property name.
    pub fn new(property: impl Into<String>, column_type: ColumnType) -> Self {
        let property = property.into();
        Self {
            column: property.clone(),
            property,
            column_type,
            primary: false,
        }
    }

    #[must_use]
    pub fn column_name(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// Declared shape of an entity: its table, columns and relations
///
/// # Example
///
/// ```
/// use relid::{ColumnType, EntityMetadata, RelationMetadata};
///
/// let post = EntityMetadata::new("Post", "post")
///     .primary_column("id", ColumnType::Integer)
///     .column("title", ColumnType::Text)
///     .relation(RelationMetadata::many_to_one("category", "Category"));
/// assert_eq!(post.primary_key().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    pub name: String,
    pub table_name: String,
    pub columns: Vec<ColumnMetadata>,
    pub relations: Vec<RelationMetadata>,
}

impl EntityMetadata {
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    #[must_use]
    pub fn primary_column(self, property: impl Into<String>, column_type: ColumnType) -> Self {
        self.with_column(ColumnMetadata::new(property, column_type).primary())
    }

    #[must_use]
    pub fn column(self, property: impl Into<String>, column_type: ColumnType) -> Self {
        self.with_column(ColumnMetadata::new(property, column_type))
    }

    #[must_use]
    pub fn with_column(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn relation(mut self, relation: RelationMetadata) -> Self {
        self.relations.push(relation);
        self
    }

    /// Primary-key columns in declaration order.
    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|c| c.primary)
    }

    pub fn find_property(&self, property: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.property == property)
    }

    pub fn find_column(&self, column: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.column == column)
    }

    pub fn find_relation(&self, property: &str) -> Option<&RelationMetadata> {
        self.relations.iter().find(|r| r.property == property)
    }
}
