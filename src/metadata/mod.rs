//! Entity metadata: declarations and relation resolution.
//!
//! Entities are declared with builders and collected in a
//! [`MetadataRegistry`], which is immutable once built and may be shared
//! between coroutines behind an `Arc`.

pub mod entity;
pub mod registry;
pub mod relation;

pub use entity::{ColumnMetadata, EntityMetadata};
pub use registry::MetadataRegistry;
pub use relation::{
    ForeignKeyColumn, JoinColumn, JoinTableDef, JoinTableDescriptor, RelationDescriptor,
    RelationKind, RelationMetadata,
};
