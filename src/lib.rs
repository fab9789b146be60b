//! # relid
//!
//! Relation-id loading for a sea-query select builder on `may_postgres`.
//!
//! Given entity metadata and a select over one root entity, relid adds the
//! expressions that fetch the identifier(s) of related rows and writes them
//! onto each result under a caller-chosen property, without loading the
//! related entities themselves.
//!
//! ```
//! use relid::mock::MockExecutor;
//! use relid::{ColumnType, EntityMetadata, MetadataRegistry, RawRow, RelationMetadata, SelectQuery};
//! use sea_query::Order;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), relid::RelationIdError> {
//! let registry = MetadataRegistry::new()
//!     .register(
//!         EntityMetadata::new("Post", "post")
//!             .primary_column("id", ColumnType::Integer)
//!             .relation(RelationMetadata::one_to_one("category", "Category")),
//!     )
//!     .register(EntityMetadata::new("Category", "category").primary_column("id", ColumnType::Integer));
//!
//! let executor = MockExecutor::new().append_rows(vec![
//!     RawRow::from_pairs([("post_id", json!(1)), ("relid_post_category", json!(1))]),
//!     RawRow::from_pairs([("post_id", json!(2)), ("relid_post_category", json!(2))]),
//! ]);
//!
//! let posts = SelectQuery::new(&registry, "Post", "post")?
//!     .load_relation_id_and_map("categoryId", "post.category")?
//!     .order_by("post.id", Order::Asc)
//!     .get_many(&executor)?;
//! assert_eq!(posts[1].get("categoryId"), Some(&json!(2)));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod executor;
pub mod metadata;
pub mod metrics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod query;
pub mod relation_id;
pub mod value;

pub use config::{DatabaseConfig, RelationIdConfig, Settings};
pub use executor::{ConnectionTarget, ExecError, MayPostgresExecutor, QueryExecutor};
pub use metadata::{
    ColumnMetadata, EntityMetadata, JoinColumn, JoinTableDef, MetadataRegistry, RelationDescriptor,
    RelationKind, RelationMetadata,
};
pub use query::{EntityKey, QueryOutput, Record, SelectQuery};
pub use relation_id::{RelationIdError, RelationIdOptions, RelationIdRequest};
pub use value::{ColumnType, RawRow};
