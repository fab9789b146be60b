//! Relation-id resolution.
//!
//! A request registered with
//! [`SelectQuery::load_relation_id_and_map`](crate::query::SelectQuery::load_relation_id_and_map)
//! goes through two phases:
//!
//! 1. at build time it is resolved against the metadata, [`planner::plan`]
//!    turns it into select fragments and [`RelationIdRegistry::attach`] adds
//!    them to the statement;
//! 2. after execution [`mapper::map`] reads the fragment columns back out of
//!    the raw rows and writes the converted ids onto the hydrated records.
//!
//! Each query owns its [`AliasGenerator`] and [`RelationIdRegistry`].

pub mod alias;
pub mod augmentor;
pub mod error;
pub mod mapper;
pub mod planner;
pub mod request;

pub use alias::AliasGenerator;
pub use augmentor::{RegisteredRelationId, RelationIdRegistry};
pub use error::RelationIdError;
pub use planner::{quote_column, quote_ident, FragmentShape, PlannedFragment};
pub use request::{RelationIdOptions, RelationIdRequest, SubqueryFilter};
