//! Query building and execution.
//!
//! - **Select**: the `SelectQuery` builder and relation-id registration
//! - **Execution**: running the query and returning raw rows or records
//! - **Hydrate**: grouping raw rows into `Record`s by primary key

pub mod execution;
pub mod hydrate;
pub mod select;

pub use execution::QueryOutput;
pub use hydrate::{EntityKey, Record, SelectedColumn};
pub use select::SelectQuery;
