//! Value handling between the driver, the raw result set and result objects.
//!
//! - **`raw_row`** - [`RawRow`], the alias-keyed row handed back by execution
//! - **`conversion`** - binding `sea_query::Values` as driver parameters
//! - **`transform`** - [`ColumnType`] and the per-type identifier transforms

pub mod conversion;
pub mod raw_row;
pub mod transform;

pub use conversion::with_converted_params;
pub use raw_row::RawRow;
pub use transform::{ColumnType, TransformError};
