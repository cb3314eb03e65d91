//! Database access layer.
//!
//! This module provides:
//! - Connection pool management with hot swapping
//! - Dialect-aware paging of query templates
//! - Placeholder counting, fan-out and binding
//! - Row decoding and row transformers
//! - Query execution
//! - Database dispatch macros for reducing code duplication

pub mod executor;
#[macro_use]
pub mod macros;
pub mod paging;
pub mod params;
pub mod pool;
pub mod transform;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{ConnectionProvider, DbPool, PoolHandle};
pub use transform::{ReadBool, ReadInt, ReadRecords, ReadString, RowTransform};
pub use types::{RowReader, TypeCategory};
