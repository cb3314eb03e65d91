//! Data models for the user provider.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionConfig, Dialect, PagingSyntax};
pub use query::{
    DEFAULT_HASH_FUNCTION, Pageable, QueryConfig, QueryConfigBuilder, QueryParam, QueryTemplates,
    RowRecord,
};
