//! DB User Provider Library
//!
//! Looks users up in, and validates passwords against, an external SQL
//! database (PostgreSQL, MySQL, SQLite) through configurable query templates.

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;

pub use config::Config;
pub use credentials::{CredentialVerifier, HashAlgorithm};
pub use db::{ConnectionProvider, QueryExecutor};
pub use error::{StoreError, StoreResult};
pub use models::{Dialect, Pageable, QueryConfig, QueryParam, QueryTemplates, RowRecord};
pub use repository::UserRepository;
