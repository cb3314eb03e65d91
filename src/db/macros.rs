//! Database dispatch macros for reducing code duplication.
//!
//! This module provides declarative macros that generate database-specific
//! implementations while maintaining linear readability.

/// Macro for generating database dispatch match arms.
///
/// This macro generates match arms for `DbPool` variants, reducing the need
/// to manually write repetitive match statements.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => p.close().await,
///     Postgres(p) => p.close().await,
///     SQLite(p) => p.close().await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

/// Implement `RowReader` for a driver row type.
///
/// The driver-independent parts (labels, NULL checks) are generated here;
/// value decoding is delegated to `$decoder::{category, integer, boolean, text}`.
#[macro_export]
macro_rules! impl_row_reader {
    ($row:ty, $decoder:ident) => {
        impl $crate::db::types::RowReader for $row {
            fn column_labels(&self) -> Vec<String> {
                sqlx::Row::columns(self)
                    .iter()
                    .map(|col| sqlx::Column::name(col).to_string())
                    .collect()
            }

            fn is_null(&self, idx: usize) -> $crate::error::StoreResult<bool> {
                let raw = sqlx::Row::try_get_raw(self, idx)?;
                Ok(sqlx::ValueRef::is_null(&raw))
            }

            fn category(
                &self,
                idx: usize,
            ) -> $crate::error::StoreResult<$crate::db::types::TypeCategory> {
                $decoder::category(self, idx)
            }

            fn integer(&self, idx: usize) -> $crate::error::StoreResult<i64> {
                $decoder::integer(self, idx)
            }

            fn boolean(&self, idx: usize) -> $crate::error::StoreResult<bool> {
                $decoder::boolean(self, idx)
            }

            fn text(&self, idx: usize) -> $crate::error::StoreResult<Option<String>> {
                $decoder::text(self, idx)
            }
        }
    };
}

pub use impl_db_dispatch;
pub use impl_row_reader;
