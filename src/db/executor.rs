//! Query execution engine.
//!
//! This module runs parameterized, optionally paged query templates against
//! the provider's current pool and hands the rows to a [`RowTransform`].
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific fetching
//! - `postgres`: PostgreSQL-specific fetching
//! - `sqlite`: SQLite-specific fetching
//!
//! Each submodule provides identical functionality adapted to the database's type system.
//!
//! # Failure policy
//!
//! A missing pool, a failing statement or a timeout is logged together with
//! the statement and its parameters and yields `Ok(None)`. Rows the
//! transformer cannot decode are returned as `Err(DataDecode)`.

use crate::config::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::db::params::{self, PreparedSql};
use crate::db::paging;
use crate::db::pool::{ConnectionProvider, DbPool};
use crate::db::transform::RowTransform;
use crate::error::{StoreError, StoreResult};
use crate::models::{Pageable, QueryParam};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info};

/// Runs query templates through the connection provider.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    provider: Arc<ConnectionProvider>,
    query_timeout: Duration,
}

impl QueryExecutor {
    /// Create a new query executor with the default timeout.
    pub fn new(provider: Arc<ConnectionProvider>) -> Self {
        Self::with_timeout(provider, Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS))
    }

    pub fn with_timeout(provider: Arc<ConnectionProvider>, query_timeout: Duration) -> Self {
        Self {
            provider,
            query_timeout,
        }
    }

    pub fn provider(&self) -> &Arc<ConnectionProvider> {
        &self.provider
    }

    /// Execute `template` and feed the rows to `transform`.
    ///
    /// `params` are bound to the `?` marks; with more marks than values,
    /// `params[0]` is bound to every mark.
    pub async fn execute<T: RowTransform>(
        &self,
        template: &str,
        pageable: Option<&Pageable>,
        transform: &T,
        params: &[QueryParam],
    ) -> StoreResult<Option<T::Output>> {
        let Some(pool) = self.provider.acquire() else {
            error!(
                sql = %template,
                params = %format_params(params.iter()),
                error = %StoreError::NoConnection,
                "Query skipped"
            );
            return Ok(None);
        };

        let start = Instant::now();
        let dialect = pool.dialect();
        let sql = paging::format(template, pageable, dialect);
        let prepared = params::prepare(&sql, dialect, params);
        let fetch_limit = if transform.first_row_only() {
            1
        } else {
            usize::MAX
        };

        info!(
            sql = %prepared.sql,
            params = %format_params(prepared.params.iter().copied()),
            "Executing query"
        );

        let result = match &pool {
            DbPool::MySql(p) => mysql::fetch_rows(p, &prepared, fetch_limit, self.query_timeout)
                .await
                .and_then(|rows| transform.apply(&rows)),
            DbPool::Postgres(p) => {
                postgres::fetch_rows(p, &prepared, fetch_limit, self.query_timeout)
                    .await
                    .and_then(|rows| transform.apply(&rows))
            }
            DbPool::SQLite(p) => sqlite::fetch_rows(p, &prepared, fetch_limit, self.query_timeout)
                .await
                .and_then(|rows| transform.apply(&rows)),
        };

        match result {
            Ok(output) => {
                debug!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Query completed"
                );
                Ok(output)
            }
            Err(e) if e.is_transient() => {
                error!(
                    sql = %prepared.sql,
                    params = %format_params(prepared.params.iter().copied()),
                    error = %e,
                    sql_state = ?sql_state(&e),
                    "Query failed"
                );
                Ok(None)
            }
            Err(e) => {
                error!(sql = %prepared.sql, error = %e, "Failed to read query result");
                Err(e)
            }
        }
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn format_params<'a>(params: impl Iterator<Item = &'a QueryParam>) -> String {
    let rendered: Vec<String> = params.map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

fn sql_state(err: &StoreError) -> Option<&str> {
    match err {
        StoreError::SqlExecution { sql_state, .. } => sql_state.as_deref(),
        _ => None,
    }
}

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> StoreResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(StoreError::from)?);
    }
    Ok(rows)
}

fn timeout_error(operation: &str, timeout: Duration) -> StoreError {
    StoreError::timeout(operation, timeout.as_secs())
}

/// Map a failed checkout, reporting the pool's own acquire timeout.
fn acquire_error(err: sqlx::Error, acquire_timeout: Duration) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => timeout_error("connection pool acquire", acquire_timeout),
        other => StoreError::from(other),
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// A single pooled connection is checked out per call and returned on drop.

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::MySqlPool;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        pool: &MySqlPool,
        prepared: &PreparedSql<'_>,
        fetch_limit: usize,
        query_timeout: Duration,
    ) -> StoreResult<Vec<MySqlRow>> {
        match timeout(query_timeout, fetch(pool, prepared, fetch_limit)).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    async fn fetch(
        pool: &MySqlPool,
        prepared: &PreparedSql<'_>,
        fetch_limit: usize,
    ) -> StoreResult<Vec<MySqlRow>> {
        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| acquire_error(e, pool.options().get_acquire_timeout()))?;
        let mut query = sqlx::query(&prepared.sql);
        for param in prepared.params.iter().copied() {
            query = bind_mysql_param(query, param);
        }
        let results = query
            .fetch(&mut *conn)
            .take(fetch_limit)
            .collect::<Vec<_>>()
            .await;
        collect_rows(results)
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use sqlx::PgPool;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        pool: &PgPool,
        prepared: &PreparedSql<'_>,
        fetch_limit: usize,
        query_timeout: Duration,
    ) -> StoreResult<Vec<PgRow>> {
        match timeout(query_timeout, fetch(pool, prepared, fetch_limit)).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    async fn fetch(
        pool: &PgPool,
        prepared: &PreparedSql<'_>,
        fetch_limit: usize,
    ) -> StoreResult<Vec<PgRow>> {
        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| acquire_error(e, pool.options().get_acquire_timeout()))?;
        let mut query = sqlx::query(&prepared.sql);
        for param in prepared.params.iter().copied() {
            query = bind_postgres_param(query, param);
        }
        let results = query
            .fetch(&mut *conn)
            .take(fetch_limit)
            .collect::<Vec<_>>()
            .await;
        collect_rows(results)
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        prepared: &PreparedSql<'_>,
        fetch_limit: usize,
        query_timeout: Duration,
    ) -> StoreResult<Vec<SqliteRow>> {
        match timeout(query_timeout, fetch(pool, prepared, fetch_limit)).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    async fn fetch(
        pool: &SqlitePool,
        prepared: &PreparedSql<'_>,
        fetch_limit: usize,
    ) -> StoreResult<Vec<SqliteRow>> {
        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| acquire_error(e, pool.options().get_acquire_timeout()))?;
        let mut query = sqlx::query(&prepared.sql);
        for param in prepared.params.iter().copied() {
            query = bind_sqlite_param(query, param);
        }
        let results = query
            .fetch(&mut *conn)
            .take(fetch_limit)
            .collect::<Vec<_>>()
            .await;
        collect_rows(results)
    }
}
