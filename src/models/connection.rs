//! Connection-related data models.
//!
//! This module defines the dialect descriptor and the configuration of the
//! single database target a provider connects to.

use crate::config::PoolOptions;
use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Supported database dialects.
///
/// Every dialect knows its paging syntax and connectivity test statement.
/// Only PostgreSQL, MySQL and SQLite have a driver compiled in; the others
/// can still be used to format queries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[value(name = "postgresql", alias = "postgres")]
    PostgreSQL,
    /// Includes MariaDB
    #[value(name = "mysql", alias = "mariadb")]
    MySQL,
    #[value(name = "sqlite")]
    SQLite,
    #[value(name = "oracle")]
    Oracle,
    #[value(name = "sqlserver", alias = "mssql")]
    SqlServer,
    #[value(name = "db2")]
    Db2,
}

/// How a dialect expresses an offset/limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingSyntax {
    /// `LIMIT n OFFSET m`
    LimitOffset,
    /// `LIMIT m, n`
    LimitComma,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    OffsetFetch,
    /// Like `OffsetFetch`, but the dialect requires an `ORDER BY` first.
    OrderedOffsetFetch,
    /// Filter on a `ROW_NUMBER()` window column.
    RowNumber,
}

impl Dialect {
    /// Parse the dialect from a connection string scheme.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else if lower.starts_with("oracle://") {
            Some(Self::Oracle)
        } else if lower.starts_with("sqlserver://") || lower.starts_with("mssql://") {
            Some(Self::SqlServer)
        } else if lower.starts_with("db2://") {
            Some(Self::Db2)
        } else {
            None
        }
    }

    /// Get the display name for this dialect.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
            Self::Oracle => "Oracle",
            Self::SqlServer => "SQL Server",
            Self::Db2 => "DB2",
        }
    }

    /// Statement used to check that a freshly built pool is reachable.
    pub fn test_statement(&self) -> &'static str {
        match self {
            Self::Oracle => "SELECT 1 FROM DUAL",
            Self::Db2 => "SELECT 1 FROM SYSIBM.SYSDUMMY1",
            _ => "SELECT 1",
        }
    }

    /// Driver identifier, matching the canonical URL scheme.
    pub fn driver_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
            Self::Oracle => "oracle",
            Self::SqlServer => "sqlserver",
            Self::Db2 => "db2",
        }
    }

    /// Whether a connection pool can be built for this dialect.
    pub fn has_driver(&self) -> bool {
        matches!(self, Self::PostgreSQL | Self::MySQL | Self::SQLite)
    }

    pub fn paging_syntax(&self) -> PagingSyntax {
        match self {
            Self::PostgreSQL | Self::SQLite => PagingSyntax::LimitOffset,
            Self::MySQL => PagingSyntax::LimitComma,
            Self::Oracle => PagingSyntax::OffsetFetch,
            Self::SqlServer => PagingSyntax::OrderedOffsetFetch,
            Self::Db2 => PagingSyntax::RowNumber,
        }
    }

    /// Whether `?` placeholders must be rewritten to numbered `$n` marks.
    pub fn uses_numbered_placeholders(&self) -> bool {
        matches!(self, Self::PostgreSQL)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration of the database target for one provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub connection_string: String,
    pub dialect: Dialect,
    pub username: Option<String>,
    /// Never serialized or logged
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    /// Human-readable name used in pool labels and log lines.
    pub pool_label: String,
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("connection_string", &self.masked_connection_string())
            .field("dialect", &self.dialect)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("pool_label", &self.pool_label)
            .field("pool_options", &self.pool_options)
            .finish()
    }
}

impl ConnectionConfig {
    /// Build a configuration from a connection URL.
    ///
    /// Pool option query parameters (`max_connections`, `min_connections`,
    /// `idle_timeout`, `acquire_timeout`, `test_before_acquire`) are removed
    /// from the URL before it reaches the driver. Empty credentials are
    /// treated as absent.
    pub fn parse(
        connection_string: &str,
        dialect: Dialect,
        username: &str,
        password: &str,
        pool_label: &str,
    ) -> StoreResult<Self> {
        if pool_label.trim().is_empty() {
            return Err(StoreError::configuration(
                "Pool label must not be empty",
                "Name the pool after the realm or database it serves",
            ));
        }

        if let Some(detected) = Dialect::from_connection_string(connection_string) {
            if detected != dialect {
                return Err(StoreError::configuration(
                    format!(
                        "Connection string is for {} but dialect {} was configured",
                        detected, dialect
                    ),
                    "Make the dialect match the connection URL scheme",
                ));
            }
        }

        let mut url = Url::parse(connection_string).map_err(|e| {
            StoreError::configuration(
                format!("Invalid connection URL: {}", e),
                "Use a URL such as postgres://host:5432/users or sqlite:path/to/users.db",
            )
        })?;
        let pool_options = PoolOptions::extract_from_url(&mut url);
        pool_options
            .validate()
            .map_err(|msg| StoreError::configuration(msg, "Fix the pool options in the URL"))?;

        Ok(Self {
            connection_string: url.to_string(),
            dialect,
            username: Some(username.to_string()).filter(|u| !u.is_empty()),
            password: Some(password.to_string()).filter(|p| !p.is_empty()),
            pool_label: pool_label.to_string(),
            pool_options,
        })
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        let s = &self.connection_string;
        let authority_start = s.find("://").map(|pos| pos + 3).unwrap_or(0);
        if let Some(at_pos) = s[authority_start..].find('@').map(|p| p + authority_start) {
            if let Some(colon_pos) = s[authority_start..at_pos].rfind(':') {
                let colon_pos = colon_pos + authority_start;
                return format!("{}****{}", &s[..=colon_pos], &s[at_pos..]);
            }
        }
        s.clone()
    }
}
