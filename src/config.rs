//! Configuration handling for the user provider.
//!
//! This module provides configuration management via CLI arguments and
//! environment variables, and the pool tuning options carried in the
//! database URL.

use crate::error::{StoreError, StoreResult};
use crate::models::{ConnectionConfig, Dialect, Pageable, QueryConfig, QueryTemplates};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POOL_LABEL: &str = "default";
/// How long the disposal worker waits for a replaced pool to close.
pub const DEFAULT_DISPOSE_TIMEOUT_SECS: u64 = 30;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MAX_CONNECTIONS_SQLITE: u32 = 1;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection pool configuration options parsed from database URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10 for MySQL/PostgreSQL, 1 for SQLite)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 1)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
}

impl PoolOptions {
    /// Query parameter keys consumed from the URL.
    const URL_KEYS: &'static [&'static str] = &[
        "max_connections",
        "min_connections",
        "idle_timeout",
        "acquire_timeout",
        "test_before_acquire",
    ];

    /// Remove pool option parameters from `url` and parse them.
    ///
    /// Unparseable values are ignored. Remaining parameters are re-encoded
    /// and left for the driver.
    pub fn extract_from_url(url: &mut Url) -> Self {
        let mut opts = extract_options(url, Self::URL_KEYS);
        Self {
            max_connections: opts.remove("max_connections").and_then(|v| v.parse().ok()),
            min_connections: opts.remove("min_connections").and_then(|v| v.parse().ok()),
            idle_timeout_secs: opts.remove("idle_timeout").and_then(|v| v.parse().ok()),
            acquire_timeout_secs: opts.remove("acquire_timeout").and_then(|v| v.parse().ok()),
            test_before_acquire: opts.remove("test_before_acquire").and_then(|v| {
                if v.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if v.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    None
                }
            }),
        }
    }

    /// Get max_connections with default value based on database type.
    pub fn max_connections_or_default(&self, is_sqlite: bool) -> u32 {
        self.max_connections.unwrap_or(if is_sqlite {
            DEFAULT_MAX_CONNECTIONS_SQLITE
        } else {
            DEFAULT_MAX_CONNECTIONS
        })
    }

    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    pub fn idle_timeout_or_default(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS))
    }

    pub fn acquire_timeout_or_default(&self) -> Duration {
        Duration::from_secs(
            self.acquire_timeout_secs
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        )
    }

    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == Some(0) {
            return Err("max_connections must be greater than 0".to_string());
        }
        if let Some(min) = self.min_connections {
            if min == 0 {
                return Err("min_connections must be greater than 0".to_string());
            }
            if let Some(max) = self.max_connections {
                if min > max {
                    return Err(format!(
                        "min_connections ({}) cannot exceed max_connections ({})",
                        min, max
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Pull `keys` out of the URL query string, keeping other pairs for the driver.
fn extract_options(url: &mut Url, keys: &[&str]) -> HashMap<String, String> {
    let mut opts = HashMap::new();
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(k, v)| {
            let key_lower = k.to_ascii_lowercase();
            if keys.contains(&key_lower.as_str()) {
                opts.insert(key_lower, v.into_owned());
                None
            } else {
                Some((k.into_owned(), v.into_owned()))
            }
        })
        .collect();

    if remaining.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(remaining);
    }
    opts
}

/// Command-line configuration for the `db-user-provider` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-user-provider",
    about = "Look up and authenticate users stored in an external SQL database",
    version,
    author
)]
pub struct Config {
    /// Database connection URL. Pool options may be given as query
    /// parameters, e.g. ?max_connections=4&acquire_timeout=10
    #[arg(short = 'd', long = "database", value_name = "URL", env = "DBUP_DATABASE")]
    pub database: String,

    /// Database dialect (detected from the URL scheme when omitted)
    #[arg(long, value_enum, env = "DBUP_DIALECT")]
    pub dialect: Option<Dialect>,

    /// Database user, overrides the one in the URL
    #[arg(long = "db-user", default_value = "", env = "DBUP_DB_USER")]
    pub db_user: String,

    /// Database password, overrides the one in the URL
    #[arg(
        long = "db-password",
        default_value = "",
        env = "DBUP_DB_PASSWORD",
        hide_env_values = true
    )]
    pub db_password: String,

    /// Label used in pool names and logs
    #[arg(long, default_value = DEFAULT_POOL_LABEL, env = "DBUP_POOL_LABEL")]
    pub pool_label: String,

    /// Query listing every user
    #[arg(long, env = "DBUP_LIST_ALL_QUERY")]
    pub list_all_query: String,

    /// Query counting every user
    #[arg(long, env = "DBUP_COUNT_QUERY")]
    pub count_query: String,

    /// Query finding a user by integer id
    #[arg(long, env = "DBUP_FIND_BY_ID_QUERY")]
    pub find_by_id_query: String,

    /// Query finding a user by username
    #[arg(long, env = "DBUP_FIND_BY_USERNAME_QUERY")]
    pub find_by_username_query: String,

    /// Query matching users against a search term
    #[arg(long, env = "DBUP_FIND_BY_SEARCH_TERM_QUERY")]
    pub find_by_search_term_query: String,

    /// Query returning the stored password hash for a username
    #[arg(long, env = "DBUP_FIND_PASSWORD_HASH_QUERY")]
    pub find_password_hash_query: String,

    /// Hash function for stored passwords (SHA-256, MD5, PBKDF2-SHA256, ...)
    #[arg(
        long,
        default_value = crate::models::DEFAULT_HASH_FUNCTION,
        env = "DBUP_HASH_FUNCTION"
    )]
    pub hash_function: String,

    /// Stored passwords are bcrypt hashes
    #[arg(long, env = "DBUP_BCRYPT")]
    pub bcrypt: bool,

    /// Let database attributes overwrite host-held ones
    #[arg(long, env = "DBUP_ALLOW_DATABASE_OVERWRITE")]
    pub allow_database_overwrite: bool,

    /// Report user removal as successful
    #[arg(long, env = "DBUP_ALLOW_DELETE")]
    pub allow_delete: bool,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "DBUP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DBUP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DBUP_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations exposed by the binary.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Count users, optionally only those matching a search term
    Count {
        #[arg(long)]
        search: Option<String>,
    },
    /// Find a user by id
    FindId { id: String },
    /// Find a user by username
    FindUsername { username: String },
    /// List users, optionally filtered and paged
    Search {
        #[arg(long)]
        search: Option<String>,
        /// Zero-based index of the first user returned
        #[arg(long)]
        first: Option<u32>,
        /// Maximum number of users returned
        #[arg(long)]
        max: Option<u32>,
    },
    /// Check a password read from stdin against the stored hash
    Validate { username: String },
}

impl Command {
    /// Page window requested by `search`, if any.
    pub fn pageable(&self) -> Option<Pageable> {
        match self {
            Self::Search { first, max, .. } => {
                Some(Pageable::new(*first, *max)).filter(|p| !p.is_empty())
            }
            _ => None,
        }
    }
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Dialect given explicitly or detected from the URL scheme.
    pub fn resolved_dialect(&self) -> StoreResult<Dialect> {
        self.dialect
            .or_else(|| Dialect::from_connection_string(&self.database))
            .ok_or_else(|| {
                StoreError::configuration(
                    "Cannot detect the database dialect from the URL",
                    "Pass --dialect explicitly",
                )
            })
    }

    pub fn connection_config(&self) -> StoreResult<ConnectionConfig> {
        ConnectionConfig::parse(
            &self.database,
            self.resolved_dialect()?,
            &self.db_user,
            &self.db_password,
            &self.pool_label,
        )
    }

    /// Build and validate the query configuration.
    pub fn query_config(&self) -> StoreResult<QueryConfig> {
        let templates = QueryTemplates {
            list_all: self.list_all_query.clone(),
            count: self.count_query.clone(),
            find_by_id: self.find_by_id_query.clone(),
            find_by_username: self.find_by_username_query.clone(),
            find_by_search_term: self.find_by_search_term_query.clone(),
            find_password_hash: self.find_password_hash_query.clone(),
        };
        QueryConfig::builder(templates, self.resolved_dialect()?)
            .hash_function(self.hash_function.clone())
            .bcrypt(self.bcrypt)
            .allow_database_to_overwrite(self.allow_database_overwrite)
            .allow_delete(self.allow_delete)
            .build()
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }
}
