//! Query-related data models.
//!
//! This module defines the query configuration supplied by the deployment,
//! page windows, bound parameters and the row records handed back to callers.

use crate::credentials::HashAlgorithm;
use crate::db::params::count_placeholders;
use crate::error::{StoreError, StoreResult};
use crate::models::Dialect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default digest used when the deployment does not name one.
pub const DEFAULT_HASH_FUNCTION: &str = "SHA-256";

/// One result row: column label to string value, `None` for SQL NULL.
pub type RowRecord = HashMap<String, Option<String>>;

/// A parameter value bound to a query placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    Int(i64),
    String(String),
}

impl QueryParam {
    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::String(_) => "string",
        }
    }
}

impl std::fmt::Display for QueryParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// A page window over a result set.
///
/// A missing `first_result` means offset 0; a missing `max_results` means
/// no upper bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    pub first_result: Option<u32>,
    pub max_results: Option<u32>,
}

impl Pageable {
    pub fn new(first_result: Option<u32>, max_results: Option<u32>) -> Self {
        Self {
            first_result,
            max_results,
        }
    }

    /// A window of `max_results` rows starting at `first_result`.
    pub fn window(first_result: u32, max_results: u32) -> Self {
        Self::new(Some(first_result), Some(max_results))
    }

    /// Zero-based offset of the first row.
    pub fn offset(&self) -> u64 {
        self.first_result.unwrap_or(0) as u64
    }

    /// Page size, `None` when unbounded.
    pub fn limit(&self) -> Option<u64> {
        self.max_results.map(u64::from)
    }

    /// True when neither bound is set and the query runs unpaged.
    pub fn is_empty(&self) -> bool {
        self.first_result.is_none() && self.max_results.is_none()
    }
}

/// SQL templates for every lookup the repository performs.
///
/// Templates use `?` as the placeholder mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTemplates {
    /// Lists every user. No placeholders.
    pub list_all: String,
    /// Counts every user. No placeholders.
    pub count: String,
    /// Looks a user up by integer id.
    pub find_by_id: String,
    pub find_by_username: String,
    /// Matches users against a search term; every `?` receives the term.
    pub find_by_search_term: String,
    /// Returns the stored password hash for a username.
    pub find_password_hash: String,
}

/// Deployment query configuration, validated once and immutable afterwards.
///
/// Build it with [`QueryConfig::builder`] or deserialize it; both paths run
/// the same validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QueryConfigBuilder", into = "QueryConfigBuilder")]
pub struct QueryConfig {
    templates: QueryTemplates,
    hash_function: String,
    bcrypt: bool,
    dialect: Dialect,
    allow_database_to_overwrite: bool,
    allow_delete: bool,
}

impl QueryConfig {
    pub fn builder(templates: QueryTemplates, dialect: Dialect) -> QueryConfigBuilder {
        QueryConfigBuilder {
            templates,
            dialect,
            hash_function: DEFAULT_HASH_FUNCTION.to_string(),
            bcrypt: false,
            allow_database_to_overwrite: false,
            allow_delete: false,
        }
    }

    pub fn list_all(&self) -> &str {
        &self.templates.list_all
    }

    pub fn count(&self) -> &str {
        &self.templates.count
    }

    pub fn find_by_id(&self) -> &str {
        &self.templates.find_by_id
    }

    pub fn find_by_username(&self) -> &str {
        &self.templates.find_by_username
    }

    pub fn find_by_search_term(&self) -> &str {
        &self.templates.find_by_search_term
    }

    pub fn find_password_hash(&self) -> &str {
        &self.templates.find_password_hash
    }

    pub fn hash_function(&self) -> &str {
        &self.hash_function
    }

    pub fn is_bcrypt(&self) -> bool {
        self.bcrypt
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn allow_database_to_overwrite(&self) -> bool {
        self.allow_database_to_overwrite
    }

    pub fn allow_delete(&self) -> bool {
        self.allow_delete
    }

    fn validate(&self) -> StoreResult<()> {
        let t = &self.templates;
        let checks: [(&str, &str, bool); 6] = [
            ("list_all", &t.list_all, false),
            ("count", &t.count, false),
            ("find_by_id", &t.find_by_id, true),
            ("find_by_username", &t.find_by_username, true),
            ("find_by_search_term", &t.find_by_search_term, true),
            ("find_password_hash", &t.find_password_hash, true),
        ];

        for (name, sql, needs_placeholder) in checks {
            if sql.trim().is_empty() {
                return Err(StoreError::configuration(
                    format!("Query '{}' is empty", name),
                    "Provide a SQL template for every lookup",
                ));
            }
            let placeholders = count_placeholders(sql);
            if needs_placeholder && placeholders == 0 {
                return Err(StoreError::configuration(
                    format!("Query '{}' has no '?' placeholder", name),
                    "Mark the looked-up value with '?'",
                ));
            }
            if !needs_placeholder && placeholders > 0 {
                return Err(StoreError::configuration(
                    format!(
                        "Query '{}' must not have placeholders, found {}",
                        name, placeholders
                    ),
                    "Remove the '?' marks; this query is run without parameters",
                ));
            }
        }

        HashAlgorithm::resolve(&self.hash_function, self.bcrypt)?;
        Ok(())
    }
}

/// Builder and serialized form of [`QueryConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfigBuilder {
    #[serde(flatten)]
    templates: QueryTemplates,
    dialect: Dialect,
    #[serde(default = "default_hash_function")]
    hash_function: String,
    #[serde(default)]
    bcrypt: bool,
    #[serde(default)]
    allow_database_to_overwrite: bool,
    #[serde(default)]
    allow_delete: bool,
}

fn default_hash_function() -> String {
    DEFAULT_HASH_FUNCTION.to_string()
}

impl QueryConfigBuilder {
    pub fn hash_function(mut self, name: impl Into<String>) -> Self {
        self.hash_function = name.into();
        self
    }

    pub fn bcrypt(mut self, bcrypt: bool) -> Self {
        self.bcrypt = bcrypt;
        self
    }

    pub fn allow_database_to_overwrite(mut self, allow: bool) -> Self {
        self.allow_database_to_overwrite = allow;
        self
    }

    pub fn allow_delete(mut self, allow: bool) -> Self {
        self.allow_delete = allow;
        self
    }

    pub fn build(self) -> StoreResult<QueryConfig> {
        let config = QueryConfig {
            templates: self.templates,
            hash_function: self.hash_function,
            bcrypt: self.bcrypt,
            dialect: self.dialect,
            allow_database_to_overwrite: self.allow_database_to_overwrite,
            allow_delete: self.allow_delete,
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<QueryConfigBuilder> for QueryConfig {
    type Error = StoreError;

    fn try_from(builder: QueryConfigBuilder) -> StoreResult<Self> {
        builder.build()
    }
}

impl From<QueryConfig> for QueryConfigBuilder {
    fn from(config: QueryConfig) -> Self {
        Self {
            templates: config.templates,
            dialect: config.dialect,
            hash_function: config.hash_function,
            bcrypt: config.bcrypt,
            allow_database_to_overwrite: config.allow_database_to_overwrite,
            allow_delete: config.allow_delete,
        }
    }
}
