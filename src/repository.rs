//! User lookup and credential validation over the configured query templates.
//!
//! [`UserRepository`] is the entry point a host calls into. Every operation
//! runs one template through the [`QueryExecutor`]; connection and statement
//! failures are already logged there and surface here as "no result".

use crate::credentials::{self, CredentialVerifier};
use crate::db::executor::QueryExecutor;
use crate::db::paging::trim_terminator;
use crate::db::pool::ConnectionProvider;
use crate::db::transform::{ReadInt, ReadRecords, ReadString};
use crate::error::{StoreError, StoreResult};
use crate::models::{Pageable, QueryConfig, QueryParam, RowRecord};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Read-only view of an external user table.
#[derive(Debug, Clone)]
pub struct UserRepository {
    config: Arc<QueryConfig>,
    executor: QueryExecutor,
    verifier: CredentialVerifier,
}

impl UserRepository {
    pub fn new(config: Arc<QueryConfig>, provider: Arc<ConnectionProvider>) -> StoreResult<Self> {
        Self::with_executor(config, QueryExecutor::new(provider))
    }

    /// Build a repository around an executor with its own timeout.
    pub fn with_executor(config: Arc<QueryConfig>, executor: QueryExecutor) -> StoreResult<Self> {
        let verifier = CredentialVerifier::from_config(&config)?;
        Ok(Self {
            config,
            executor,
            verifier,
        })
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Number of users, optionally restricted to those matching `search`.
    ///
    /// A failed query counts as 0.
    pub async fn count_users(&self, search: Option<&str>) -> StoreResult<i64> {
        let count = match search.filter(|s| !s.is_empty()) {
            None => {
                self.executor
                    .execute(self.config.count(), None, &ReadInt, &[])
                    .await?
            }
            Some(term) => {
                let sql = format!(
                    "SELECT COUNT(*) FROM ({}) matched",
                    trim_terminator(self.config.find_by_search_term())
                );
                self.executor
                    .execute(&sql, None, &ReadInt, &[QueryParam::from(term)])
                    .await?
            }
        };
        Ok(count.unwrap_or(0))
    }

    /// Fetch the user with the given numeric id.
    ///
    /// Identifiers that are not integers are rejected before any query runs.
    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<RowRecord>> {
        let id: i64 = id
            .parse()
            .map_err(|_| StoreError::invalid_identifier(id))?;
        self.first_record(self.config.find_by_id(), QueryParam::Int(id))
            .await
    }

    pub async fn find_by_username(&self, username: &str) -> StoreResult<Option<RowRecord>> {
        self.first_record(self.config.find_by_username(), QueryParam::from(username))
            .await
    }

    /// Email lookups go through the username template; deployments that
    /// log in by email point that template at the email column.
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<RowRecord>> {
        self.find_by_username(email).await
    }

    /// List users, matching `search` when given, within the `pageable` window.
    ///
    /// A failed query yields an empty list.
    pub async fn find_users(
        &self,
        search: Option<&str>,
        pageable: Option<&Pageable>,
    ) -> StoreResult<Vec<RowRecord>> {
        let rows = match search.filter(|s| !s.is_empty()) {
            None => {
                self.executor
                    .execute(self.config.list_all(), pageable, &ReadRecords, &[])
                    .await?
            }
            Some(term) => {
                self.executor
                    .execute(
                        self.config.find_by_search_term(),
                        pageable,
                        &ReadRecords,
                        &[QueryParam::from(term)],
                    )
                    .await?
            }
        };
        Ok(rows.unwrap_or_default())
    }

    pub async fn all_users(&self) -> StoreResult<Vec<RowRecord>> {
        self.find_users(None, None).await
    }

    /// Check `plaintext` against the hash stored for `username`.
    ///
    /// A user without a stored hash never validates.
    pub async fn validate_credentials(&self, username: &str, plaintext: &str) -> StoreResult<bool> {
        let stored = self
            .executor
            .execute(
                self.config.find_password_hash(),
                None,
                &ReadString,
                &[QueryParam::from(username)],
            )
            .await?
            .unwrap_or_default();

        let valid = self.verifier.verify_blocking(plaintext, &stored).await?;
        debug!(
            username = %username,
            algorithm = %self.verifier.algorithm(),
            valid,
            "Credentials checked"
        );
        Ok(valid)
    }

    /// Password changes are never written back to the external database.
    pub async fn update_credentials(&self, username: &str, _plaintext: &str) -> StoreResult<bool> {
        warn!(username = %username, "Rejected credential update");
        Err(StoreError::not_supported("update credentials"))
    }

    /// Report whether the host may drop the user. Nothing is deleted here.
    pub fn remove_user(&self) -> bool {
        let allowed = self.config.allow_delete();
        info!(allowed, "User removal requested");
        allowed
    }

    /// User creation is not supported; the host falls through to its next provider.
    pub fn add_user(&self, username: &str) -> Option<RowRecord> {
        debug!(username = %username, "User creation not supported");
        None
    }

    pub fn supports_credential_type(&self, credential_type: &str) -> bool {
        credentials::supports_credential_type(credential_type)
    }

    pub fn allow_database_to_overwrite(&self) -> bool {
        self.config.allow_database_to_overwrite()
    }

    async fn first_record(
        &self,
        template: &str,
        param: QueryParam,
    ) -> StoreResult<Option<RowRecord>> {
        let rows = self
            .executor
            .execute(template, None, &ReadRecords, &[param])
            .await?;
        Ok(rows.and_then(|rows| rows.into_iter().next()))
    }
}
