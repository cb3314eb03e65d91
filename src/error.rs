//! Error types for the user provider.
//!
//! Errors fall in two groups. Per-query failures (`NoConnection`,
//! `SqlExecution`, `Timeout`) are logged by the executor and degrade to an
//! empty result. Structural failures (bad configuration, undecodable rows,
//! malformed hashes) are always propagated to the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration error: {message}")]
    Configuration { message: String, suggestion: String },

    #[error("No database connection is present")]
    NoConnection,

    #[error("SQL execution failed: {message}")]
    SqlExecution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Failed to decode result set: {message}")]
    DataDecode { message: String },

    #[error("Malformed credential record: {reason}")]
    MalformedCredentialRecord { reason: String },

    #[error("Unsupported hash algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    #[error("Operation not supported: {operation}")]
    NotSupported { operation: String },

    #[error("Invalid user identifier: '{value}' is not an integer")]
    InvalidIdentifier { value: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StoreError {
    /// Create a configuration error with a helpful suggestion.
    pub fn configuration(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn sql_execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::SqlExecution {
            message: message.into(),
            sql_state,
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn data_decode(message: impl Into<String>) -> Self {
        Self::DataDecode {
            message: message.into(),
        }
    }

    pub fn malformed_credential(reason: impl Into<String>) -> Self {
        Self::MalformedCredentialRecord {
            reason: reason.into(),
        }
    }

    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
        }
    }

    pub fn invalid_identifier(value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Configuration { suggestion, .. } => Some(suggestion),
            Self::NoConnection => Some("Configure the connection provider before running queries"),
            Self::DataDecode { .. } => {
                Some("Check that the configured queries match the database schema")
            }
            Self::UnsupportedAlgorithm { .. } => {
                Some("Use PBKDF2-SHA256, bcrypt, MD5, SHA-1, SHA-224, SHA-256, SHA-384 or SHA-512")
            }
            _ => None,
        }
    }

    /// Per-query failures that the executor degrades to "no result".
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NoConnection | Self::SqlExecution { .. } | Self::Timeout { .. }
        )
    }
}

/// Convert sqlx errors to StoreError.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => StoreError::configuration(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                StoreError::sql_execution(db_err.message(), code)
            }
            sqlx::Error::PoolTimedOut => {
                StoreError::sql_execution("Timed out waiting for a pooled connection", None)
            }
            sqlx::Error::PoolClosed => StoreError::sql_execution("Connection pool is closed", None),
            sqlx::Error::Io(io_err) => StoreError::sql_execution(format!("I/O error: {}", io_err), None),
            sqlx::Error::Tls(tls_err) => {
                StoreError::sql_execution(format!("TLS error: {}", tls_err), None)
            }
            sqlx::Error::Protocol(msg) => {
                StoreError::sql_execution(format!("Protocol error: {}", msg), None)
            }
            sqlx::Error::TypeNotFound { type_name } => {
                StoreError::data_decode(format!("Type not found: {}", type_name))
            }
            sqlx::Error::ColumnNotFound(col) => {
                StoreError::data_decode(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => StoreError::data_decode(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                StoreError::data_decode(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => StoreError::data_decode(format!("Decode error: {}", source)),
            _ => StoreError::sql_execution(format!("Unknown database error: {}", err), None),
        }
    }
}

/// Result type alias for provider operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::configuration("pool unreachable", "Check credentials");
        assert!(err.to_string().contains("Configuration error"));
        assert_eq!(err.suggestion(), Some("Check credentials"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::NoConnection.is_transient());
        assert!(StoreError::sql_execution("syntax error", None).is_transient());
        assert!(StoreError::timeout("query", 30).is_transient());
        assert!(!StoreError::data_decode("bad column").is_transient());
        assert!(!StoreError::malformed_credential("3 fields").is_transient());
        assert!(!StoreError::unsupported_algorithm("WHIRLPOOL").is_transient());
        assert!(!StoreError::not_supported("update credentials").is_transient());
    }

    #[test]
    fn test_decode_errors_are_not_transient() {
        let err: StoreError = sqlx::Error::ColumnNotFound("username".to_string()).into();
        assert!(matches!(err, StoreError::DataDecode { .. }));

        let err: StoreError = sqlx::Error::ColumnIndexOutOfBounds { index: 3, len: 1 }.into();
        assert!(matches!(err, StoreError::DataDecode { .. }));
    }

    #[test]
    fn test_pool_errors_are_transient() {
        let err: StoreError = sqlx::Error::PoolClosed.into();
        assert!(err.is_transient());

        // The pool's acquire timeout is not known here.
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::SqlExecution { .. }));
        assert!(err.is_transient());
        assert!(!err.to_string().contains("30s"));
    }

    #[test]
    fn test_invalid_identifier_message() {
        let err = StoreError::invalid_identifier("abc");
        assert!(err.to_string().contains("'abc'"));
    }
}
