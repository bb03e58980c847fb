//! Persistence error types and conversions
//!
//! This module provides error types for the version registry, the blob store
//! and the secret store, including connection errors, query errors and data
//! validation errors.

use thiserror::Error;

/// Result type alias for persistence operations
pub type DbResult<T> = Result<T, DbError>;

/// Persistence errors
#[derive(Debug, Error)]
pub enum DbError {
    /// Database connection error
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Connection pool error
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// SQL query error
    #[error("Query error: {0}")]
    Query(String),

    /// Database migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Record or object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Blob store I/O failure
    #[error("Blob store error: {0}")]
    Blob(String),

    /// Secret store failure
    #[error("Secret store error: {0}")]
    Secret(String),

    /// Retrieval handle is malformed, forged or expired
    #[error("Invalid retrieval handle: {0}")]
    InvalidHandle(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Domain error from core crate
    #[error("Domain error: {0}")]
    Domain(#[from] module_registry_core::RegistryError),
}

impl DbError {
    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }

    /// Check if this is a transient error that could be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Connection(_) | DbError::Pool(_) | DbError::Blob(_))
    }
}

/// Convert SQLx database errors to our error type
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound("No rows returned".to_string()),

            sqlx::Error::Database(db_err) => DbError::Query(db_err.message().to_string()),

            sqlx::Error::PoolTimedOut => DbError::Pool("Connection pool timeout".to_string()),

            sqlx::Error::PoolClosed => DbError::Pool("Connection pool closed".to_string()),

            sqlx::Error::Io(io_err) => DbError::Connection(format!("I/O error: {}", io_err)),

            sqlx::Error::Tls(tls_err) => DbError::Connection(format!("TLS error: {}", tls_err)),

            sqlx::Error::Protocol(msg) => DbError::Connection(format!("Protocol error: {}", msg)),

            sqlx::Error::ColumnNotFound(col) => {
                DbError::InvalidData(format!("Column not found: {}", col))
            }

            sqlx::Error::Decode(msg) => DbError::Serialization(format!("Decode error: {}", msg)),

            sqlx::Error::Migrate(migrate_err) => DbError::Migration(format!("{}", migrate_err)),

            _ => DbError::Internal(format!("{}", err)),
        }
    }
}

/// Convert SQLx migration errors
impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(format!("{}", err))
    }
}

/// Convert filesystem errors from the blob store
impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            DbError::NotFound(format!("{}", err))
        } else {
            DbError::Blob(format!("{}", err))
        }
    }
}

/// Convert serde_json errors
impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(format!("{}", err))
    }
}

/// Convert URL parse errors
impl From<url::ParseError> for DbError {
    fn from(err: url::ParseError) -> Self {
        DbError::Configuration(format!("Invalid URL: {}", err))
    }
}

/// Convert from anyhow errors
impl From<anyhow::Error> for DbError {
    fn from(err: anyhow::Error) -> Self {
        DbError::Internal(format!("{}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = DbError::NotFound("test".to_string());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_transient());

        let connection = DbError::Connection("test".to_string());
        assert!(connection.is_transient());
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: DbError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_not_found());

        let err: DbError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no").into();
        assert!(matches!(err, DbError::Blob(_)));
    }

    #[test]
    fn test_error_display() {
        let err = DbError::NotFound("acme/widget/aws".to_string());
        assert_eq!(err.to_string(), "Not found: acme/widget/aws");
    }
}
