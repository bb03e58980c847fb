//! Service-layer error types
//!
//! This module defines the ingestion and retrieval error taxonomy, mapping
//! domain and persistence errors to service-level errors. Every variant keeps
//! the underlying cause as a string for operator logs.

use module_registry_core::RegistryError;
use module_registry_db::DbError;
use thiserror::Error;

/// Result type alias for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Service-layer error types
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Webhook signature missing, malformed or wrong
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Event is not a tag creation or is malformed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Snapshot retrieval failed
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Archive could not be built
    #[error("Packaging failed: {0}")]
    Packaging(String),

    /// Artifact could not be written to the blob store
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Version registry read or write failed
    #[error("Registry error: {0}")]
    Registry(String),

    /// Module or version not registered
    #[error("Not found: {0}")]
    NotFound(String),

    /// Retrieval handle rejected
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A bounded step ran past its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Registry API operation that is routed but not implemented
    #[error("Not implemented: {0}")]
    Unsupported(String),

    /// Internal service error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Short machine-readable kind, used in logs and error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Authentication(_) => "authentication",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Fetch(_) => "fetch",
            ServiceError::Packaging(_) => "packaging",
            ServiceError::Upload(_) => "upload",
            ServiceError::Registry(_) => "registry",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Timeout(_) => "timeout",
            ServiceError::Unsupported(_) => "unsupported",
            ServiceError::Internal(_) => "internal",
        }
    }

    /// Whether the sender should redeliver the triggering event
    pub fn is_redeliverable(&self) -> bool {
        matches!(
            self,
            ServiceError::Fetch(_)
                | ServiceError::Packaging(_)
                | ServiceError::Upload(_)
                | ServiceError::Registry(_)
                | ServiceError::Timeout(_)
                | ServiceError::Internal(_)
        )
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidCoordinate(msg)
            | RegistryError::InvalidEvent(msg)
            | RegistryError::InvalidArtifactKey(msg) => ServiceError::BadRequest(msg),
            RegistryError::InvalidPattern(msg) => ServiceError::Packaging(msg),
            RegistryError::SerializationError(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            DbError::InvalidHandle(msg) => ServiceError::Forbidden(msg),
            DbError::Blob(msg) => ServiceError::Upload(msg),
            DbError::Connection(msg)
            | DbError::Pool(msg)
            | DbError::Query(msg)
            | DbError::Migration(msg) => ServiceError::Registry(msg),
            DbError::Secret(msg)
            | DbError::InvalidData(msg)
            | DbError::Serialization(msg)
            | DbError::Configuration(msg)
            | DbError::Internal(msg) => ServiceError::Internal(msg),
            DbError::Domain(err) => ServiceError::from(err),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(format!("Serialization error: {}", err))
    }
}
