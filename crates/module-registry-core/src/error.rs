//! Error types for the module registry domain

use thiserror::Error;

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Main error type for domain operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A coordinate segment is empty or not path-safe
    #[error("Invalid module coordinate: {0}")]
    InvalidCoordinate(String),

    /// Webhook payload is malformed or missing required fields
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Artifact key could not be built or parsed
    #[error("Invalid artifact key: {0}")]
    InvalidArtifactKey(String),

    /// Exclusion pattern could not be compiled
    #[error("Invalid exclusion pattern: {0}")]
    InvalidPattern(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::SerializationError(err.to_string())
    }
}
