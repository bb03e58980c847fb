//! API error handling
//!
//! This module converts service errors into HTTP responses. Client errors
//! carry their message through; server errors answer with a generic message
//! and the cause is written to the log instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use module_registry_core::RegistryError;
use module_registry_service::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// API error type that can be converted to HTTP responses
#[derive(Debug)]
pub struct ApiError {
    status_code: StatusCode,
    message: String,
    error_code: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            error_code: None,
        }
    }

    /// Create an API error with an error code
    pub fn with_code(
        status_code: StatusCode,
        message: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            message: message.into(),
            error_code: Some(error_code.into()),
        }
    }

    /// Create a bad request error (400)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Create a not found error (404)
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// Create an internal server error (500)
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// HTTP status of this error
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Message that will be sent to the client
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status: u16,

    /// Error message
    pub error: String,

    /// Optional error code for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Timestamp of the error
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_response = ErrorResponse {
            status: self.status_code.as_u16(),
            error: self.message,
            code: self.error_code,
            timestamp: chrono::Utc::now(),
        };

        (self.status_code, Json(error_response)).into_response()
    }
}

/// Convert ServiceError to ApiError
impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = err.kind().to_ascii_uppercase();
        match err {
            ServiceError::Authentication(_) => {
                ApiError::with_code(StatusCode::UNAUTHORIZED, "Invalid signature header", code)
            }
            ServiceError::BadRequest(msg) => {
                ApiError::with_code(StatusCode::BAD_REQUEST, msg, code)
            }
            ServiceError::NotFound(msg) => ApiError::with_code(StatusCode::NOT_FOUND, msg, code),
            ServiceError::Forbidden(_) => ApiError::with_code(
                StatusCode::FORBIDDEN,
                "Retrieval handle is invalid or expired",
                code,
            ),
            ServiceError::Unsupported(operation) => ApiError::with_code(
                StatusCode::NOT_IMPLEMENTED,
                format!("Not implemented: {}", operation),
                code,
            ),
            ServiceError::Fetch(ref cause)
            | ServiceError::Upload(ref cause)
            | ServiceError::Registry(ref cause) => {
                error!(kind = err.kind(), "Upstream failure: {}", cause);
                ApiError::with_code(StatusCode::BAD_GATEWAY, "Upstream dependency failed", code)
            }
            ServiceError::Packaging(ref cause)
            | ServiceError::Timeout(ref cause)
            | ServiceError::Internal(ref cause) => {
                error!(kind = err.kind(), "Request failed: {}", cause);
                ApiError::with_code(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", code)
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::from(ServiceError::from(err))
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_creation() {
        let err = ApiError::bad_request("Not a new tag event");
        assert_eq!(err.status_code, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Not a new tag event");
    }

    #[test]
    fn test_service_error_status_mapping() {
        let cases = vec![
            (ServiceError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::Unsupported("x".into()), StatusCode::NOT_IMPLEMENTED),
            (ServiceError::Fetch("x".into()), StatusCode::BAD_GATEWAY),
            (ServiceError::Upload("x".into()), StatusCode::BAD_GATEWAY),
            (ServiceError::Registry("x".into()), StatusCode::BAD_GATEWAY),
            (ServiceError::Packaging("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Timeout("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (service_err, expected) in cases {
            let api_err: ApiError = service_err.into();
            assert_eq!(api_err.status_code, expected);
        }
    }

    #[test]
    fn test_server_errors_hide_cause() {
        let api_err: ApiError =
            ServiceError::Fetch("clone https://secret@github.com failed".into()).into();
        assert!(!api_err.message.contains("secret"));
        assert_eq!(api_err.error_code.as_deref(), Some("FETCH"));
    }

    #[test]
    fn test_unsupported_names_operation() {
        let api_err: ApiError = ServiceError::Unsupported("SearchModules".into()).into();
        assert_eq!(api_err.message, "Not implemented: SearchModules");
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            status: 404,
            error: "No such module".to_string(),
            code: Some("NOT_FOUND".to_string()),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":404"));
        assert!(json.contains("\"error\":\"No such module\""));
    }
}
