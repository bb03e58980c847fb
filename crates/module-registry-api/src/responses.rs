//! API response types
//!
//! Response bodies that are not produced by the service layer: health,
//! version and service discovery.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: HealthStatus,

    /// Service version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Component health checks
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub checks: BTreeMap<String, ComponentHealth>,
}

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Service is healthy
    Healthy,
    /// Service is degraded but operational
    Degraded,
    /// Service is unhealthy
    Unhealthy,
}

/// Component health status
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: HealthStatus,

    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthResponse {
    /// Create a healthy response
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            version: None,
            checks: BTreeMap::new(),
        }
    }

    /// Create a response with version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add a component health check
    pub fn with_check(mut self, name: impl Into<String>, health: ComponentHealth) -> Self {
        self.checks.insert(name.into(), health);
        self
    }

    /// Determine overall health status from component checks
    pub fn compute_status(mut self) -> Self {
        let worst = |status| self.checks.values().any(|c| c.status == status);
        self.status = if worst(HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if worst(HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        self
    }
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status_code, Json(self)).into_response()
    }
}

impl ComponentHealth {
    /// Create a healthy component
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    /// Create an unhealthy component
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}

/// Version information
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Crate version
    pub version: String,

    /// Registry protocol version served
    pub api_version: String,

    /// Build timestamp
    pub build_timestamp: String,
}

/// Service discovery document
///
/// Tells module clients where the read API is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    /// Base path of the modules API
    #[serde(rename = "modules.v1")]
    pub modules_v1: String,
}

impl Default for DiscoveryResponse {
    fn default() -> Self {
        Self {
            modules_v1: "/v1/modules/".to_string(),
        }
    }
}
