//! API request handlers
//!
//! This module implements HTTP request handlers for all API endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use module_registry_core::{ModuleCoordinate, Version};
use module_registry_service::{
    ImportResponse, IngestionReport, ModuleVersionsResponse, ServiceError, ServiceRegistry,
    SIGNATURE_HEADER,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{ApiError, ApiResult},
    responses::{ComponentHealth, DiscoveryResponse, HealthResponse, VersionInfo},
};

/// Header carrying the retrieval handle on a download answer
pub const TERRAFORM_GET_HEADER: &str = "x-terraform-get";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Service registry
    pub services: Arc<ServiceRegistry>,

    /// Log raw webhook events
    pub debug: bool,
}

impl AppState {
    /// Create new application state
    pub fn new(services: ServiceRegistry) -> Self {
        Self {
            services: Arc::new(services),
            debug: false,
        }
    }

    /// Enable or disable debug logging of raw events
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Path parameters naming one module
#[derive(Debug, Deserialize)]
pub struct ModulePath {
    /// Organization
    pub namespace: String,
    /// Repository
    pub name: String,
    /// Provider
    pub provider: String,
}

impl ModulePath {
    fn coordinate(&self) -> ApiResult<ModuleCoordinate> {
        Ok(ModuleCoordinate::new(
            self.namespace.as_str(),
            self.name.as_str(),
            self.provider.as_str(),
        )?)
    }
}

/// Path parameters naming one module version
#[derive(Debug, Deserialize)]
pub struct ModuleVersionPath {
    /// Organization
    pub namespace: String,
    /// Repository
    pub name: String,
    /// Provider
    pub provider: String,
    /// Version
    pub version: String,
}

/// Query string of a retrieval handle
#[derive(Debug, Deserialize)]
pub struct HandleQuery {
    /// Expiry as unix seconds
    pub expires: Option<i64>,
    /// Lowercase hex HMAC
    pub signature: Option<String>,
}

// ============================================================================
// Ingestion Handlers
// ============================================================================

/// Receive a tag-push webhook delivery
///
/// The body is taken as raw bytes: the signature covers the exact payload.
#[instrument(skip(state, headers, body), fields(size = body.len()))]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<IngestionReport>> {
    if state.debug {
        debug!(event = %String::from_utf8_lossy(&body), "Received event");
    }

    let signature = match headers.get(SIGNATURE_HEADER) {
        Some(value) => match value.to_str() {
            Ok(text) => Some(text),
            Err(_) => {
                warn!("Signature header is not valid ASCII");
                None
            }
        },
        None => None,
    };

    let report = state
        .services
        .ingestion()
        .ingest(signature, &body)
        .await
        .map_err(ApiError::from)?;

    info!(
        module = %report.module,
        version = %report.version,
        "Webhook processed"
    );
    Ok(Json(report))
}

// ============================================================================
// Registry Handlers
// ============================================================================

/// List every version of one module
#[instrument(skip(state))]
pub async fn list_versions(
    State(state): State<AppState>,
    Path(path): Path<ModulePath>,
) -> ApiResult<Json<ModuleVersionsResponse>> {
    let coordinate = path.coordinate()?;

    let listing = state
        .services
        .retrieval()
        .list_versions(&coordinate)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(listing))
}

/// Answer with a retrieval handle for one version
///
/// 204 with the handle in `X-Terraform-Get` and an empty body.
#[instrument(skip(state))]
pub async fn resolve_download(
    State(state): State<AppState>,
    Path(path): Path<ModuleVersionPath>,
) -> ApiResult<Response> {
    let coordinate = ModuleCoordinate::new(
        path.namespace.as_str(),
        path.name.as_str(),
        path.provider.as_str(),
    )?;
    let version = Version::new(path.version);

    let handle = state
        .services
        .retrieval()
        .resolve_download(&coordinate, &version)
        .await
        .map_err(ApiError::from)?;

    let location = HeaderValue::from_str(&handle.url).map_err(|e| {
        ApiError::internal_server_error(format!("retrieval handle is not a valid header: {}", e))
    })?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    response.headers_mut().insert(TERRAFORM_GET_HEADER, location);
    Ok(response)
}

/// Redeem a retrieval handle
#[instrument(skip(state, query))]
pub async fn redeem_artifact(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<HandleQuery>,
) -> ApiResult<Response> {
    let (expires, signature) = match (query.expires, query.signature) {
        (Some(expires), Some(signature)) => (expires, signature),
        _ => {
            return Err(ApiError::from(ServiceError::Forbidden(
                "retrieval handle is incomplete".to_string(),
            )))
        }
    };

    let bytes = state
        .services
        .retrieval()
        .redeem(&key, expires, &signature)
        .await
        .map_err(ApiError::from)?;

    debug!(size = bytes.len(), "Serving artifact");
    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"))],
        bytes,
    )
        .into_response())
}

/// Echo the module path an import of a ref resolves to
#[instrument(skip(state))]
pub async fn describe_import(
    State(state): State<AppState>,
    Path((organization, repository, git_ref)): Path<(String, String, String)>,
) -> Json<ImportResponse> {
    Json(
        state
            .services
            .retrieval()
            .describe_import(&organization, &repository, &git_ref),
    )
}

/// Service discovery document
pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse::default())
}

// ============================================================================
// Health & Version Handlers
// ============================================================================

/// Health check endpoint
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> HealthResponse {
    let registry = match state.services.health_check().await {
        Ok(()) => ComponentHealth::healthy(),
        Err(e) => ComponentHealth::unhealthy(format!("Registry error: {}", e)),
    };

    HealthResponse::healthy()
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_check("registry", registry)
        .compute_status()
}

/// Get API version information
pub async fn version_info() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_version: "modules.v1".to_string(),
        build_timestamp: option_env!("BUILD_TIMESTAMP")
            .unwrap_or("unknown")
            .to_string(),
    })
}
