//! Module Registry API Layer
//!
//! This crate provides the HTTP layer of the module registry using Axum:
//! the webhook receiver, the registry protocol read API, retrieval handle
//! redemption and the operational endpoints.
//!
//! # Architecture
//!
//! - **Handlers**: request handlers for the webhook and read endpoints
//! - **Operations**: the registry protocol operation set, with 501 answers
//!   for the operations this registry does not serve
//! - **Routes**: route definitions and router configuration
//! - **Middleware**: request tracing and request IDs
//! - **Error Handling**: conversion of service errors to HTTP responses
//!
//! # Example
//!
//! ```rust,no_run
//! use module_registry_api::build_api_server;
//! use module_registry_service::ServiceRegistry;
//!
//! # async fn example(services: ServiceRegistry) {
//! let app = build_api_server(services, false);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, app).await.unwrap();
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod operations;
pub mod responses;
pub mod routes;

// Re-export main types for convenience
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::{AppState, TERRAFORM_GET_HEADER};
pub use middleware::{UuidRequestIdGenerator, REQUEST_ID_HEADER};
pub use operations::{RegistryOperation, UnsupportedOperation};
pub use responses::{ComponentHealth, DiscoveryResponse, HealthResponse, HealthStatus, VersionInfo};
pub use routes::{build_router, MODULES_BASE_PATH};

use axum::Router;
use module_registry_service::ServiceRegistry;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

/// Build a complete API server with middleware
///
/// `debug` turns on logging of raw webhook events.
pub fn build_api_server(services: ServiceRegistry, debug: bool) -> Router {
    let state = AppState::new(services).with_debug(debug);

    build_router(state)
        .layer(middleware::trace_layer())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestIdGenerator))
        .layer(PropagateRequestIdLayer::x_request_id())
}
