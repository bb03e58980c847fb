//! API route definitions
//!
//! This module defines all API routes and builds the router.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    handlers::{
        describe_import, discovery, health_check, list_versions, receive_webhook,
        redeem_artifact, resolve_download, version_info, AppState,
    },
    operations,
};

/// Mount point of the registry protocol
pub const MODULES_BASE_PATH: &str = "/v1/modules";

/// Build the API router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and info endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_info))
        .route("/.well-known/terraform.json", get(discovery))
        // Ingestion
        .route("/webhook", post(receive_webhook))
        .route(
            "/import/{organization}/{repository}/{ref}",
            get(describe_import),
        )
        // Retrieval handles
        .route("/artifacts/{*key}", get(redeem_artifact))
        // Registry protocol
        .nest(MODULES_BASE_PATH, build_modules_routes())
        .fallback(operations::unknown_route)
        .with_state(state)
}

/// Build registry protocol routes
fn build_modules_routes() -> Router<AppState> {
    Router::new()
        // Supported
        .route("/{namespace}/{name}/{provider}/versions", get(list_versions))
        .route(
            "/{namespace}/{name}/{provider}/{version}/download",
            get(resolve_download),
        )
        // Answered with 501
        .route("/", get(operations::list_modules))
        .route("/search", get(operations::search_modules))
        .route("/{namespace}", get(operations::list_modules_namespace))
        .route(
            "/{namespace}/{name}",
            get(operations::list_latest_for_all_providers),
        )
        .route(
            "/{namespace}/{name}/{provider}",
            get(operations::latest_for_provider),
        )
        .route(
            "/{namespace}/{name}/{provider}/download",
            get(operations::download_latest),
        )
        .route(
            "/{namespace}/{name}/{provider}/{version}",
            get(operations::get_specific_module),
        )
}
