//! Registry protocol operations
//!
//! The module registry protocol defines more operations than this registry
//! serves. Every operation is routed; the unsupported ones answer 501 with a
//! body naming the operation and the parameters it was called with.

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Closed set of registry protocol operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryOperation {
    /// `GET /v1/modules`
    ListModules,
    /// `GET /v1/modules/{namespace}`
    ListModulesNamespace,
    /// `GET /v1/modules/search`
    SearchModules,
    /// `GET /v1/modules/{namespace}/{name}/{provider}/versions`
    ListVersions,
    /// `GET /v1/modules/{namespace}/{name}/{provider}/{version}/download`
    ResolveDownload,
    /// `GET /v1/modules/{namespace}/{name}`
    ListLatestVersionOfModuleForAllProviders,
    /// `GET /v1/modules/{namespace}/{name}/{provider}`
    LatestVersionForSpecificModuleProvider,
    /// `GET /v1/modules/{namespace}/{name}/{provider}/{version}`
    GetSpecificModule,
    /// `GET /v1/modules/{namespace}/{name}/{provider}/download`
    DownloadLatestVersionOfModule,
    /// Anything the router does not recognise
    UnknownRoute,
}

impl RegistryOperation {
    /// Operation name as it appears in responses
    pub fn name(&self) -> &'static str {
        match self {
            RegistryOperation::ListModules => "ListModules",
            RegistryOperation::ListModulesNamespace => "ListModulesNamespace",
            RegistryOperation::SearchModules => "SearchModules",
            RegistryOperation::ListVersions => "ListVersions",
            RegistryOperation::ResolveDownload => "ResolveDownload",
            RegistryOperation::ListLatestVersionOfModuleForAllProviders => {
                "ListLatestVersionOfModuleForAllProviders"
            }
            RegistryOperation::LatestVersionForSpecificModuleProvider => {
                "LatestVersionForSpecificModuleProvider"
            }
            RegistryOperation::GetSpecificModule => "GetSpecificModule",
            RegistryOperation::DownloadLatestVersionOfModule => "DownloadLatestVersionOfModule",
            RegistryOperation::UnknownRoute => "UnknownRoute",
        }
    }

    /// Whether this registry serves the operation
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            RegistryOperation::ListVersions | RegistryOperation::ResolveDownload
        )
    }
}

impl fmt::Display for RegistryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Body of a 501 answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupportedOperation {
    /// `Not implemented: <operation>`
    pub message: String,

    /// Operation name
    pub operation: String,

    /// Path parameters the route captured
    #[serde(rename = "pathParameters")]
    pub path_parameters: BTreeMap<String, String>,

    /// Query string parameters
    #[serde(rename = "queryStringParameters")]
    pub query_parameters: BTreeMap<String, String>,
}

impl UnsupportedOperation {
    /// Describe a call to `operation`
    pub fn new(
        operation: RegistryOperation,
        path_parameters: BTreeMap<String, String>,
        query_parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            message: format!("Not implemented: {}", operation),
            operation: operation.name().to_string(),
            path_parameters,
            query_parameters,
        }
    }
}

impl IntoResponse for UnsupportedOperation {
    fn into_response(self) -> Response {
        (StatusCode::NOT_IMPLEMENTED, Json(self)).into_response()
    }
}

fn unsupported(
    operation: RegistryOperation,
    path_parameters: BTreeMap<String, String>,
    query_parameters: BTreeMap<String, String>,
) -> UnsupportedOperation {
    debug!(operation = %operation, "Unsupported registry operation requested");
    UnsupportedOperation::new(operation, path_parameters, query_parameters)
}

// ============================================================================
// Unsupported operation handlers
// ============================================================================

/// `GET /v1/modules`
pub async fn list_modules(
    Query(query): Query<BTreeMap<String, String>>,
) -> UnsupportedOperation {
    unsupported(RegistryOperation::ListModules, BTreeMap::new(), query)
}

/// `GET /v1/modules/search`
pub async fn search_modules(
    Query(query): Query<BTreeMap<String, String>>,
) -> UnsupportedOperation {
    unsupported(RegistryOperation::SearchModules, BTreeMap::new(), query)
}

/// `GET /v1/modules/{namespace}`
pub async fn list_modules_namespace(
    Path(params): Path<BTreeMap<String, String>>,
    Query(query): Query<BTreeMap<String, String>>,
) -> UnsupportedOperation {
    unsupported(RegistryOperation::ListModulesNamespace, params, query)
}

/// `GET /v1/modules/{namespace}/{name}`
pub async fn list_latest_for_all_providers(
    Path(params): Path<BTreeMap<String, String>>,
    Query(query): Query<BTreeMap<String, String>>,
) -> UnsupportedOperation {
    unsupported(
        RegistryOperation::ListLatestVersionOfModuleForAllProviders,
        params,
        query,
    )
}

/// `GET /v1/modules/{namespace}/{name}/{provider}`
pub async fn latest_for_provider(
    Path(params): Path<BTreeMap<String, String>>,
    Query(query): Query<BTreeMap<String, String>>,
) -> UnsupportedOperation {
    unsupported(
        RegistryOperation::LatestVersionForSpecificModuleProvider,
        params,
        query,
    )
}

/// `GET /v1/modules/{namespace}/{name}/{provider}/{version}`
pub async fn get_specific_module(
    Path(params): Path<BTreeMap<String, String>>,
    Query(query): Query<BTreeMap<String, String>>,
) -> UnsupportedOperation {
    unsupported(RegistryOperation::GetSpecificModule, params, query)
}

/// `GET /v1/modules/{namespace}/{name}/{provider}/download`
pub async fn download_latest(
    Path(params): Path<BTreeMap<String, String>>,
    Query(query): Query<BTreeMap<String, String>>,
) -> UnsupportedOperation {
    unsupported(RegistryOperation::DownloadLatestVersionOfModule, params, query)
}

/// Router fallback
pub async fn unknown_route(
    Query(query): Query<BTreeMap<String, String>>,
) -> UnsupportedOperation {
    unsupported(RegistryOperation::UnknownRoute, BTreeMap::new(), query)
}
