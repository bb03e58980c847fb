//! Registry API Integration Tests
//!
//! Read path, retrieval handles and the operational endpoints, against
//! versions seeded straight into the stores.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{handle_request_uri, TestApp, HANDLE_KEY, PUBLIC_URL};
use module_registry_core::{ArtifactKey, ModuleCoordinate, Version, VersionRecord};
use module_registry_db::{BlobStore, HandleSigner, VersionRepository};

fn widget() -> ModuleCoordinate {
    ModuleCoordinate::new("acme", "widget", "aws").unwrap()
}

async fn seed(app: &TestApp, versions: &[&str]) {
    for version in versions {
        let version = Version::new(*version);
        let key = ArtifactKey::for_version(&widget(), &version).unwrap();
        app.blobs
            .put(&key, format!("archive {}", version).into_bytes())
            .await
            .unwrap();
        app.versions
            .put(VersionRecord::new(widget(), version, key.as_str()))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;
    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["registry"]["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_version_endpoint() {
    let app = TestApp::new().await;
    let response = app.get("/version").await;

    assert_eq!(response.status, StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert!(body["version"].is_string());
    assert!(body["build_timestamp"].is_string());
}

#[tokio::test]
async fn test_discovery_document() {
    let app = TestApp::new().await;
    let response = app.get("/.well-known/terraform.json").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json::<serde_json::Value>(),
        serde_json::json!({"modules.v1": "/v1/modules/"})
    );
}

#[tokio::test]
async fn test_list_versions_most_recent_first() {
    let app = TestApp::new().await;
    seed(&app, &["1.0.0", "1.2.0", "1.1.0"]).await;

    let response = app.get("/v1/modules/acme/widget/aws/versions").await;
    assert_eq!(response.status, StatusCode::OK);

    let body: serde_json::Value = response.json();
    let versions: Vec<&str> = body["modules"][0]["versions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_str().unwrap())
        .collect();
    assert_eq!(versions, vec!["1.2.0", "1.1.0", "1.0.0"]);
    assert_eq!(body["modules"][0]["source"], "acme/widget/aws");
}

#[tokio::test]
async fn test_unknown_module_and_version_are_not_found() {
    let app = TestApp::new().await;
    seed(&app, &["1.0.0"]).await;

    let listing = app.get("/v1/modules/acme/gadget/aws/versions").await;
    assert_eq!(listing.status, StatusCode::NOT_FOUND);
    assert_eq!(listing.json::<serde_json::Value>()["error"], "No such module");

    let download = app.get("/v1/modules/acme/widget/aws/3.0.0/download").await;
    assert_eq!(download.status, StatusCode::NOT_FOUND);
    assert!(!download.headers.contains_key("x-terraform-get"));
}

#[tokio::test]
async fn test_handle_redeems_artifact() {
    let app = TestApp::new().await;
    seed(&app, &["1.0.0"]).await;

    let download = app.get("/v1/modules/acme/widget/aws/1.0.0/download").await;
    assert_eq!(download.status, StatusCode::NO_CONTENT);
    let handle = download.headers["x-terraform-get"].to_str().unwrap().to_string();

    let artifact = app.get(&handle_request_uri(&handle)).await;
    assert_eq!(artifact.status, StatusCode::OK);
    assert_eq!(artifact.body, b"archive 1.0.0");
}

#[tokio::test]
async fn test_handle_redeems_versions_with_reserved_characters() {
    let app = TestApp::new().await;
    seed(&app, &["1.0#hotfix", "1.0%41", "1.0?rc"]).await;

    for (version, escaped) in [
        ("1.0#hotfix", "1.0%23hotfix"),
        ("1.0%41", "1.0%2541"),
        ("1.0?rc", "1.0%3Frc"),
    ] {
        let download = app
            .get(&format!("/v1/modules/acme/widget/aws/{}/download", escaped))
            .await;
        assert_eq!(download.status, StatusCode::NO_CONTENT, "version {}", version);
        let handle = download.headers["x-terraform-get"].to_str().unwrap().to_string();
        assert!(!handle.contains('#'), "handle {} has a fragment", handle);

        let artifact = app.get(&handle_request_uri(&handle)).await;
        assert_eq!(artifact.status, StatusCode::OK, "handle {}", handle);
        assert_eq!(artifact.body, format!("archive {}", version).into_bytes());
    }
}

#[tokio::test]
async fn test_tampered_handle_is_forbidden() {
    let app = TestApp::new().await;
    seed(&app, &["1.0.0", "2.0.0"]).await;

    let download = app.get("/v1/modules/acme/widget/aws/1.0.0/download").await;
    let handle = download.headers["x-terraform-get"].to_str().unwrap().to_string();
    let uri = handle_request_uri(&handle);

    // Same signature, different artifact
    let swapped = uri.replace("1.0.0.zip", "2.0.0.zip");
    assert_eq!(app.get(&swapped).await.status, StatusCode::FORBIDDEN);

    let unsigned = uri.split('?').next().unwrap().to_string();
    assert_eq!(app.get(&unsigned).await.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_expired_handle_is_forbidden() {
    let app = TestApp::new().await;
    seed(&app, &["1.0.0"]).await;

    let signer = HandleSigner::new(HANDLE_KEY, PUBLIC_URL).unwrap();
    let key = ArtifactKey::parse("acme/widget/aws/1.0.0.zip").unwrap();
    let expired = signer
        .sign(&key, 3600, Utc::now() - Duration::hours(2))
        .unwrap();

    let response = app.get(&handle_request_uri(&expired.url)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unsupported_operations_answer_not_implemented() {
    let app = TestApp::new().await;
    seed(&app, &["1.0.0"]).await;

    let response = app.get("/v1/modules/acme/widget/aws/1.0.0").await;
    assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Not implemented: GetSpecificModule");
    assert_eq!(body["pathParameters"]["version"], "1.0.0");

    let search = app.get("/v1/modules/search?q=vpc").await;
    assert_eq!(search.status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(
        search.json::<serde_json::Value>()["queryStringParameters"]["q"],
        "vpc"
    );
}

#[tokio::test]
async fn test_import_echo() {
    let app = TestApp::new().await;
    let response = app.get("/import/acme/widget/v1.4.2").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json::<serde_json::Value>(),
        serde_json::json!({"modulepath": "acme/widget/aws", "versions": ["v1.4.2"]})
    );
}

#[tokio::test]
async fn test_request_id_header() {
    let app = TestApp::new().await;
    let response = app.get("/health").await;
    assert!(response.headers.contains_key("x-request-id"));
}
