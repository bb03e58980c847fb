//! Common test utilities and helpers
//!
//! Builds the full router over in-memory stores, with a local bare git
//! repository standing in for the source host.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use module_registry_api::build_api_server;
use module_registry_db::{
    HandleSigner, InMemoryBlobStore, InMemoryVersionRepository, SecretStore, StaticSecretStore,
};
use module_registry_service::{
    signature::compute_signature, ArtifactPackager, Collaborators, GitSnapshotRetriever,
    IngestionSettings, ServiceRegistry, SIGNATURE_HEADER, WEBHOOK_SECRET_KEY,
};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Webhook secret shared with the test sender
pub const WEBHOOK_SECRET: &str = "integration-secret";

/// Handle signing key of the test blob store
pub const HANDLE_KEY: &[u8] = b"integration-handles";

/// Public base URL of the test registry
pub const PUBLIC_URL: &str = "http://registry.test";

/// Tag pushed to the test repository
pub const TAG: &str = "v2.0.0";

/// Test application state
pub struct TestApp {
    pub router: Router,
    pub versions: Arc<InMemoryVersionRepository>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub scratch_root: std::path::PathBuf,
    _dir: TempDir,
}

/// A buffered response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }
}

impl TestApp {
    /// Create a test application whose source host serves `acme/widget`
    /// tagged [`TAG`]
    ///
    /// Returns `None` when `git` is not installed.
    pub async fn with_repository() -> Option<Self> {
        if !git_available() {
            eprintln!("git not found on PATH; skipping");
            return None;
        }
        let dir = TempDir::new().expect("Failed to create temp dir");
        create_source_repository(dir.path());
        Some(Self::build(dir))
    }

    /// Create a test application with an empty source host
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("host")).expect("Failed to create host dir");
        Self::build(dir)
    }

    fn build(dir: TempDir) -> Self {
        let host = format!("file://{}/", dir.path().join("host").display());
        let scratch_root = dir.path().join("scratch");

        let secrets: Arc<dyn SecretStore> =
            Arc::new(StaticSecretStore::new().with_secret(WEBHOOK_SECRET_KEY, WEBHOOK_SECRET));
        let versions = Arc::new(InMemoryVersionRepository::new());
        let blobs = Arc::new(InMemoryBlobStore::new(
            HandleSigner::new(HANDLE_KEY, PUBLIC_URL).expect("Failed to create signer"),
        ));
        let snapshots =
            GitSnapshotRetriever::new(&host, secrets.clone()).expect("Invalid source host");

        let collaborators = Collaborators {
            versions: versions.clone(),
            blobs: blobs.clone(),
            secrets,
            snapshots: Arc::new(snapshots),
            packager: ArtifactPackager::default(),
            debug: true,
        };
        let settings = IngestionSettings {
            scratch_root: Some(scratch_root.clone()),
            ..IngestionSettings::default()
        };

        let services = ServiceRegistry::new(collaborators, settings);

        Self {
            router: build_api_server(services, true),
            versions,
            blobs,
            scratch_root,
            _dir: dir,
        }
    }

    /// Send a request through the router
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// GET a path
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("Invalid request"),
        )
        .await
    }

    /// Deliver a webhook, signed with `secret` when given
    pub async fn deliver(&self, body: &str, secret: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(
                SIGNATURE_HEADER,
                compute_signature(secret.as_bytes(), body.as_bytes()),
            );
        }
        self.request(builder.body(Body::from(body.to_string())).expect("Invalid request"))
            .await
    }

    /// Deliver a correctly signed webhook
    pub async fn deliver_signed(&self, body: &str) -> TestResponse {
        self.deliver(body, Some(WEBHOOK_SECRET)).await
    }

    /// Number of scratch workspaces left behind
    pub fn leftover_scratch(&self) -> usize {
        fs::read_dir(&self.scratch_root)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// A tag-creation event for `full_name` at `tag`
pub fn tag_event(full_name: &str, tag: &str) -> String {
    serde_json::json!({
        "ref": tag,
        "ref_type": "tag",
        "repository": { "full_name": full_name }
    })
    .to_string()
}

/// Split a retrieval handle into the request path and query
pub fn handle_request_uri(handle: &str) -> String {
    let url = url::Url::parse(handle).expect("Handle is not a URL");
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Whether the `git` CLI can be run
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=Registry Tests",
            "-c",
            "user.email=tests@registry.test",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("Failed to run git");
    assert!(status.success(), "git {:?} failed", args);
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("No parent")).expect("Failed to create dir");
    fs::write(path, contents).expect("Failed to write file");
}

/// Create `{root}/host/acme/widget.git` with one commit tagged [`TAG`]
fn create_source_repository(root: &Path) {
    let work = root.join("work");
    write(&work, "main.tf", "resource \"null_resource\" \"widget\" {}\n");
    write(&work, "variables.tf", "variable \"name\" {}\n");
    write(&work, "modules/net/vpc.tf", "resource \"aws_vpc\" \"main\" {}\n");
    write(&work, "README.md", "# widget\n");
    write(&work, "docs/usage.txt", "usage\n");
    write(&work, ".github/workflows/ci.yml", "on: push\n");
    write(&work, ".tfignore", "*.md\ndocs/\n");

    git(&work, &["init", "--quiet"]);
    git(&work, &["add", "--all"]);
    git(&work, &["commit", "--quiet", "-m", "Initial module"]);
    git(&work, &["tag", TAG]);

    let host = root.join("host").join("acme");
    fs::create_dir_all(&host).expect("Failed to create host dir");
    git(
        root,
        &[
            "clone",
            "--quiet",
            "--bare",
            work.to_str().expect("Non UTF-8 path"),
            host.join("widget.git").to_str().expect("Non UTF-8 path"),
        ],
    );
}
