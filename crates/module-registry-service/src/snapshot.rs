//! Snapshot retrieval
//!
//! Fetches one ref of one repository as a shallow, single-branch clone into a
//! fresh destination directory, using the `git` command-line client.

use async_trait::async_trait;
use module_registry_db::SecretStore;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{ServiceError, ServiceResult};

/// Default source host
pub const DEFAULT_SOURCE_HOST: &str = "https://github.com";

/// Default limit for one retrieval (5 minutes)
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Secret key prefix of per-organization access tokens
pub const ACCESS_TOKEN_KEY_PREFIX: &str = "access_token";

/// A retrieved source tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Root directory of the working tree
    pub root: PathBuf,
    /// The ref that was checked out
    pub git_ref: String,
}

/// Source of snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Retrieve `git_ref` of `organization/repository` into `destination`
    ///
    /// `destination` must not exist yet; it is created by the call.
    async fn fetch(
        &self,
        organization: &str,
        repository: &str,
        git_ref: &str,
        destination: &Path,
    ) -> ServiceResult<Snapshot>;
}

/// Retrieves snapshots with `git clone --depth 1 --single-branch`
#[derive(Clone)]
pub struct GitSnapshotRetriever {
    host: Url,
    secrets: Arc<dyn SecretStore>,
    timeout: Duration,
}

impl GitSnapshotRetriever {
    /// Create a retriever for repositories under `host`
    pub fn new(host: &str, secrets: Arc<dyn SecretStore>) -> ServiceResult<Self> {
        let mut host = Url::parse(host)
            .map_err(|e| ServiceError::Internal(format!("invalid source host '{}': {}", host, e)))?;
        if !host.path().ends_with('/') {
            let path = format!("{}/", host.path());
            host.set_path(&path);
        }
        Ok(Self {
            host,
            secrets,
            timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }

    /// Set the retrieval time limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Clone URL for a repository, with the access token as userinfo if given
    pub fn clone_url(
        &self,
        organization: &str,
        repository: &str,
        token: Option<&str>,
    ) -> ServiceResult<Url> {
        let mut url = self
            .host
            .join(&format!("{}/{}.git", organization, repository))
            .map_err(|e| ServiceError::Fetch(format!("invalid repository path: {}", e)))?;

        if let Some(token) = token {
            if url.set_username(token).is_err() {
                warn!(
                    "Source host {} does not accept credentials; fetching anonymously",
                    self.host
                );
            }
        }
        Ok(url)
    }

    async fn access_token(&self, organization: &str) -> Option<String> {
        let key = format!("{}/{}", ACCESS_TOKEN_KEY_PREFIX, organization);
        match self.secrets.get_secret(&key).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Could not read access token for {}: {}", organization, e);
                None
            }
        }
    }
}

#[async_trait]
impl SnapshotSource for GitSnapshotRetriever {
    #[instrument(skip(self, destination))]
    async fn fetch(
        &self,
        organization: &str,
        repository: &str,
        git_ref: &str,
        destination: &Path,
    ) -> ServiceResult<Snapshot> {
        if destination.exists() {
            return Err(ServiceError::Internal(format!(
                "snapshot destination {} already exists",
                destination.display()
            )));
        }

        let token = self.access_token(organization).await;
        debug!(authenticated = token.is_some(), "Resolved source credentials");
        let url = self.clone_url(organization, repository, token.as_deref())?;

        let mut command = Command::new("git");
        command
            .arg("clone")
            .args(["--depth", "1", "--single-branch", "--quiet"])
            .arg("--branch")
            .arg(git_ref)
            .arg("--")
            .arg(url.as_str())
            .arg(destination)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ServiceError::Fetch(format!("failed to run git: {}", e))),
            Err(_) => {
                return Err(ServiceError::Timeout(format!(
                    "retrieval of {}/{}@{} exceeded {} seconds",
                    organization,
                    repository,
                    git_ref,
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::Fetch(redact(stderr.trim(), token.as_deref())));
        }

        info!("Retrieved {}/{}@{}", organization, repository, git_ref);
        Ok(Snapshot {
            root: destination.to_path_buf(),
            git_ref: git_ref.to_string(),
        })
    }
}

// git echoes the remote URL in some errors
fn redact(message: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => message.replace(token, "***"),
        None => message.to_string(),
    }
}
