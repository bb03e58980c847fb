//! Ingestion orchestration
//!
//! Drives one webhook delivery through
//! `Received → Verified → Fetched → Packaged → Uploaded → Registered`.
//! Any failing step ends in `Failed` and nothing is retried here: the sender
//! redelivers on a non-2xx response, and every write is a keyed overwrite, so
//! replaying a delivery is safe.
//!
//! The artifact is uploaded before the version record is written. A crash in
//! between leaves an unreferenced blob, never a record pointing at nothing.

use async_trait::async_trait;
use module_registry_core::{ArtifactKey, TagPushEvent, VersionRecord};
use module_registry_db::{BlobStore, VersionRepository};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::dto::IngestionReport;
use crate::error::{ServiceError, ServiceResult};
use crate::packager::ArtifactPackager;
use crate::signature::SignatureVerifier;
use crate::snapshot::SnapshotSource;

/// Default provider segment of every coordinate
pub const DEFAULT_PROVIDER: &str = "aws";

/// Progress of one ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum IngestionState {
    /// Delivery accepted for processing
    Received,
    /// Signature checked
    Verified,
    /// Snapshot retrieved
    Fetched,
    /// Archive built
    Packaged,
    /// Archive stored
    Uploaded,
    /// Version recorded (terminal success)
    Registered,
    /// Terminal failure with the reason
    Failed(String),
}

impl IngestionState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestionState::Registered | IngestionState::Failed(_))
    }
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestionState::Received => write!(f, "received"),
            IngestionState::Verified => write!(f, "verified"),
            IngestionState::Fetched => write!(f, "fetched"),
            IngestionState::Packaged => write!(f, "packaged"),
            IngestionState::Uploaded => write!(f, "uploaded"),
            IngestionState::Registered => write!(f, "registered"),
            IngestionState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Trait for webhook ingestion
#[async_trait]
pub trait IngestionService: Send + Sync {
    /// Process one delivery: the signature header value and the raw body
    async fn ingest(&self, signature: Option<&str>, body: &[u8]) -> ServiceResult<IngestionReport>;
}

/// Fixed settings of the ingestion pipeline
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    /// Provider segment of every coordinate
    pub provider: String,
    /// Parent directory for scratch workspaces; the system temp dir if unset
    pub scratch_root: Option<PathBuf>,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            scratch_root: None,
        }
    }
}

/// Default implementation of IngestionService
pub struct DefaultIngestionService {
    verifier: SignatureVerifier,
    snapshots: Arc<dyn SnapshotSource>,
    packager: ArtifactPackager,
    blobs: Arc<dyn BlobStore>,
    versions: Arc<dyn VersionRepository>,
    settings: IngestionSettings,
}

impl DefaultIngestionService {
    /// Create a new ingestion service
    pub fn new(
        verifier: SignatureVerifier,
        snapshots: Arc<dyn SnapshotSource>,
        packager: ArtifactPackager,
        blobs: Arc<dyn BlobStore>,
        versions: Arc<dyn VersionRepository>,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            verifier,
            snapshots,
            packager,
            blobs,
            versions,
            settings,
        }
    }

    fn scratch_dir(&self) -> ServiceResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ingest-");
        let scratch = match &self.settings.scratch_root {
            Some(root) => std::fs::create_dir_all(root).and_then(|_| builder.tempdir_in(root)),
            None => builder.tempdir(),
        };
        scratch.map_err(|e| ServiceError::Internal(format!("cannot create scratch workspace: {}", e)))
    }

    async fn run(
        &self,
        signature: Option<&str>,
        body: &[u8],
        state: &mut IngestionState,
    ) -> ServiceResult<IngestionReport> {
        self.verifier.verify(signature, body).await?;
        advance(state, IngestionState::Verified);

        let event = TagPushEvent::parse(body)?;
        if !event.is_tag_creation() {
            return Err(ServiceError::BadRequest("Not a new tag event".to_string()));
        }
        let tag = event.tag()?.to_string();
        let coordinate = event.coordinate(&self.settings.provider)?;
        let version = event.version()?;
        let key = ArtifactKey::for_version(&coordinate, &version)?;
        debug!(module = %coordinate, %version, "Accepted tag event for {}", tag);

        // Dropped on every exit path below
        let scratch = self.scratch_dir()?;
        let checkout = scratch.path().join("checkout");

        let snapshot = self
            .snapshots
            .fetch(&coordinate.organization, &coordinate.repository, &tag, &checkout)
            .await?;
        advance(state, IngestionState::Fetched);

        let artifact = self.packager.package(snapshot.root).await?;
        advance(state, IngestionState::Packaged);

        let size_bytes = artifact.bytes.len();
        self.blobs
            .put(&key, artifact.bytes)
            .await
            .map_err(|e| ServiceError::Upload(e.to_string()))?;
        advance(state, IngestionState::Uploaded);

        let record = self
            .versions
            .put(VersionRecord::new(coordinate, version, key.as_str()))
            .await
            .map_err(|e| ServiceError::Registry(e.to_string()))?;
        advance(state, IngestionState::Registered);

        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch workspace: {}", e);
        }

        Ok(IngestionReport {
            module: record.coordinate.id(),
            version: record.version.to_string(),
            artifact_key: key.to_string(),
            entries: artifact.entries.len(),
            size_bytes,
            state: state.clone(),
            registered_at: record.created_at,
        })
    }
}

fn advance(state: &mut IngestionState, next: IngestionState) {
    debug!("Ingestion {} -> {}", state, next);
    *state = next;
}

#[async_trait]
impl IngestionService for DefaultIngestionService {
    #[instrument(skip(self, signature, body), fields(body_len = body.len()))]
    async fn ingest(&self, signature: Option<&str>, body: &[u8]) -> ServiceResult<IngestionReport> {
        let mut state = IngestionState::Received;

        match self.run(signature, body, &mut state).await {
            Ok(report) => {
                info!(
                    module = %report.module,
                    version = %report.version,
                    key = %report.artifact_key,
                    "Ingestion registered"
                );
                Ok(report)
            }
            Err(err) => {
                let reached = state.clone();
                advance(&mut state, IngestionState::Failed(err.kind().to_string()));
                warn!(
                    reached = %reached,
                    kind = err.kind(),
                    "Ingestion failed: {}",
                    err
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{compute_signature, WEBHOOK_SECRET_KEY};
    use crate::snapshot::Snapshot;
    use mockall::mock;
    use module_registry_core::{ModuleCoordinate, RetrievalHandle, Version};
    use module_registry_db::{
        DbError, DbResult, HandleSigner, InMemoryBlobStore, InMemoryVersionRepository,
        StaticSecretStore,
    };
    use std::path::Path;

    const SECRET: &str = "s3cr3t";
    const TAG_EVENT: &[u8] =
        br#"{"ref_type":"tag","ref":"v2.0.0","repository":{"full_name":"acme/widget"}}"#;

    mock! {
        pub Source {}

        #[async_trait]
        impl SnapshotSource for Source {
            async fn fetch(
                &self,
                organization: &str,
                repository: &str,
                git_ref: &str,
                destination: &Path,
            ) -> ServiceResult<Snapshot>;
        }
    }

    mock! {
        pub Blobs {}

        #[async_trait]
        impl BlobStore for Blobs {
            async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> DbResult<()>;
            async fn get(&self, key: &ArtifactKey) -> DbResult<Vec<u8>>;
            async fn exists(&self, key: &ArtifactKey) -> DbResult<bool>;
            fn signer(&self) -> &HandleSigner;
            fn presign(&self, key: &ArtifactKey, ttl_secs: i64) -> DbResult<RetrievalHandle>;
            async fn open_signed(
                &self,
                key: &ArtifactKey,
                expires: i64,
                signature: &str,
            ) -> DbResult<Vec<u8>>;
        }
    }

    fn signer() -> HandleSigner {
        HandleSigner::new(b"handles", "http://localhost:8080").unwrap()
    }

    fn working_source() -> MockSource {
        let mut source = MockSource::new();
        source
            .expect_fetch()
            .returning(|_, _, git_ref, destination| {
                std::fs::create_dir_all(destination.join("modules")).unwrap();
                std::fs::write(destination.join("main.tf"), "resource {}").unwrap();
                std::fs::write(destination.join("modules/vars.tf"), "variable {}").unwrap();
                std::fs::create_dir_all(destination.join(".git")).unwrap();
                std::fs::write(destination.join(".git/HEAD"), "ref").unwrap();
                Ok(Snapshot {
                    root: destination.to_path_buf(),
                    git_ref: git_ref.to_string(),
                })
            });
        source
    }

    fn service(
        source: MockSource,
        blobs: Arc<dyn BlobStore>,
        versions: Arc<dyn VersionRepository>,
    ) -> DefaultIngestionService {
        let secrets = StaticSecretStore::new().with_secret(WEBHOOK_SECRET_KEY, SECRET);
        DefaultIngestionService::new(
            SignatureVerifier::new(Arc::new(secrets)),
            Arc::new(source),
            ArtifactPackager::default(),
            blobs,
            versions,
            IngestionSettings::default(),
        )
    }

    fn sign(body: &[u8]) -> String {
        compute_signature(SECRET.as_bytes(), body)
    }

    fn coordinate() -> ModuleCoordinate {
        ModuleCoordinate::new("acme", "widget", "aws").unwrap()
    }

    #[tokio::test]
    async fn test_ingest_registers_version() {
        let blobs = Arc::new(InMemoryBlobStore::new(signer()));
        let versions = Arc::new(InMemoryVersionRepository::new());
        let service = service(working_source(), blobs.clone(), versions.clone());

        let report = service
            .ingest(Some(&sign(TAG_EVENT)), TAG_EVENT)
            .await
            .unwrap();

        assert_eq!(report.state, IngestionState::Registered);
        assert_eq!(report.module, "acme/widget/aws");
        assert_eq!(report.version, "2.0.0");
        assert_eq!(report.artifact_key, "acme/widget/aws/2.0.0.zip");
        assert_eq!(report.entries, 2);

        let record = versions
            .get(&coordinate(), &Version::new("2.0.0"))
            .await
            .unwrap();
        assert_eq!(record.artifact_location, "acme/widget/aws/2.0.0.zip");
        assert_eq!(blobs.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_idempotent() {
        let blobs = Arc::new(InMemoryBlobStore::new(signer()));
        let versions = Arc::new(InMemoryVersionRepository::new());
        let service = service(working_source(), blobs.clone(), versions.clone());

        let first = service.ingest(Some(&sign(TAG_EVENT)), TAG_EVENT).await.unwrap();
        let second = service.ingest(Some(&sign(TAG_EVENT)), TAG_EVENT).await.unwrap();

        assert_eq!(first.state, second.state);
        assert_eq!(first.registered_at, second.registered_at);
        assert_eq!(versions.list_versions(&coordinate()).await.unwrap().len(), 1);
        assert_eq!(blobs.len().await, 1);
    }

    #[tokio::test]
    async fn test_bad_signature_has_no_side_effects() {
        let mut source = MockSource::new();
        source.expect_fetch().never();
        let blobs = Arc::new(InMemoryBlobStore::new(signer()));
        let versions = Arc::new(InMemoryVersionRepository::new());
        let service = service(source, blobs.clone(), versions.clone());

        let err = service
            .ingest(Some("sha1=0000"), TAG_EVENT)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Authentication(_)));
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_non_tag_event_is_bad_request() {
        let mut source = MockSource::new();
        source.expect_fetch().never();
        let service = service(
            source,
            Arc::new(InMemoryBlobStore::new(signer())),
            Arc::new(InMemoryVersionRepository::new()),
        );

        let body = br#"{"ref_type":"branch","ref":"main","repository":{"full_name":"acme/widget"}}"#;
        let err = service.ingest(Some(&sign(body)), body).await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));

        let body = b"{not json";
        let err = service.ingest(Some(&sign(body)), body).await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_nothing() {
        let mut source = MockSource::new();
        source
            .expect_fetch()
            .returning(|_, _, _, _| Err(ServiceError::Fetch("Remote branch v2.0.0 not found".to_string())));
        let blobs = Arc::new(InMemoryBlobStore::new(signer()));
        let versions = Arc::new(InMemoryVersionRepository::new());
        let service = service(source, blobs.clone(), versions.clone());

        let err = service.ingest(Some(&sign(TAG_EVENT)), TAG_EVENT).await.unwrap_err();
        assert!(matches!(err, ServiceError::Fetch(_)));
        assert!(err.is_redeliverable());
        assert!(blobs.is_empty().await);
        assert!(versions.list_versions(&coordinate()).await.is_err());
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_no_record() {
        let mut blobs = MockBlobs::new();
        blobs
            .expect_put()
            .times(1)
            .returning(|_, _| Err(DbError::Blob("disk full".to_string())));
        let versions = Arc::new(InMemoryVersionRepository::new());
        let service = service(working_source(), Arc::new(blobs), versions.clone());

        let err = service.ingest(Some(&sign(TAG_EVENT)), TAG_EVENT).await.unwrap_err();
        assert!(matches!(err, ServiceError::Upload(_)));
        assert!(versions.list_versions(&coordinate()).await.is_err());
    }

    #[tokio::test]
    async fn test_scratch_workspace_removed() {
        let scratch_root = tempfile::TempDir::new().unwrap();
        let secrets = StaticSecretStore::new().with_secret(WEBHOOK_SECRET_KEY, SECRET);
        let service = DefaultIngestionService::new(
            SignatureVerifier::new(Arc::new(secrets)),
            Arc::new(working_source()),
            ArtifactPackager::default(),
            Arc::new(InMemoryBlobStore::new(signer())),
            Arc::new(InMemoryVersionRepository::new()),
            IngestionSettings {
                provider: "aws".to_string(),
                scratch_root: Some(scratch_root.path().to_path_buf()),
            },
        );

        service.ingest(Some(&sign(TAG_EVENT)), TAG_EVENT).await.unwrap();
        assert_eq!(std::fs::read_dir(scratch_root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_state_display_and_terminal() {
        assert_eq!(IngestionState::Packaged.to_string(), "packaged");
        assert!(IngestionState::Registered.is_terminal());
        assert!(IngestionState::Failed("fetch".to_string()).is_terminal());
        assert!(!IngestionState::Uploaded.is_terminal());
    }
}
