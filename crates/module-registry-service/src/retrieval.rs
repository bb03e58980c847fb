//! Read path: version listings, download handles and handle redemption

use async_trait::async_trait;
use module_registry_core::{ArtifactKey, ModuleCoordinate, RetrievalHandle, Version, HANDLE_TTL_SECS};
use module_registry_db::{BlobStore, DbError, VersionRepository};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::dto::{ImportResponse, ModuleVersionsResponse};
use crate::error::{ServiceError, ServiceResult};

/// Trait for read-only registry operations
#[async_trait]
pub trait RetrievalService: Send + Sync {
    /// List every version of a module, most recent first
    async fn list_versions(&self, coordinate: &ModuleCoordinate)
        -> ServiceResult<ModuleVersionsResponse>;

    /// Issue a one-hour retrieval handle for one version's artifact
    async fn resolve_download(
        &self,
        coordinate: &ModuleCoordinate,
        version: &Version,
    ) -> ServiceResult<RetrievalHandle>;

    /// Read the artifact a retrieval handle refers to
    async fn redeem(&self, key: &str, expires: i64, signature: &str) -> ServiceResult<Vec<u8>>;

    /// Describe the module path an import of `git_ref` would resolve to
    fn describe_import(&self, organization: &str, repository: &str, git_ref: &str)
        -> ImportResponse;
}

/// Default implementation of RetrievalService
pub struct DefaultRetrievalService {
    versions: Arc<dyn VersionRepository>,
    blobs: Arc<dyn BlobStore>,
    provider: String,
}

impl DefaultRetrievalService {
    /// Create a new retrieval service
    pub fn new(
        versions: Arc<dyn VersionRepository>,
        blobs: Arc<dyn BlobStore>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            versions,
            blobs,
            provider: provider.into(),
        }
    }
}

#[async_trait]
impl RetrievalService for DefaultRetrievalService {
    #[instrument(skip(self), fields(module = %coordinate))]
    async fn list_versions(
        &self,
        coordinate: &ModuleCoordinate,
    ) -> ServiceResult<ModuleVersionsResponse> {
        let records = self.versions.list_versions(coordinate).await.map_err(|e| match e {
            DbError::NotFound(_) => ServiceError::NotFound("No such module".to_string()),
            other => ServiceError::Registry(other.to_string()),
        })?;
        debug!(count = records.len(), "Listed versions");
        Ok(ModuleVersionsResponse::from_records(coordinate.id(), &records))
    }

    #[instrument(skip(self), fields(module = %coordinate, version = %version))]
    async fn resolve_download(
        &self,
        coordinate: &ModuleCoordinate,
        version: &Version,
    ) -> ServiceResult<RetrievalHandle> {
        let record = self.versions.get(coordinate, version).await.map_err(|e| match e {
            DbError::NotFound(_) => ServiceError::NotFound("No such module".to_string()),
            other => ServiceError::Registry(other.to_string()),
        })?;

        let key = ArtifactKey::parse(&record.artifact_location).map_err(|e| {
            ServiceError::Internal(format!("stored artifact location is invalid: {}", e))
        })?;
        let handle = self.blobs.presign(&key, HANDLE_TTL_SECS)?;
        debug!(expires_at = %handle.expires_at, "Issued retrieval handle");
        Ok(handle)
    }

    #[instrument(skip(self, signature))]
    async fn redeem(&self, key: &str, expires: i64, signature: &str) -> ServiceResult<Vec<u8>> {
        let key = ArtifactKey::parse(key)
            .map_err(|_| ServiceError::Forbidden("invalid retrieval handle".to_string()))?;
        Ok(self.blobs.open_signed(&key, expires, signature).await?)
    }

    fn describe_import(
        &self,
        organization: &str,
        repository: &str,
        git_ref: &str,
    ) -> ImportResponse {
        ImportResponse {
            modulepath: format!("{}/{}/{}", organization, repository, self.provider),
            versions: vec![git_ref.to_string()],
        }
    }
}
