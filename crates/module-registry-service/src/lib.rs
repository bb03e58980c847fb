//! Service layer for the module registry
//!
//! This crate sits between the HTTP layer and the persistence layer and holds
//! the ingestion pipeline and the read path:
//!
//! - **SignatureVerifier**: webhook HMAC check, failing closed
//! - **GitSnapshotRetriever**: shallow single-branch retrieval of one ref
//! - **ArtifactPackager**: exclusion-filtered zip packaging
//! - **IngestionService**: the verify → fetch → package → upload → register
//!   pipeline
//! - **RetrievalService**: version listings and signed download handles
//!
//! # Example
//!
//! ```rust,no_run
//! use module_registry_service::{Collaborators, IngestionSettings, ServiceRegistry};
//!
//! # fn example(collaborators: Collaborators) {
//! let services = ServiceRegistry::new(collaborators, IngestionSettings::default());
//! # }
//! ```

pub mod dto;
pub mod error;
pub mod ingestion;
pub mod packager;
pub mod retrieval;
pub mod signature;
pub mod snapshot;

// Re-export main types for convenience
pub use dto::*;
pub use error::{ServiceError, ServiceResult};

pub use ingestion::{
    DefaultIngestionService, IngestionService, IngestionSettings, IngestionState, DEFAULT_PROVIDER,
};
pub use packager::{ArtifactPackager, PackagedArtifact};
pub use retrieval::{DefaultRetrievalService, RetrievalService};
pub use signature::{SignatureVerifier, SIGNATURE_HEADER, WEBHOOK_SECRET_KEY};
pub use snapshot::{GitSnapshotRetriever, Snapshot, SnapshotSource};

use module_registry_db::{BlobStore, DbResult, SecretStore, VersionRepository};
use std::sync::Arc;

/// Long-lived clients the services are built from
///
/// Constructed once at startup and shared by every request.
#[derive(Clone)]
pub struct Collaborators {
    /// Version registry
    pub versions: Arc<dyn VersionRepository>,
    /// Artifact blob store
    pub blobs: Arc<dyn BlobStore>,
    /// Secret store
    pub secrets: Arc<dyn SecretStore>,
    /// Snapshot source
    pub snapshots: Arc<dyn SnapshotSource>,
    /// Packaging limits
    pub packager: ArtifactPackager,
    /// Log signature mismatches in detail
    pub debug: bool,
}

/// Service registry that holds all service instances
#[derive(Clone)]
pub struct ServiceRegistry {
    /// Ingestion service
    pub ingestion: Arc<dyn IngestionService>,
    /// Retrieval service
    pub retrieval: Arc<dyn RetrievalService>,
    versions: Arc<dyn VersionRepository>,
}

impl ServiceRegistry {
    /// Create a new service registry with default implementations
    pub fn new(collaborators: Collaborators, settings: IngestionSettings) -> Self {
        let verifier =
            SignatureVerifier::new(collaborators.secrets.clone()).with_debug(collaborators.debug);

        let retrieval = Arc::new(DefaultRetrievalService::new(
            collaborators.versions.clone(),
            collaborators.blobs.clone(),
            settings.provider.clone(),
        ));

        let ingestion = Arc::new(DefaultIngestionService::new(
            verifier,
            collaborators.snapshots,
            collaborators.packager,
            collaborators.blobs,
            collaborators.versions.clone(),
            settings,
        ));

        Self {
            ingestion,
            retrieval,
            versions: collaborators.versions,
        }
    }

    /// Create a service registry with custom implementations
    pub fn with_services(
        ingestion: Arc<dyn IngestionService>,
        retrieval: Arc<dyn RetrievalService>,
        versions: Arc<dyn VersionRepository>,
    ) -> Self {
        Self {
            ingestion,
            retrieval,
            versions,
        }
    }

    /// Get the ingestion service
    pub fn ingestion(&self) -> &Arc<dyn IngestionService> {
        &self.ingestion
    }

    /// Get the retrieval service
    pub fn retrieval(&self) -> &Arc<dyn RetrievalService> {
        &self.retrieval
    }

    /// Probe the version registry
    pub async fn health_check(&self) -> DbResult<()> {
        self.versions.health_check().await
    }
}
