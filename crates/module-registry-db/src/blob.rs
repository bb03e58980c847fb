//! Artifact blob storage
//!
//! Stores packaged module archives by artifact key and issues time-limited
//! retrieval handles for them. A write is all-or-nothing: readers see either
//! no object or the complete one.

use async_trait::async_trait;
use chrono::Utc;
use module_registry_core::{ArtifactKey, RetrievalHandle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::signer::HandleSigner;

/// Object store for packaged artifacts
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing object
    async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> DbResult<()>;

    /// Read the object stored under `key`
    ///
    /// # Errors
    /// `DbError::NotFound` if nothing is stored under `key`.
    async fn get(&self, key: &ArtifactKey) -> DbResult<Vec<u8>>;

    /// Whether an object is stored under `key`
    async fn exists(&self, key: &ArtifactKey) -> DbResult<bool>;

    /// Signer used for retrieval handles
    fn signer(&self) -> &HandleSigner;

    /// Issue a read-only handle for `key` valid for `ttl_secs`
    fn presign(&self, key: &ArtifactKey, ttl_secs: i64) -> DbResult<RetrievalHandle> {
        self.signer().sign(key, ttl_secs, Utc::now())
    }

    /// Read the object a presented handle refers to
    async fn open_signed(
        &self,
        key: &ArtifactKey,
        expires: i64,
        signature: &str,
    ) -> DbResult<Vec<u8>> {
        self.signer()
            .verify(key.as_str(), expires, signature, Utc::now())?;
        self.get(key).await
    }
}

/// Blob store backed by a local directory
///
/// Keys map to relative paths below the root. Writes go to a temporary file
/// in the destination directory and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileSystemBlobStore {
    root: PathBuf,
    signer: HandleSigner,
}

impl FileSystemBlobStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>, signer: HandleSigner) -> Self {
        Self {
            root: root.into(),
            signer,
        }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &ArtifactKey) -> PathBuf {
        key.as_str()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    #[instrument(skip(self, bytes), fields(key = %key, size = bytes.len()))]
    async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> DbResult<()> {
        let path = self.object_path(key);
        let parent = path
            .parent()
            .ok_or_else(|| DbError::Blob(format!("no parent directory for {}", key)))?;
        tokio::fs::create_dir_all(parent).await?;

        let staging = parent.join(format!(".{}.partial", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&staging, &bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!("Stored artifact at {}", path.display());
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &ArtifactKey) -> DbResult<Vec<u8>> {
        tokio::fs::read(self.object_path(key))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DbError::NotFound(format!("artifact {}", key)),
                _ => e.into(),
            })
    }

    async fn exists(&self, key: &ArtifactKey) -> DbResult<bool> {
        Ok(tokio::fs::try_exists(self.object_path(key)).await?)
    }

    fn signer(&self) -> &HandleSigner {
        &self.signer
    }
}

/// Blob store held in process memory
#[derive(Debug)]
pub struct InMemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    signer: HandleSigner,
}

impl InMemoryBlobStore {
    /// Create an empty store
    pub fn new(signer: HandleSigner) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            signer,
        }
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &ArtifactKey, bytes: Vec<u8>) -> DbResult<()> {
        self.objects
            .write()
            .await
            .insert(key.as_str().to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &ArtifactKey) -> DbResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("artifact {}", key)))
    }

    async fn exists(&self, key: &ArtifactKey) -> DbResult<bool> {
        Ok(self.objects.read().await.contains_key(key.as_str()))
    }

    fn signer(&self) -> &HandleSigner {
        &self.signer
    }
}
