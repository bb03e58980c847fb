//! In-memory implementation of VersionRepository
//!
//! Used when no database is configured and in tests. Records live for the
//! lifetime of the process.

use async_trait::async_trait;
use module_registry_core::{ModuleCoordinate, Version, VersionRecord};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{DbError, DbResult};
use crate::repository::VersionRepository;

/// Version records keyed by coordinate id, then by version string
#[derive(Debug, Default)]
pub struct InMemoryVersionRepository {
    modules: RwLock<BTreeMap<String, BTreeMap<String, VersionRecord>>>,
}

impl InMemoryVersionRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionRepository for InMemoryVersionRepository {
    #[instrument(skip(self, record), fields(module = %record.coordinate, version = %record.version))]
    async fn put(&self, mut record: VersionRecord) -> DbResult<VersionRecord> {
        let mut modules = self.modules.write().await;
        let versions = modules.entry(record.coordinate.id()).or_default();

        if let Some(existing) = versions.get(record.version.as_str()) {
            debug!("Replacing existing version record");
            record.created_at = existing.created_at;
        }
        versions.insert(record.version.as_str().to_string(), record.clone());

        Ok(record)
    }

    #[instrument(skip(self), fields(module = %coordinate))]
    async fn list_versions(&self, coordinate: &ModuleCoordinate) -> DbResult<Vec<VersionRecord>> {
        let modules = self.modules.read().await;
        let records: Vec<VersionRecord> = modules
            .get(&coordinate.id())
            .map(|versions| versions.values().rev().cloned().collect())
            .unwrap_or_default();

        if records.is_empty() {
            return Err(DbError::NotFound(format!("module {}", coordinate)));
        }
        Ok(records)
    }

    #[instrument(skip(self), fields(module = %coordinate, version = %version))]
    async fn get(
        &self,
        coordinate: &ModuleCoordinate,
        version: &Version,
    ) -> DbResult<VersionRecord> {
        let modules = self.modules.read().await;
        modules
            .get(&coordinate.id())
            .and_then(|versions| versions.get(version.as_str()))
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("module {} version {}", coordinate, version)))
    }

    async fn health_check(&self) -> DbResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinate() -> ModuleCoordinate {
        ModuleCoordinate::new("acme", "widget", "aws").unwrap()
    }

    fn record(version: &str) -> VersionRecord {
        VersionRecord::new(
            coordinate(),
            Version::new(version),
            format!("acme/widget/aws/{}.zip", version),
        )
    }

    #[tokio::test]
    async fn test_list_descending() {
        let repo = InMemoryVersionRepository::new();
        for v in ["1.0.0", "2.0.0", "1.10.0"] {
            repo.put(record(v)).await.unwrap();
        }

        let versions: Vec<String> = repo
            .list_versions(&coordinate())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.version.to_string())
            .collect();
        assert_eq!(versions, vec!["2.0.0", "1.10.0", "1.0.0"]);
    }

    #[tokio::test]
    async fn test_unknown_module_is_not_found() {
        let repo = InMemoryVersionRepository::new();
        let err = repo.list_versions(&coordinate()).await.unwrap_err();
        assert!(err.is_not_found());

        let err = repo.get(&coordinate(), &Version::new("1.0.0")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_is_idempotent_per_key() {
        let repo = InMemoryVersionRepository::new();
        let first = repo.put(record("2.0.0")).await.unwrap();

        let mut replacement = record("2.0.0");
        replacement.artifact_location = "moved.zip".to_string();
        let stored = repo.put(replacement).await.unwrap();

        assert_eq!(stored.created_at, first.created_at);
        assert_eq!(repo.list_versions(&coordinate()).await.unwrap().len(), 1);
        let fetched = repo.get(&coordinate(), &Version::new("2.0.0")).await.unwrap();
        assert_eq!(fetched.artifact_location, "moved.zip");
    }

    #[tokio::test]
    async fn test_providers_are_distinct_modules() {
        let repo = InMemoryVersionRepository::new();
        repo.put(record("1.0.0")).await.unwrap();

        let other = ModuleCoordinate::new("acme", "widget", "gcp").unwrap();
        assert!(repo.list_versions(&other).await.is_err());
    }
}
