//! Version registry abstraction
//!
//! This module defines the VersionRepository trait that abstracts persistence
//! of version records, allowing for different implementations (PostgreSQL,
//! in-memory).

use async_trait::async_trait;
use module_registry_core::{ModuleCoordinate, Version, VersionRecord};

use crate::error::DbResult;

/// Repository trait for version record persistence
///
/// Records are keyed by (coordinate, version). Implementations must be
/// thread-safe (Send + Sync) for use in async contexts.
#[async_trait]
pub trait VersionRepository: Send + Sync {
    /// Insert or replace the record for its coordinate and version
    ///
    /// Replacing keeps the original `created_at` and updates the artifact
    /// location.
    ///
    /// # Returns
    /// * `Ok(VersionRecord)` - The record as stored
    /// * `Err(DbError)` - For storage errors
    async fn put(&self, record: VersionRecord) -> DbResult<VersionRecord>;

    /// List every version of a module, sorted descending by version string
    ///
    /// # Returns
    /// * `Ok(Vec<VersionRecord>)` - At least one record
    /// * `Err(DbError::NotFound)` - If the coordinate has no versions
    async fn list_versions(&self, coordinate: &ModuleCoordinate) -> DbResult<Vec<VersionRecord>>;

    /// Fetch one record
    ///
    /// # Returns
    /// * `Ok(VersionRecord)` - The record if found
    /// * `Err(DbError::NotFound)` - If the version was never registered
    async fn get(&self, coordinate: &ModuleCoordinate, version: &Version)
        -> DbResult<VersionRecord>;

    /// Health check - verify repository is operational
    async fn health_check(&self) -> DbResult<()>;
}
