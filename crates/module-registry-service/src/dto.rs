//! Data Transfer Objects (DTOs) for service layer
//!
//! This module defines the transport-facing shapes returned by the ingestion
//! and retrieval services.

use chrono::{DateTime, Utc};
use module_registry_core::VersionRecord;
use serde::{Deserialize, Serialize};

use crate::ingestion::IngestionState;

// ============================================================================
// Retrieval DTOs
// ============================================================================

/// Body of the list-versions response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersionsResponse {
    /// Always exactly one module
    pub modules: Vec<ModuleVersions>,
}

/// Versions of one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersions {
    /// `organization/repository/provider`
    pub source: String,
    /// Registered versions, most recent first
    pub versions: Vec<VersionEntry>,
}

/// One version in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Version string
    pub version: String,
}

impl ModuleVersionsResponse {
    /// Build the listing for one module from its records
    pub fn from_records(source: String, records: &[VersionRecord]) -> Self {
        let versions = records
            .iter()
            .map(|record| VersionEntry {
                version: record.version.to_string(),
            })
            .collect();
        Self {
            modules: vec![ModuleVersions { source, versions }],
        }
    }
}

/// Body of the import echo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResponse {
    /// `organization/repository/provider`
    pub modulepath: String,
    /// The requested ref
    pub versions: Vec<String>,
}

// ============================================================================
// Ingestion DTOs
// ============================================================================

/// Outcome of one successful ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    /// `organization/repository/provider`
    pub module: String,
    /// Registered version
    pub version: String,
    /// Blob store key of the artifact
    pub artifact_key: String,
    /// Number of files in the archive
    pub entries: usize,
    /// Archive size in bytes
    pub size_bytes: usize,
    /// Terminal state
    pub state: IngestionState,
    /// When the version record was first created
    pub registered_at: DateTime<Utc>,
}
