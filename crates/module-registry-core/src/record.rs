//! Version records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinate::ModuleCoordinate;
use crate::version::Version;

/// One registered version of a module
///
/// Records are written only by the version registry, once per successful
/// ingestion. Re-registering the same coordinate and version replaces the
/// artifact location; `created_at` keeps the first registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Module the version belongs to
    pub coordinate: ModuleCoordinate,
    /// Version string
    pub version: Version,
    /// Blob store key of the packaged artifact
    pub artifact_location: String,
    /// When the version was first registered
    pub created_at: DateTime<Utc>,
}

impl VersionRecord {
    /// Create a new record stamped with the current time
    pub fn new(
        coordinate: ModuleCoordinate,
        version: Version,
        artifact_location: impl Into<String>,
    ) -> Self {
        Self {
            coordinate,
            version,
            artifact_location: artifact_location.into(),
            created_at: Utc::now(),
        }
    }
}
