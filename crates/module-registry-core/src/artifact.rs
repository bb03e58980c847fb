//! Artifact keys and retrieval handles
//!
//! Artifacts are stored under a key derived only from the coordinate and the
//! version, so re-ingesting the same pair overwrites the same object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coordinate::{validate_segment, ModuleCoordinate};
use crate::error::{RegistryError, Result};
use crate::version::Version;

/// Validity window of a retrieval handle, in seconds (one hour)
pub const HANDLE_TTL_SECS: i64 = 3600;

/// File extension of packaged artifacts
pub const ARTIFACT_EXTENSION: &str = "zip";

/// Blob store key of one packaged module version,
/// `organization/repository/provider/version.zip`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Derive the key for a coordinate and version
    ///
    /// # Errors
    /// Returns an error if the version would escape its key segment.
    pub fn for_version(coordinate: &ModuleCoordinate, version: &Version) -> Result<Self> {
        coordinate.validate()?;
        validate_version(version.as_str())?;
        Ok(Self(format!(
            "{}/{}.{}",
            coordinate.id(),
            version,
            ARTIFACT_EXTENSION
        )))
    }

    /// Parse a stored key, checking it has the four-segment shape
    pub fn parse(key: &str) -> Result<Self> {
        let segments: Vec<&str> = key.split('/').collect();
        if segments.len() != 4 {
            return Err(RegistryError::InvalidArtifactKey(format!(
                "expected organization/repository/provider/version.{}, got '{}'",
                ARTIFACT_EXTENSION, key
            )));
        }
        let file = segments[3];
        let version = file
            .strip_suffix(&format!(".{}", ARTIFACT_EXTENSION))
            .ok_or_else(|| {
                RegistryError::InvalidArtifactKey(format!("'{}' is not a .zip key", key))
            })?;
        let coordinate = ModuleCoordinate::new(segments[0], segments[1], segments[2])
            .map_err(|e| RegistryError::InvalidArtifactKey(e.to_string()))?;
        Self::for_version(&coordinate, &Version::new(version))
    }

    /// Borrow the key string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// A version becomes one key segment, so it has the same constraints as a
// coordinate segment.
fn validate_version(version: &str) -> Result<()> {
    validate_segment("version", version)
        .map_err(|e| RegistryError::InvalidArtifactKey(e.to_string()))
}

/// Time-limited, read-only reference to one stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalHandle {
    /// URL that grants read access until `expires_at`
    pub url: String,
    /// End of the validity window
    pub expires_at: DateTime<Utc>,
}

impl RetrievalHandle {
    /// Whether the handle is still usable at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}
