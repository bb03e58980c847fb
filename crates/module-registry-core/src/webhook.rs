//! Inbound tag-push webhook payloads
//!
//! Only the fields the ingestion pipeline needs are modelled. All of them are
//! optional at the serde level so that a non-tag event (a ping, a branch
//! creation) is reported as "not a tag event" rather than as malformed JSON.

use serde::{Deserialize, Serialize};

use crate::coordinate::ModuleCoordinate;
use crate::error::{RegistryError, Result};
use crate::version::Version;

/// The change type that triggers ingestion
pub const TAG_REF_TYPE: &str = "tag";

/// Repository identifier carried by the event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// `organization/name`
    pub full_name: String,
}

/// Tag creation event as sent by the source host
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagPushEvent {
    /// Kind of ref that changed (`tag`, `branch`, ...)
    #[serde(default)]
    pub ref_type: Option<String>,

    /// The ref name, e.g. `v2.0.0`
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,

    /// The repository the ref belongs to
    #[serde(default)]
    pub repository: Option<RepositoryRef>,
}

impl TagPushEvent {
    /// Parse the raw request body
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| RegistryError::InvalidEvent(format!("malformed payload: {}", e)))
    }

    /// Whether the event reports a tag creation
    pub fn is_tag_creation(&self) -> bool {
        self.ref_type.as_deref() == Some(TAG_REF_TYPE)
    }

    /// The tag name
    pub fn tag(&self) -> Result<&str> {
        self.git_ref
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| RegistryError::InvalidEvent("missing ref".to_string()))
    }

    /// Version derived from the tag name
    pub fn version(&self) -> Result<Version> {
        self.tag().map(Version::from_ref)
    }

    /// Coordinate of the module this event belongs to
    pub fn coordinate(&self, provider: &str) -> Result<ModuleCoordinate> {
        let repository = self
            .repository
            .as_ref()
            .ok_or_else(|| RegistryError::InvalidEvent("missing repository".to_string()))?;
        ModuleCoordinate::from_full_name(&repository.full_name, provider)
            .map_err(|e| RegistryError::InvalidEvent(e.to_string()))
    }
}
