//! Module versions derived from tag refs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version used when a ref carries no digits at all
pub const DEFAULT_VERSION: &str = "0.0.0";

/// A module version string
///
/// Versions are not validated as semantic versions. A version derived from a
/// ref keeps everything from the first ASCII digit onwards, so `v1.2.3`
/// becomes `1.2.3` and `2021-release` is kept verbatim.
///
/// Distinct refs can collapse to the same version: `release-1.0` and `v1.0`
/// both derive `1.0`, and the later ingestion overwrites the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Wrap an existing version string verbatim
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Derive a version from a git ref by stripping its leading run of
    /// non-digit characters
    pub fn from_ref(reference: &str) -> Self {
        let stripped = reference.trim_start_matches(|c: char| !c.is_ascii_digit());
        if stripped.is_empty() {
            Self(DEFAULT_VERSION.to_string())
        } else {
            Self(stripped.to_string())
        }
    }

    /// Borrow the version string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
