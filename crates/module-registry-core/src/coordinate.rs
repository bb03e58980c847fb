//! Module coordinates
//!
//! A coordinate is the `(organization, repository, provider)` triple that
//! identifies a module family. Its string form `organization/repository/provider`
//! is the registry row id and the prefix of every artifact key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RegistryError, Result};

/// Identifies a distributable module family
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleCoordinate {
    /// Owning organization (the namespace)
    pub organization: String,
    /// Source repository name
    pub repository: String,
    /// Target provider, fixed per deployment
    pub provider: String,
}

impl ModuleCoordinate {
    /// Create a new coordinate with validation
    ///
    /// # Errors
    /// Returns an error if any segment is empty or not safe to use as a
    /// single path segment.
    pub fn new(
        organization: impl Into<String>,
        repository: impl Into<String>,
        provider: impl Into<String>,
    ) -> Result<Self> {
        let coordinate = Self {
            organization: organization.into(),
            repository: repository.into(),
            provider: provider.into(),
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Build a coordinate from a source host `organization/name` identifier
    pub fn from_full_name(full_name: &str, provider: impl Into<String>) -> Result<Self> {
        let (organization, repository) = full_name.split_once('/').ok_or_else(|| {
            RegistryError::InvalidCoordinate(format!(
                "repository '{}' is not in organization/name form",
                full_name
            ))
        })?;
        Self::new(organization, repository, provider)
    }

    /// Validate every segment
    pub fn validate(&self) -> Result<()> {
        validate_segment("organization", &self.organization)?;
        validate_segment("repository", &self.repository)?;
        validate_segment("provider", &self.provider)
    }

    /// Registry row id, `organization/repository/provider`
    pub fn id(&self) -> String {
        format!("{}/{}/{}", self.organization, self.repository, self.provider)
    }

    /// `organization/repository` as the source host names it
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.organization, self.repository)
    }
}

impl fmt::Display for ModuleCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.organization, self.repository, self.provider)
    }
}

pub(crate) fn validate_segment(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(RegistryError::InvalidCoordinate(format!(
            "{} cannot be empty",
            field
        )));
    }
    if value == "." || value == ".." {
        return Err(RegistryError::InvalidCoordinate(format!(
            "{} cannot be '{}'",
            field, value
        )));
    }
    if value
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
    {
        return Err(RegistryError::InvalidCoordinate(format!(
            "{} '{}' contains a separator or whitespace",
            field, value
        )));
    }
    Ok(())
}
