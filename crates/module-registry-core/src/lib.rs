//! Core domain models and types for the module registry
//!
//! This crate contains the data structures and pure domain logic shared by
//! the ingestion pipeline and the read path: module coordinates, versions
//! derived from tag refs, version records, artifact keys, webhook payloads
//! and the exclusion-pattern matcher used when packaging a snapshot.

pub mod artifact;
pub mod coordinate;
pub mod error;
pub mod exclusion;
pub mod record;
pub mod version;
pub mod webhook;

// Re-exports for convenience
pub use artifact::{ArtifactKey, RetrievalHandle, HANDLE_TTL_SECS};
pub use coordinate::ModuleCoordinate;
pub use error::{RegistryError, Result};
pub use exclusion::{is_excluded, ExclusionRule, ExclusionRuleSet, BUILTIN_PATTERNS, IGNORE_FILE_NAME};
pub use record::VersionRecord;
pub use version::Version;
pub use webhook::{RepositoryRef, TagPushEvent};
