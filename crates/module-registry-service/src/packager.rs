//! Artifact packaging
//!
//! Walks a snapshot, skipping everything the exclusion rules reject, and
//! writes the remaining files into a deflate-compressed zip archive. Entries
//! are visited in name order and carry a fixed timestamp, so packaging an
//! unchanged tree twice yields the same entries with the same contents.
//!
//! A symlinked file is packaged by content only when its target resolves
//! inside the snapshot. Symlinked directories are never followed.

use module_registry_core::{ExclusionRuleSet, IGNORE_FILE_NAME};
use std::fs::{self, File};
use std::io::{self, Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ServiceError, ServiceResult};

/// Default limit for packaging one snapshot (2 minutes)
pub const DEFAULT_PACKAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// A finished archive
#[derive(Debug, Clone)]
pub struct PackagedArtifact {
    /// Archive bytes
    pub bytes: Vec<u8>,
    /// Entry names in archive order
    pub entries: Vec<String>,
}

/// Build the rule set for a snapshot from its ignore file, if any
pub fn load_rule_set(root: &Path) -> ServiceResult<ExclusionRuleSet> {
    let contents = match fs::read(root.join(IGNORE_FILE_NAME)) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(ServiceError::Packaging(format!(
                "cannot read {}: {}",
                IGNORE_FILE_NAME, e
            )))
        }
    };

    let rules = ExclusionRuleSet::for_snapshot(contents.as_deref());
    for pattern in rules.rejected_patterns() {
        warn!("Ignoring invalid exclusion pattern '{}'", pattern);
    }
    Ok(rules)
}

/// Package the snapshot at `root`
///
/// Any unreadable entry aborts the whole archive.
pub fn pack(root: &Path, rules: &ExclusionRuleSet) -> ServiceResult<PackagedArtifact> {
    pack_until(root, rules, &AtomicBool::new(false))
}

/// Package the snapshot at `root`, stopping once `cancelled` is set
///
/// The flag is checked before every entry; a cancelled walk returns
/// `ServiceError::Timeout` and leaves the snapshot untouched.
pub fn pack_until(
    root: &Path,
    rules: &ExclusionRuleSet,
    cancelled: &AtomicBool,
) -> ServiceResult<PackagedArtifact> {
    let canonical_root = fs::canonicalize(root).map_err(|e| io_error(root, e))?;
    let mut walk = Walk {
        root: &canonical_root,
        rules,
        cancelled,
        writer: ZipWriter::new(Cursor::new(Vec::new())),
        options: SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644),
        entries: Vec::new(),
    };
    walk.add_directory(&canonical_root, "")?;

    let cursor = walk.writer.finish().map_err(packaging_error)?;
    Ok(PackagedArtifact {
        bytes: cursor.into_inner(),
        entries: walk.entries,
    })
}

struct Walk<'a, W: Write + Seek> {
    root: &'a Path,
    rules: &'a ExclusionRuleSet,
    cancelled: &'a AtomicBool,
    writer: ZipWriter<W>,
    options: SimpleFileOptions,
    entries: Vec<String>,
}

impl<W: Write + Seek> Walk<'_, W> {
    fn add_directory(&mut self, dir: &Path, prefix: &str) -> ServiceResult<()> {
        let mut children: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
            let entry = entry.map_err(|e| io_error(dir, e))?;
            let name = entry.file_name().into_string().map_err(|raw| {
                ServiceError::Packaging(format!("non UTF-8 file name {:?} in {}", raw, dir.display()))
            })?;
            children.push((name, entry.path()));
        }
        children.sort();

        for (name, path) in children {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(ServiceError::Timeout("packaging was cancelled".to_string()));
            }
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };

            let link = fs::symlink_metadata(&path).map_err(|e| io_error(&path, e))?;
            let is_symlink = link.file_type().is_symlink();
            let metadata = if is_symlink {
                fs::metadata(&path).map_err(|e| io_error(&path, e))?
            } else {
                link
            };

            if metadata.is_dir() {
                if self.rules.is_excluded(&relative, true) {
                    debug!("Skipping excluded directory {}", relative);
                    continue;
                }
                if is_symlink {
                    debug!("Skipping symlinked directory {}", relative);
                    continue;
                }
                self.add_directory(&path, &relative)?;
            } else if metadata.is_file() {
                if self.rules.is_excluded(&relative, false) {
                    continue;
                }
                if is_symlink && !self.contains_target(&path)? {
                    warn!("Skipping {}: link target is outside the snapshot", relative);
                    continue;
                }
                let mut file = File::open(&path).map_err(|e| io_error(&path, e))?;
                self.writer
                    .start_file(relative.as_str(), self.options)
                    .map_err(packaging_error)?;
                io::copy(&mut file, &mut self.writer).map_err(|e| io_error(&path, e))?;
                self.entries.push(relative);
            }
        }
        Ok(())
    }

    fn contains_target(&self, link: &Path) -> ServiceResult<bool> {
        let target = fs::canonicalize(link).map_err(|e| io_error(link, e))?;
        Ok(target.starts_with(self.root))
    }
}

fn io_error(path: &Path, err: io::Error) -> ServiceError {
    ServiceError::Packaging(format!("{}: {}", path.display(), err))
}

fn packaging_error(err: zip::result::ZipError) -> ServiceError {
    ServiceError::Packaging(err.to_string())
}

/// Runs packaging off the async runtime under a time limit
#[derive(Debug, Clone)]
pub struct ArtifactPackager {
    timeout: Duration,
}

impl Default for ArtifactPackager {
    fn default() -> Self {
        Self::new(DEFAULT_PACKAGE_TIMEOUT)
    }
}

impl ArtifactPackager {
    /// Create a packager with the given time limit
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Load the snapshot's rules and package it
    #[instrument(skip(self), fields(root = %root.display()))]
    pub async fn package(&self, root: PathBuf) -> ServiceResult<PackagedArtifact> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            let rules = load_rule_set(&root)?;
            pack_until(&root, &rules, &flag)
        });

        let artifact = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join)) => {
                return Err(ServiceError::Internal(format!("packaging task failed: {}", join)))
            }
            Err(_) => {
                // The caller removes the snapshot once this returns
                cancelled.store(true, Ordering::Relaxed);
                let _ = task.await;
                return Err(ServiceError::Timeout(format!(
                    "packaging exceeded {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        info!(
            entries = artifact.entries.len(),
            bytes = artifact.bytes.len(),
            "Packaged snapshot"
        );
        Ok(artifact)
    }
}
