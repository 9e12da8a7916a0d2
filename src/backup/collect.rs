//! Source path validation and sizing.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::error::{BackupError, BackupResult};
use crate::logging::Log;

/// One validated source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePath {
    /// Absolute path as listed (after `~` expansion).
    pub path: PathBuf,
    /// Recursive byte size of everything under the path.
    pub size: u64,
    /// Regular files under the path.
    pub file_count: u64,
    /// Subtree left out of sizing and archiving: the backup root, when it
    /// lies inside this path.
    pub exclude: Option<PathBuf>,
}

/// The validated set, in path-list order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    /// Paths that exist, in the order they were listed.
    pub sources: Vec<SourcePath>,
    /// Sum of every source's size.
    pub total_size: u64,
}

impl Collection {
    /// Paths only, in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.sources.iter().map(|s| s.path.as_path())
    }
}

/// Validate `entries` and measure each one.
///
/// Relative and missing paths are skipped with a warning; duplicates are
/// dropped silently.  Symbolic links count as one entry of their own size
/// and are never followed.  `backup_root` is never collected: a path inside
/// it is skipped, and a path containing it has the root excluded.
///
/// # Errors
///
/// Returns [`BackupError::Validation`] if no entry survives, or
/// [`BackupError::UserCancelled`] if interrupted while measuring.
pub fn collect(
    entries: &[PathBuf],
    backup_root: &Path,
    log: &dyn Log,
    cancel: &CancelToken,
) -> BackupResult<Collection> {
    let mut seen = HashSet::new();
    let mut collection = Collection::default();

    for path in entries {
        if !path.is_absolute() {
            log.warn(&format!("skipping relative path: {}", path.display()));
            continue;
        }
        if !seen.insert(path.clone()) {
            log.debug(&format!("ignoring duplicate path: {}", path.display()));
            continue;
        }
        if path.symlink_metadata().is_err() {
            log.warn(&format!("skipping missing path: {}", path.display()));
            continue;
        }
        if path.starts_with(backup_root) {
            log.warn(&format!(
                "skipping path inside the backup root: {}",
                path.display()
            ));
            continue;
        }
        let exclude = backup_root.starts_with(path).then(|| {
            log.warn(&format!(
                "{} contains the backup root; excluding {}",
                path.display(),
                backup_root.display()
            ));
            backup_root.to_path_buf()
        });
        let source = measure(path, exclude, log, cancel)?;
        log.debug(&format!(
            "{}: {} bytes in {} file(s)",
            source.path.display(),
            source.size,
            source.file_count
        ));
        collection.total_size = collection.total_size.saturating_add(source.size);
        collection.sources.push(source);
    }

    if collection.sources.is_empty() {
        return Err(BackupError::Validation(
            "none of the configured paths exist".to_string(),
        ));
    }
    Ok(collection)
}

/// Sum the sizes under `path` without following links or entering
/// `exclude`.
fn measure(
    path: &Path,
    exclude: Option<PathBuf>,
    log: &dyn Log,
    cancel: &CancelToken,
) -> BackupResult<SourcePath> {
    let mut size = 0u64;
    let mut file_count = 0u64;
    let walker = WalkDir::new(path)
        .follow_links(false)
        .follow_root_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded(e.path(), exclude.as_deref()));
    for entry in walker {
        cancel.check()?;
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log.warn(&format!("cannot read {}: {e}", path.display()));
                continue;
            }
        };
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_file() {
            file_count += 1;
            size = size.saturating_add(meta.len());
        } else if meta.file_type().is_symlink() {
            size = size.saturating_add(meta.len());
        }
    }
    Ok(SourcePath {
        path: path.to_path_buf(),
        size,
        file_count,
        exclude,
    })
}

/// Whether `path` is the excluded subtree itself.
pub(crate) fn is_excluded(path: &Path, exclude: Option<&Path>) -> bool {
    exclude.is_some_and(|root| path == root)
}
