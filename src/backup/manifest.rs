//! Plain-text manifest: one source path per line.
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackupResult, IoContext as _};

/// Write `paths` to `dest`, one per line.
///
/// # Errors
///
/// Returns [`BackupError::Io`](crate::error::BackupError::Io) if the file
/// cannot be written.
pub fn write<'a>(dest: &Path, paths: impl IntoIterator<Item = &'a Path>) -> BackupResult<()> {
    let mut content = String::new();
    for path in paths {
        content.push_str(&path.to_string_lossy());
        content.push('\n');
    }
    fs::write(dest, content).at(dest)
}

/// Read the manifest at `path`, skipping blank lines.
///
/// # Errors
///
/// Returns [`BackupError::Io`](crate::error::BackupError::Io) if the file
/// cannot be read.
pub fn read(path: &Path) -> BackupResult<Vec<PathBuf>> {
    let content = fs::read_to_string(path).at(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(PathBuf::from)
        .collect())
}
