//! The backup path list: one source path per line.
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, BackupResult, IoContext as _};

/// Written when the path list is missing so the operator has something to
/// edit.
pub const TEMPLATE: &str = "\
# dotbackup source paths
#
# One absolute path per line. Blank lines and lines starting with '#' are
# ignored, and a leading '~' expands to your home directory. Paths that do
# not exist are skipped with a warning.
#
# ~/.bashrc
# ~/.config
# ~/Documents
";

/// Expand a leading `~` (alone or followed by `/`) to `home`.
#[must_use]
pub fn expand_tilde(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    raw.strip_prefix("~/")
        .map_or_else(|| PathBuf::from(raw), |rest| home.join(rest))
}

/// Parse path-list text into expanded paths, in file order.
///
/// Comments and blank lines are dropped; surrounding whitespace is trimmed.
/// No filesystem access happens here.
#[must_use]
pub fn parse_entries(content: &str, home: &Path) -> Vec<PathBuf> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| expand_tilde(line, home))
        .collect()
}

/// Read the path list at `path`.
///
/// A missing or blank file is replaced by [`TEMPLATE`] (unless `dry_run`)
/// and reported as a configuration error naming the file to edit.  A file
/// holding only comments is left alone but is an error too.
///
/// # Errors
///
/// Returns [`BackupError::Configuration`] when the list yields no entries,
/// or [`BackupError::Io`] if the file or its template cannot be accessed.
pub fn read_path_list(path: &Path, home: &Path, dry_run: bool) -> BackupResult<Vec<PathBuf>> {
    let content = if path.exists() {
        fs::read_to_string(path).at(path)?
    } else {
        String::new()
    };

    if content.trim().is_empty() {
        if !dry_run {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).at(parent)?;
            }
            fs::write(path, TEMPLATE).at(path)?;
        }
        return Err(BackupError::Configuration(format!(
            "no backup paths configured; add one path per line to {} and run again",
            path.display()
        )));
    }

    let entries = parse_entries(&content, home);
    if entries.is_empty() {
        return Err(BackupError::Configuration(format!(
            "{} lists no paths; uncomment or add one path per line",
            path.display()
        )));
    }
    Ok(entries)
}
