//! Optional TOML settings file.
use std::path::Path;

use serde::Deserialize;

use crate::error::{BackupError, BackupResult};
use crate::restore::ConflictPolicy;

/// Default number of sessions kept by retention.
pub const DEFAULT_MAX_BACKUPS: usize = 5;

/// Default zstd level; low levels favour speed over ratio.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Values read from `settings.toml`.  Every key is optional.
///
/// ```toml
/// backup_root = "~/backups"
/// max_backups = 5
/// compression_level = 3
/// threads = 0
/// conflict_policy = "backup"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding session directories; `~` is expanded.
    pub backup_root: Option<String>,
    /// Sessions kept after retention.
    pub max_backups: Option<usize>,
    /// zstd compression level.
    pub compression_level: Option<i32>,
    /// Compression worker threads, `0` for one per core.
    pub threads: Option<u32>,
    /// Restore conflict policy used when none is given on the command line.
    pub conflict_policy: Option<ConflictPolicy>,
}

/// Load settings from `path`.  A missing file yields the defaults.
///
/// # Errors
///
/// Returns [`BackupError::Configuration`] if the file cannot be read or is
/// not valid TOML for [`Settings`].
pub fn load(path: &Path) -> BackupResult<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        BackupError::Configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    toml::from_str(&content).map_err(|e| {
        BackupError::Configuration(format!("invalid settings in {}: {e}", path.display()))
    })
}
