//! Resolved runtime configuration.
//!
//! Settings come from three places, later ones winning: built-in defaults,
//! the optional `settings.toml`, and command-line overrides.  The result is a
//! single [`Config`] value handed to every operation.
pub mod paths;
pub mod settings;

use std::path::{Path, PathBuf};

use crate::error::{BackupError, BackupResult};
use crate::host::HostInfo;
use crate::restore::ConflictPolicy;

pub use settings::{DEFAULT_COMPRESSION_LEVEL, DEFAULT_MAX_BACKUPS, Settings};

/// Valid zstd levels without the "ultra" window sizes.
pub const COMPRESSION_LEVELS: std::ops::RangeInclusive<i32> = 1..=19;

/// Directory under the XDG config dir holding our files.
pub const APP_DIR: &str = "dotbackup";

/// Everything an operation needs to know, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Home directory used for `~` expansion.
    pub home: PathBuf,
    /// Directory holding session directories.
    pub backup_root: PathBuf,
    /// The source path list.
    pub path_list: PathBuf,
    /// Sessions kept after retention.
    pub max_backups: usize,
    /// zstd compression level.
    pub compression_level: i32,
    /// Compression worker threads, `0` for one per core.
    pub threads: u32,
    /// How restore treats files that already exist at their destination.
    pub conflict_policy: ConflictPolicy,
    /// Prefix for restored absolute paths; `/` restores in place.
    pub target_root: PathBuf,
    /// Hostname recorded with new sessions.
    pub hostname: String,
    /// Username recorded with new sessions.
    pub username: String,
    /// Report planned actions without writing anything.
    pub dry_run: bool,
}

/// Command-line values that take precedence over the settings file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Settings file to read instead of the default location.
    pub settings_file: Option<PathBuf>,
    /// Path list to read instead of the default location.
    pub path_list: Option<PathBuf>,
    /// Backup root.
    pub backup_root: Option<PathBuf>,
    /// Retention count.
    pub max_backups: Option<usize>,
    /// Compression level.
    pub compression_level: Option<i32>,
    /// Compression threads.
    pub threads: Option<u32>,
    /// Restore conflict policy.
    pub conflict_policy: Option<ConflictPolicy>,
    /// Restore target root.
    pub target_root: Option<PathBuf>,
    /// Dry-run mode.
    pub dry_run: bool,
}

impl Config {
    /// Configuration with built-in defaults for `host`, rooted at
    /// `backup_root` and reading `path_list`.
    #[must_use]
    pub fn new(host: &HostInfo, backup_root: &Path, path_list: &Path) -> Self {
        Self {
            home: host.home.clone(),
            backup_root: backup_root.to_path_buf(),
            path_list: path_list.to_path_buf(),
            max_backups: DEFAULT_MAX_BACKUPS,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            threads: 0,
            conflict_policy: ConflictPolicy::Skip,
            target_root: PathBuf::from("/"),
            hostname: host.hostname.clone(),
            username: host.username.clone(),
            dry_run: false,
        }
    }

    /// Merge defaults, the settings file and `overrides`, then validate.
    ///
    /// `interactive` selects the conflict policy when neither the settings
    /// file nor the command line names one: `ask` on a terminal, `skip`
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Configuration`] if the settings file is
    /// invalid or the merged values fail [`Config::validate`].
    pub fn resolve(host: &HostInfo, overrides: Overrides, interactive: bool) -> BackupResult<Self> {
        let app_dir = host.config_dir.join(APP_DIR);
        let settings_file = overrides
            .settings_file
            .unwrap_or_else(|| app_dir.join("settings.toml"));
        let file = settings::load(&settings_file)?;

        let backup_root = overrides.backup_root.unwrap_or_else(|| {
            file.backup_root.as_deref().map_or_else(
                || host.home.join("backups"),
                |raw| paths::expand_tilde(raw, &host.home),
            )
        });
        let path_list = overrides
            .path_list
            .unwrap_or_else(|| app_dir.join("backup-paths.conf"));

        let mut config = Self::new(host, &backup_root, &path_list);
        config.max_backups = overrides
            .max_backups
            .or(file.max_backups)
            .unwrap_or(DEFAULT_MAX_BACKUPS);
        config.compression_level = overrides
            .compression_level
            .or(file.compression_level)
            .unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        config.threads = overrides.threads.or(file.threads).unwrap_or(0);
        config.conflict_policy = overrides
            .conflict_policy
            .or(file.conflict_policy)
            .unwrap_or_else(|| ConflictPolicy::default_for(interactive));
        if let Some(target) = overrides.target_root {
            config.target_root = target;
        }
        config.dry_run = overrides.dry_run;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Configuration`] describing the first invalid
    /// value.
    pub fn validate(&self) -> BackupResult<()> {
        if self.max_backups == 0 {
            return Err(BackupError::Configuration(
                "max_backups must be at least 1".to_string(),
            ));
        }
        if !COMPRESSION_LEVELS.contains(&self.compression_level) {
            return Err(BackupError::Configuration(format!(
                "compression level {} is outside {}..={}",
                self.compression_level,
                COMPRESSION_LEVELS.start(),
                COMPRESSION_LEVELS.end()
            )));
        }
        if !self.backup_root.is_absolute() {
            return Err(BackupError::Configuration(format!(
                "backup root must be an absolute path: {}",
                self.backup_root.display()
            )));
        }
        if !self.target_root.is_absolute() {
            return Err(BackupError::Configuration(format!(
                "restore target must be an absolute path: {}",
                self.target_root.display()
            )));
        }
        Ok(())
    }
}
