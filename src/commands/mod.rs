//! Top-level subcommand orchestration.
pub mod backup;
pub mod list;
pub mod restore;
pub mod version;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::{Config, Overrides};
use crate::host::HostInfo;
use crate::logging::Logger;
use crate::prompt::is_interactive;

/// Merge the global options into `overrides` and resolve the configuration.
///
/// # Errors
///
/// Returns an error if the settings file is invalid or a resolved value is
/// out of range.
pub fn load_config(
    global: &GlobalOpts,
    host: &HostInfo,
    mut overrides: Overrides,
    log: &Logger,
) -> Result<Config> {
    overrides.settings_file.clone_from(&global.settings);
    overrides.path_list.clone_from(&global.config);
    overrides.backup_root.clone_from(&global.root);
    overrides.dry_run = global.dry_run;

    let config = Config::resolve(host, overrides, is_interactive())?;
    log.debug(&format!("backup root: {}", config.backup_root.display()));
    log.debug(&format!("path list: {}", config.path_list.display()));
    log.debug(&format!(
        "max backups: {}, level: {}, threads: {}, policy: {}",
        config.max_backups, config.compression_level, config.threads, config.conflict_policy
    ));
    if config.dry_run {
        log.dry_run("dry run: nothing will be written");
    }
    Ok(config)
}
