//! Command: list backup sessions.
use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::{Config, Overrides};
use crate::host::HostInfo;
use crate::logging::Logger;
use crate::restore::select::{format_row, summarize_all};

/// Run the list command.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the backup root cannot be
/// read.
pub fn run(global: &GlobalOpts, host: &HostInfo, log: &Logger) -> Result<()> {
    let config = super::load_config(global, host, Overrides::default(), log)?;
    show(&config, log)
}

/// Print one row per session, most recent first.
///
/// # Errors
///
/// Returns an error if the backup root cannot be read.
pub fn show(config: &Config, log: &Logger) -> Result<()> {
    let summaries = summarize_all(&config.backup_root)?;
    if summaries.is_empty() {
        log.info(&format!("no backups in {}", config.backup_root.display()));
        return Ok(());
    }
    log.stage(&format!("Backups in {}", config.backup_root.display()));
    for (i, summary) in summaries.iter().enumerate() {
        log.info(&format_row(i + 1, summary));
    }
    Ok(())
}
