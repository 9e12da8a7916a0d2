//! Command: create a backup session.
use anyhow::Result;

use crate::backup;
use crate::cancel::CancelToken;
use crate::cli::{BackupOpts, GlobalOpts};
use crate::config::Overrides;
use crate::host::HostInfo;
use crate::logging::{ConsoleProgress, Logger, Progress, human_size};
use crate::session::SessionId;

/// Run the backup command.
///
/// # Errors
///
/// Returns an error if configuration is invalid, no source path exists, or
/// any pipeline stage fails.
pub fn run(
    global: &GlobalOpts,
    opts: &BackupOpts,
    host: &HostInfo,
    log: &Logger,
    cancel: &CancelToken,
) -> Result<()> {
    log.info(&format!("dotbackup {}", super::version::version()));
    let overrides = Overrides {
        max_backups: opts.max_backups,
        compression_level: opts.level,
        threads: opts.threads,
        ..Overrides::default()
    };
    let config = super::load_config(global, host, overrides, log)?;

    let mut progress =
        (opts.progress && !config.dry_run).then(|| ConsoleProgress::new(log, "archiving"));
    let outcome = backup::run(
        &config,
        SessionId::now(),
        log,
        cancel,
        progress.as_mut().map(|p| p as &mut dyn Progress),
    )?;

    if let Some(session) = &outcome.session {
        log.info(&format!(
            "{} saved to {} ({})",
            session.id,
            session.path.display(),
            human_size(outcome.compressed_size)
        ));
    }
    if !outcome.retention.removed.is_empty() && !config.dry_run {
        log.info(&format!(
            "retention removed {} old session(s)",
            outcome.retention.removed.len()
        ));
    }
    Ok(())
}
