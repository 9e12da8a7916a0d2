//! Command: restore files from a backup session.
use anyhow::Result;

use crate::cancel::CancelToken;
use crate::cli::{GlobalOpts, RestoreOpts};
use crate::config::Overrides;
use crate::error::BackupError;
use crate::host::HostInfo;
use crate::logging::Logger;
use crate::prompt::{TerminalPrompter, is_interactive};
use crate::restore::{self, RestoreRequest, SessionChoice};

/// Run the restore command.
///
/// # Errors
///
/// Returns an error if the session cannot be chosen, fails verification, or
/// cannot be placed.
pub fn run(
    global: &GlobalOpts,
    opts: &RestoreOpts,
    host: &HostInfo,
    log: &Logger,
    cancel: &CancelToken,
) -> Result<()> {
    let overrides = Overrides {
        conflict_policy: opts.policy,
        target_root: opts.target.clone(),
        ..Overrides::default()
    };
    let config = super::load_config(global, host, overrides, log)?;
    if opts.list {
        return super::list::show(&config, log);
    }

    let choice = match &opts.session {
        Some(id) if !opts.interactive => SessionChoice::Explicit(id.clone()),
        _ => SessionChoice::Interactive,
    };
    if choice == SessionChoice::Interactive && !is_interactive() {
        return Err(BackupError::Configuration(
            "no session given and stdin is not a terminal; pass a session id".to_string(),
        )
        .into());
    }

    let request = RestoreRequest {
        choice,
        assume_yes: opts.yes,
    };
    restore::run(&config, &request, &TerminalPrompter, log, cancel)?;
    Ok(())
}
