//! Restore pipeline: select a session, verify it, extract to staging and
//! place files.
//!
//! ```text
//! Selecting -> Verifying -> Extracting -> Placing -> Restored
//!      \___________\____________\____________\_____> Failed
//! ```
//!
//! The staging directory is an [`extract::Staging`] owned by this function,
//! so it is removed on success, failure and interruption alike.
pub mod extract;
pub mod place;
pub mod select;
pub mod verify;

use std::fmt;

use crate::backup::manifest;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{BackupError, BackupResult};
use crate::lock::RootLock;
use crate::logging::{Log, StepStatus, run_step};
use crate::prompt::{Prompter, is_affirmative};
use crate::session::SessionDir;

pub use extract::{DirMeta, Preview, Staging};
pub use place::{ConflictAction, ConflictPolicy, ConflictResolver, PlacementReport};
pub use select::{SessionChoice, SessionSummary};

/// Progress of one restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    /// Choosing the session.
    Selecting,
    /// Checking archive integrity and checksum.
    Verifying,
    /// Unpacking into staging.
    Extracting,
    /// Moving staged files to their destinations.
    Placing,
    /// Finished successfully.
    Restored,
    /// A step failed; nothing further happens.
    Failed,
}

impl fmt::Display for RestoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Selecting => "selecting",
            Self::Verifying => "verifying",
            Self::Extracting => "extracting",
            Self::Placing => "placing",
            Self::Restored => "restored",
            Self::Failed => "failed",
        })
    }
}

/// Tracks the current [`RestoreState`] and logs each transition.
struct Machine<'a> {
    state: RestoreState,
    log: &'a dyn Log,
}

impl<'a> Machine<'a> {
    fn new(log: &'a dyn Log) -> Self {
        log.debug("restore: selecting");
        Self {
            state: RestoreState::Selecting,
            log,
        }
    }

    fn enter(&mut self, next: RestoreState) {
        self.log.debug(&format!("restore: {} -> {next}", self.state));
        self.state = next;
    }

    /// Run `f` in the current state; an error moves the machine to `Failed`.
    fn guard<T>(&mut self, f: impl FnOnce() -> BackupResult<T>) -> BackupResult<T> {
        let result = f();
        if result.is_err() {
            self.enter(RestoreState::Failed);
        }
        result
    }
}

/// What to restore and how much to ask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Which session.
    pub choice: SessionChoice,
    /// Accept the manifest without asking.
    pub assume_yes: bool,
}

/// What a restore did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// The restored session.
    pub session: SessionDir,
    /// Final state: `Restored`, or `Verifying` for a dry run.
    pub state: RestoreState,
    /// Placement counts; `None` for a dry run.
    pub report: Option<PlacementReport>,
    /// Archive listing; only produced by a dry run.
    pub preview: Option<Preview>,
}

/// Show the manifest and ask to continue unless `assume_yes`.
///
/// # Errors
///
/// Returns [`BackupError::UserCancelled`] if the operator declines or input
/// ends.
pub fn confirm_manifest(
    session: &SessionDir,
    prompter: &dyn Prompter,
    assume_yes: bool,
    log: &dyn Log,
) -> BackupResult<()> {
    match manifest::read(&session.manifest_path()) {
        Ok(paths) => {
            prompter.show(&format!("{} contains:", session.id));
            for path in paths {
                prompter.show(&format!("  {}", path.display()));
            }
        }
        Err(e) => log.warn(&format!("{}: manifest unavailable: {e}", session.id)),
    }
    if assume_yes {
        return Ok(());
    }
    let answer = prompter
        .read_line("Proceed with restore? [y/N] ")
        .map_err(|e| BackupError::io(session.manifest_path(), e))?;
    match answer {
        Some(answer) if is_affirmative(&answer) => Ok(()),
        _ => Err(BackupError::UserCancelled),
    }
}

/// Restore one session according to `config` and `request`.
///
/// Verification always completes before anything is extracted, and an
/// integrity failure stops the restore with no file placed.  In dry-run
/// mode the archive is verified and listed but not extracted.
///
/// # Errors
///
/// Returns the failure of whichever state was active.
pub fn run(
    config: &Config,
    request: &RestoreRequest,
    prompter: &dyn Prompter,
    log: &dyn Log,
    cancel: &CancelToken,
) -> BackupResult<RestoreOutcome> {
    let mut machine = Machine::new(log);

    if !config.backup_root.is_dir() {
        machine.enter(RestoreState::Failed);
        return Err(BackupError::Configuration(format!(
            "no backups found in {}",
            config.backup_root.display()
        )));
    }
    let _lock = if config.dry_run {
        None
    } else {
        Some(machine.guard(|| RootLock::acquire(&config.backup_root))?)
    };

    let session =
        machine.guard(|| select::resolve(&config.backup_root, &request.choice, prompter))?;
    log.info(&format!("selected {}", session.id));

    machine.enter(RestoreState::Verifying);
    machine.guard(|| run_step(log, "Verify archive", || verify::verify(&session, log, cancel)))?;
    let assume_yes = request.assume_yes || config.dry_run;
    machine.guard(|| confirm_manifest(&session, prompter, assume_yes, log))?;

    if config.dry_run {
        let preview = machine.guard(|| {
            extract::preview(&session.archive_path(), extract::PREVIEW_LIMIT, cancel)
        })?;
        for entry in &preview.entries {
            log.dry_run(&format!("would restore {entry}"));
        }
        if preview.total > preview.entries.len() {
            log.dry_run(&format!(
                "... and {} more ({} entries in total)",
                preview.total - preview.entries.len(),
                preview.total
            ));
        }
        log.record_step("Extract archive", StepStatus::DryRun, None);
        log.record_step("Place files", StepStatus::DryRun, None);
        return Ok(RestoreOutcome {
            session,
            state: machine.state,
            report: None,
            preview: Some(preview),
        });
    }

    machine.enter(RestoreState::Extracting);
    let staging = machine.guard(|| {
        run_step(log, "Extract archive", || {
            extract::extract_to_staging(&session.archive_path(), log, cancel)
        })
    })?;

    machine.enter(RestoreState::Placing);
    let mut resolver = ConflictResolver::new(config.conflict_policy, prompter);
    let report = machine.guard(|| {
        run_step(log, "Place files", || {
            place::place(
                staging.path(),
                staging.dirs(),
                &config.target_root,
                &mut resolver,
                log,
                cancel,
            )
        })
    })?;
    drop(staging);

    log.info(&format!(
        "restored {} file(s), skipped {}, moved aside {}",
        report.restored,
        report.skipped,
        report.backed_up.len()
    ));
    machine.enter(RestoreState::Restored);
    Ok(RestoreOutcome {
        session,
        state: machine.state,
        report: Some(report),
        preview: None,
    })
}
