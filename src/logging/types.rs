//! Core logging types: step entries, status, and the [`Log`] trait.
use crate::error::BackupResult;

/// Pipeline step result for summary reporting.
#[derive(Debug, Clone)]
pub struct StepEntry {
    /// Human-readable step name.
    pub name: String,
    /// Final status of the step.
    pub status: StepStatus,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Status of a completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Step completed successfully.
    Ok,
    /// Step was not needed (e.g., nothing to evict).
    Skipped,
    /// Step ran in dry-run mode; nothing was written.
    DryRun,
    /// Step encountered an error and could not complete.
    Failed,
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) is the production implementation; the
/// engine only depends on this trait so that library callers can substitute
/// their own sink.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a non-fatal warning; warnings are repeated in the final summary.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record a step result for the summary.
    fn record_step(&self, name: &str, status: StepStatus, message: Option<&str>);
}

/// Run `f` as a named step: print the stage header, then record `Ok` or
/// `Failed` depending on the outcome.
///
/// # Errors
///
/// Returns whatever `f` returns.
pub fn run_step<T>(
    log: &dyn Log,
    name: &str,
    f: impl FnOnce() -> BackupResult<T>,
) -> BackupResult<T> {
    log.stage(name);
    let result = f();
    match &result {
        Ok(_) => log.record_step(name, StepStatus::Ok, None),
        Err(e) => log.record_step(name, StepStatus::Failed, Some(&e.to_string())),
    }
    result
}
