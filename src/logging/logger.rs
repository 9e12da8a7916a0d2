//! Structured logger with dry-run awareness and summary collection.
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{Log, StepEntry, StepStatus};
use super::utils::terminal_columns;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and summary collection.
///
/// Messages go through [`tracing`]; the subscriber installed by
/// [`init_subscriber`](super::subscriber::init_subscriber) renders them to
/// the console and appends them to the persistent log file.  The logger
/// itself keeps the per-step results and every warning so both can be
/// repeated in the end-of-run summary.
#[derive(Debug)]
pub struct Logger {
    steps: Mutex<Vec<StepEntry>>,
    warnings: Mutex<Vec<String>>,
    log_file: Option<PathBuf>,
    /// Whether a progress line is currently displayed.
    progress_shown: Mutex<bool>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// `log_file` is only displayed in the summary; the file itself is
    /// created by [`init_subscriber`](super::subscriber::init_subscriber).
    #[must_use]
    pub const fn new(log_file: Option<PathBuf>) -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            log_file,
            progress_shown: Mutex::new(false),
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded step entries.
    #[must_use]
    pub fn step_entries(&self) -> Vec<StepEntry> {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return a clone of all warnings logged so far.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        self.clear_progress();
        tracing::error!("{msg}");
    }

    /// Log a warning message and remember it for the summary.
    pub fn warn(&self, msg: &str) {
        self.clear_progress();
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg.to_string());
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        self.clear_progress();
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        self.clear_progress();
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        self.clear_progress();
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record a step result for the summary.
    pub fn record_step(&self, name: &str, status: StepStatus, message: Option<&str>) {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StepEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
    }

    /// Count the number of failed steps.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.steps
            .lock()
            .map_or(0, |guard| {
                guard
                    .iter()
                    .filter(|s| s.status == StepStatus::Failed)
                    .count()
            })
    }

    /// Print the recorded steps followed by every accumulated warning.
    #[allow(clippy::print_stdout)]
    pub fn print_summary(&self) {
        let steps = self.step_entries();
        let warnings = self.warnings();
        if steps.is_empty() && warnings.is_empty() {
            return;
        }

        println!();
        self.stage("Summary");

        for step in &steps {
            let (icon, color) = match step.status {
                StepStatus::Ok => ("✓", "\x1b[32m"),
                StepStatus::Skipped => ("○", "\x1b[33m"),
                StepStatus::DryRun => ("~", "\x1b[37m"),
                StepStatus::Failed => ("✗", "\x1b[31m"),
            };
            let suffix = step
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", step.name));
        }
        let failures = self.failure_count();
        if failures > 0 {
            self.info(&format!("\x1b[31m{failures} step(s) failed\x1b[0m"));
        }

        if !warnings.is_empty() {
            self.info(&format!("\x1b[33m{} warning(s):\x1b[0m", warnings.len()));
            for warning in &warnings {
                self.info(&format!("\x1b[33m  - {warning}\x1b[0m"));
            }
        }

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }

    /// Erase the in-progress status line from the console.
    ///
    /// No-op if no progress line is currently shown.
    pub(super) fn clear_progress(&self) {
        let mut shown = self
            .progress_shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *shown {
            print!("\r\x1b[K");
            std::io::stdout().flush().ok();
            *shown = false;
        }
    }

    /// Replace the in-progress status line with `text`.
    ///
    /// The text is truncated to a single terminal row so that
    /// [`clear_progress`](Self::clear_progress) never needs cursor-up movement.
    pub(super) fn draw_progress(&self, text: &str) {
        let cols = terminal_columns();
        let max_chars = cols.saturating_sub(4);
        let display = if text.chars().count() > max_chars {
            let truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
            format!("{truncated}…")
        } else {
            text.to_string()
        };
        print!("\r\x1b[K  \x1b[2m▹ {display}\x1b[0m");
        std::io::stdout().flush().ok();
        *self
            .progress_shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = true;
    }

    /// Whether a progress line is currently displayed (test-only).
    #[cfg(test)]
    pub(crate) fn progress_is_shown(&self) -> bool {
        *self
            .progress_shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_step(&self, name: &str, status: StepStatus, message: Option<&str>) {
        self.record_step(name, status, message);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    #[test]
    fn logger_new() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(log.step_entries().is_empty(), "expected empty step list");
        assert!(log.warnings().is_empty(), "expected no warnings");
    }

    #[test]
    fn record_step_with_message() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_step("Apply retention", StepStatus::Skipped, Some("nothing to evict"));
        let steps = log.step_entries();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].message.as_deref(), Some("nothing to evict"));
    }

    #[test]
    fn warnings_are_accumulated() {
        let (log, _tmp, _guard) = isolated_logger();
        log.warn("skipping missing path: /a");
        log.warn("skipping missing path: /b");
        assert_eq!(
            log.warnings(),
            vec!["skipping missing path: /a", "skipping missing path: /b"]
        );
    }

    #[test]
    fn failure_count_returns_correct_count() {
        let (log, _tmp, _guard) = isolated_logger();
        assert_eq!(log.failure_count(), 0);
        log.record_step("a", StepStatus::Ok, None);
        log.record_step("b", StepStatus::Failed, Some("error 1"));
        log.record_step("c", StepStatus::DryRun, None);
        assert_eq!(log.failure_count(), 1);
    }

    #[test]
    fn summary_reports_failed_steps() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_step("Build archive", StepStatus::Failed, Some("disk full"));
        log.print_summary();
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("1 step(s) failed"));
    }

    #[test]
    fn log_trait_delegates_to_logger() {
        let (log, _tmp, _guard) = isolated_logger();
        let log_ref: &dyn Log = &log;
        log_ref.record_step("via-trait", StepStatus::Ok, None);
        log_ref.warn("via-trait warning");
        assert_eq!(log.step_entries().len(), 1);
        assert_eq!(log.warnings().len(), 1);
    }

    #[test]
    fn debug_always_written_to_file() {
        let (log, _tmp, _guard) = isolated_logger();
        let marker = format!("debug-marker-{}", std::process::id());
        log.debug(&marker);
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains(&marker));
    }

    #[test]
    fn warn_written_to_file_with_tag() {
        let (log, _tmp, _guard) = isolated_logger();
        log.warn("warn-marker");
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("[warn] warn-marker"));
    }

    #[test]
    fn stage_written_to_file_with_arrow() {
        let (log, _tmp, _guard) = isolated_logger();
        log.stage("stage-marker");
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("==> stage-marker"));
    }

    #[test]
    fn dry_run_written_to_file() {
        let (log, _tmp, _guard) = isolated_logger();
        log.dry_run("would remove backup_20240101_000000");
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("[dry run] would remove backup_20240101_000000"));
    }

    #[test]
    fn progress_line_is_cleared_by_next_message() {
        let (log, _tmp, _guard) = isolated_logger();
        log.draw_progress(&"a".repeat(500));
        assert!(log.progress_is_shown());
        log.info("done");
        assert!(!log.progress_is_shown());
    }
}
