//! Throughput reporting for long-running byte streams.
use std::time::Instant;

use super::logger::Logger;
use super::utils::human_size;

/// Receiver for byte-count progress updates.
///
/// Implementations only observe counts; they never see or alter the bytes
/// being processed.
pub trait Progress {
    /// `done` of `total` bytes have been processed.
    fn advance(&mut self, done: u64, total: u64);
    /// The stream has ended.
    fn finish(&mut self);
}

/// [`Progress`] that redraws a single console status line.
///
/// Redraws only when the whole-percent value changes, so large archives do
/// not flood the terminal.
#[derive(Debug)]
pub struct ConsoleProgress<'a> {
    log: &'a Logger,
    label: String,
    started: Instant,
    last_percent: Option<u64>,
}

impl<'a> ConsoleProgress<'a> {
    /// Create a progress line labelled `label`.
    #[must_use]
    pub fn new(log: &'a Logger, label: &str) -> Self {
        Self {
            log,
            label: label.to_string(),
            started: Instant::now(),
            last_percent: None,
        }
    }
}

/// Percentage of `done` over `total`, clamped to 0..=100.
fn percent(done: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    (done.min(total).saturating_mul(100)) / total
}

impl Progress for ConsoleProgress<'_> {
    fn advance(&mut self, done: u64, total: u64) {
        let pct = percent(done, total);
        if self.last_percent == Some(pct) {
            return;
        }
        self.last_percent = Some(pct);
        let secs = self.started.elapsed().as_secs().max(1);
        let rate = done / secs;
        self.log.draw_progress(&format!(
            "{} {pct:>3}% ({}/s)",
            self.label,
            human_size(rate)
        ));
    }

    fn finish(&mut self) {
        self.log.clear_progress();
    }
}
