//! Logging infrastructure for structured console and file output.

mod logger;
mod progress;
mod subscriber;
mod types;
mod utils;

pub use logger::Logger;
pub use progress::{ConsoleProgress, Progress};
pub use subscriber::init_subscriber;
pub use types::{Log, StepEntry, StepStatus, run_step};
pub use utils::{human_size, log_file_path};

/// Create a Logger writing to a temporary log file through an isolated
/// per-thread tracing subscriber, so that events emitted by logger methods
/// reach the file during tests.
///
/// Returns a [`tracing::dispatcher::DefaultGuard`] that must be kept alive
/// for the duration of the test; dropping it restores the previous
/// thread-local dispatcher.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let path = tmp.path().join("test.log");
    let file_layer = subscriber::FileLayer::new(&path).expect("failed to create file layer");
    let log = Logger::new(Some(path));
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (log, tmp, guard)
}
