//! Rendering of [`Logger`](super::Logger) events to the console and to the
//! per-command log file.
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;

use super::utils::{format_utc_datetime, format_utc_time, strip_ansi};
use crate::commands::version::version;

/// Target used by [`Logger::stage`](super::Logger::stage).
pub(super) const STAGE_TARGET: &str = "dotbackup::stage";
/// Target used by [`Logger::dry_run`](super::Logger::dry_run).
pub(super) const DRY_RUN_TARGET: &str = "dotbackup::dry_run";

/// How an event is presented, derived from its level and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Error,
    Warn,
    Stage,
    DryRun,
    Info,
    Debug,
}

impl Kind {
    fn of(level: Level, target: &str) -> Self {
        match level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warn,
            Level::INFO if target == STAGE_TARGET => Self::Stage,
            Level::INFO if target == DRY_RUN_TARGET => Self::DryRun,
            Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }

    /// Plain-text tag written before the message in the log file.
    const fn file_tag(self) -> &'static str {
        match self {
            Self::Error => "    [error] ",
            Self::Warn => "    [warn] ",
            Self::Stage => "==> ",
            Self::DryRun => "    [dry run] ",
            Self::Info => "    ",
            Self::Debug => "    [debug] ",
        }
    }
}

/// Pulls the formatted `message` field out of an event.
#[derive(Default)]
struct Message(String);

impl tracing::field::Visit for Message {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }
}

fn classify(event: &tracing::Event<'_>) -> (Kind, String) {
    let metadata = event.metadata();
    let mut message = Message::default();
    event.record(&mut message);
    (Kind::of(*metadata.level(), metadata.target()), message.0)
}

/// Appends every event to the command's log file, timestamped and without
/// ANSI codes.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate `path`, write a header naming the command (the file stem)
    /// and return a layer appending to it.
    ///
    /// Returns `None` if the file cannot be written.
    pub(super) fn new(path: &Path) -> Option<Self> {
        let command = path
            .file_stem()
            .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
        let rule = "=".repeat(48);
        let header = format!(
            "{rule}\ndotbackup {} {command} {}\n{rule}\n",
            version(),
            format_utc_datetime()
        );
        fs::write(path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let (kind, msg) = classify(event);
        let line = strip_ansi(&msg);
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "[{}] {}{line}", format_utc_time(), kind.file_tag()).ok();
        }
    }
}

/// Console rendering: coloured level tags, bold stage headers, dimmed debug.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let (kind, msg) = classify(event);
        match kind {
            Kind::Error => writeln!(writer, "\x1b[31mERROR\x1b[0m {msg}"),
            Kind::Warn => writeln!(writer, "\x1b[33mWARN\x1b[0m  {msg}"),
            Kind::Stage => writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
            Kind::DryRun => writeln!(writer, "  \x1b[33m[DRY RUN]\x1b[0m {msg}"),
            Kind::Info => writeln!(writer, "  {msg}"),
            Kind::Debug => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Warnings and errors go to stderr, everything else to stdout; `verbose`
/// adds debug messages.  When `log_file` is given, every event including
/// `debug` is also appended there.  Must be called once at startup.
pub fn init_subscriber(verbose: bool, log_file: Option<&Path>) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let make_writer = std::io::stderr
        .with_max_level(Level::WARN)
        .and(std::io::stdout.with_min_level(Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_level);
    let file_layer = log_file
        .and_then(FileLayer::new)
        .map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn header_names_the_command() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("restore.log");
        assert!(FileLayer::new(&path).is_some());
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.lines().nth(1).unwrap().starts_with("dotbackup "));
        assert!(contents.contains(" restore "));
    }

    #[test]
    fn file_layer_fails_for_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(FileLayer::new(&tmp.path().join("missing/dir/backup.log")).is_none());
    }

    #[test]
    fn kinds_follow_level_and_target() {
        assert_eq!(Kind::of(Level::INFO, STAGE_TARGET), Kind::Stage);
        assert_eq!(Kind::of(Level::INFO, DRY_RUN_TARGET), Kind::DryRun);
        assert_eq!(Kind::of(Level::INFO, "dotbackup_cli::backup"), Kind::Info);
        assert_eq!(Kind::of(Level::WARN, STAGE_TARGET), Kind::Warn);
        assert_eq!(Kind::of(Level::TRACE, "x"), Kind::Debug);
        assert_eq!(Kind::Warn.file_tag(), "    [warn] ");
    }
}
