//! Choosing which session to restore.
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::backup::{MetadataStore, manifest};
use crate::error::{BackupError, BackupResult};
use crate::logging::human_size;
use crate::prompt::Prompter;
use crate::session::{SessionDir, find_session, list_sessions};

/// What a menu row shows about one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// The session.
    pub session: SessionDir,
    /// Session timestamp.
    pub created: NaiveDateTime,
    /// Uncompressed size, when metadata is available.
    pub source_size: Option<u64>,
    /// Archive size on disk.
    pub compressed_size: u64,
    /// Number of source paths.
    pub path_count: usize,
    /// Compression ratio, when metadata is available.
    pub ratio: Option<f64>,
}

/// Summarize `session` from its metadata store, falling back to the
/// manifest and archive file when the store is absent or unreadable.
#[must_use]
pub fn summarize(session: &SessionDir) -> SessionSummary {
    let archive_size = fs::metadata(session.archive_path()).map_or(0, |m| m.len());
    let mut summary = SessionSummary {
        session: session.clone(),
        created: session.id.timestamp(),
        source_size: None,
        compressed_size: archive_size,
        path_count: manifest::read(&session.manifest_path()).map_or(0, |p| p.len()),
        ratio: None,
    };

    let recorded = MetadataStore::open_read_only(&session.metadata_path()).and_then(|store| {
        let Some(row) = store.session()? else {
            return Ok(None);
        };
        let paths = store.paths(row.id)?.len();
        Ok(Some((row, paths)))
    });
    if let Ok(Some((row, paths))) = recorded {
        summary.source_size = Some(row.total_source_size);
        summary.compressed_size = row.compressed_size;
        summary.ratio = Some(row.compression_ratio);
        summary.path_count = paths;
    }
    summary
}

/// Summaries of every session under `root`, most recent first.
///
/// # Errors
///
/// Returns an error if `root` cannot be listed.
pub fn summarize_all(root: &Path) -> BackupResult<Vec<SessionSummary>> {
    Ok(list_sessions(root)?.iter().map(summarize).collect())
}

/// One numbered menu row.
#[must_use]
pub fn format_row(number: usize, summary: &SessionSummary) -> String {
    let ratio = summary
        .ratio
        .map_or_else(|| "-".to_string(), |r| format!("{r:.2}x"));
    format!(
        "{number:>3}) {}  {}  {:>10}  {} path(s)  {ratio}",
        summary.session.id,
        summary.created.format("%Y-%m-%d %H:%M:%S"),
        human_size(summary.compressed_size),
        summary.path_count,
    )
}

/// A parsed menu answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Zero-based index into the menu.
    Index(usize),
    /// The operator chose to leave.
    Quit,
}

/// Why a menu answer was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Nothing was typed.
    #[error("no selection entered")]
    Empty,
    /// The answer was not a number.
    #[error("'{0}' is not a number")]
    NotANumber(String),
    /// The number is not on the menu.
    #[error("{0} is not between 1 and {1}")]
    OutOfRange(usize, usize),
}

/// Interpret a menu answer for a menu of `count` rows numbered from 1.
///
/// # Errors
///
/// Returns a [`SelectionError`] for anything that is not `q` or a listed
/// number; nothing is ever chosen by default.
pub fn parse_selection(input: &str, count: usize) -> Result<Selection, SelectionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SelectionError::Empty);
    }
    if input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit") {
        return Ok(Selection::Quit);
    }
    let number: usize = input
        .parse()
        .map_err(|_| SelectionError::NotANumber(input.to_string()))?;
    if number == 0 || number > count {
        return Err(SelectionError::OutOfRange(number, count));
    }
    Ok(Selection::Index(number - 1))
}

const MAX_ATTEMPTS: usize = 3;

/// Show the numbered menu and read a choice.
///
/// # Errors
///
/// Returns [`BackupError::Configuration`] if there is nothing to choose or
/// three answers in a row are invalid, and [`BackupError::UserCancelled`]
/// on `q` or end of input.
pub fn choose_interactive(
    summaries: &[SessionSummary],
    prompter: &dyn Prompter,
) -> BackupResult<SessionDir> {
    if summaries.is_empty() {
        return Err(BackupError::Configuration("no backups to restore".to_string()));
    }
    prompter.show("Available backups (most recent first):");
    for (i, summary) in summaries.iter().enumerate() {
        prompter.show(&format_row(i + 1, summary));
    }

    let prompt = format!("Select a backup [1-{}] or q to quit: ", summaries.len());
    for _ in 0..MAX_ATTEMPTS {
        let Some(input) = prompter
            .read_line(&prompt)
            .map_err(|e| BackupError::Configuration(format!("cannot read selection: {e}")))?
        else {
            return Err(BackupError::UserCancelled);
        };
        match parse_selection(&input, summaries.len()) {
            Ok(Selection::Quit) => return Err(BackupError::UserCancelled),
            Ok(Selection::Index(i)) => {
                if let Some(summary) = summaries.get(i) {
                    return Ok(summary.session.clone());
                }
            }
            Err(e) => prompter.show(&format!("invalid selection: {e}")),
        }
    }
    Err(BackupError::Configuration(format!(
        "no valid selection after {MAX_ATTEMPTS} attempts"
    )))
}

/// How the session to restore is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChoice {
    /// A session identifier such as `backup_20240131_235959`.
    Explicit(String),
    /// Ask the operator with a numbered menu.
    Interactive,
}

/// Resolve `choice` to an existing session under `root`.
///
/// # Errors
///
/// See [`find_session`] and [`choose_interactive`].
pub fn resolve(
    root: &Path,
    choice: &SessionChoice,
    prompter: &dyn Prompter,
) -> BackupResult<SessionDir> {
    match choice {
        SessionChoice::Explicit(raw) => find_session(root, raw),
        SessionChoice::Interactive => choose_interactive(&summarize_all(root)?, prompter),
    }
}
