//! Backup session identity and on-disk layout.
//!
//! Every successful backup lives in its own directory under the backup root,
//! named `backup_<YYYYMMDD>_<HHMMSS>`.  The name is derived from a typed
//! [`SessionId`] whose ordering is the timestamp ordering, so listing and
//! retention never depend on how the name happens to sort as a string.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike as _};

use crate::error::{BackupError, BackupResult, IoContext as _};

/// Prefix shared by every session directory name.
pub const SESSION_PREFIX: &str = "backup_";

/// Compressed archive file inside a session directory.
pub const ARCHIVE_FILE: &str = "backup.tar.zst";

/// Plain-text manifest file inside a session directory.
pub const MANIFEST_FILE: &str = "manifest.txt";

/// Embedded metadata store inside a session directory.
pub const METADATA_FILE: &str = "metadata.db";

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Identifier of a backup session: its creation time at second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(NaiveDateTime);

impl SessionId {
    /// Identifier for a session starting now (local time).
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    /// Identifier for the given instant, truncated to whole seconds.
    #[must_use]
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self(at.with_nanosecond(0).unwrap_or(at))
    }

    /// The session timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> NaiveDateTime {
        self.0
    }

    /// Fixed-width stamp, e.g. `20240131_235959`.
    #[must_use]
    pub fn stamp(&self) -> String {
        self.0.format(STAMP_FORMAT).to_string()
    }

    /// Directory name, e.g. `backup_20240131_235959`.
    #[must_use]
    pub fn dir_name(&self) -> String {
        format!("{SESSION_PREFIX}{}", self.stamp())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

fn parse_digits(s: &str, range: std::ops::Range<usize>) -> Option<u32> {
    let part = s.get(range)?;
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

fn parse_stamp(stamp: &str) -> Option<NaiveDateTime> {
    if stamp.len() != 15 || stamp.as_bytes().get(8) != Some(&b'_') {
        return None;
    }
    let year = i32::try_from(parse_digits(stamp, 0..4)?).ok()?;
    let month = parse_digits(stamp, 4..6)?;
    let day = parse_digits(stamp, 6..8)?;
    let hour = parse_digits(stamp, 9..11)?;
    let minute = parse_digits(stamp, 11..13)?;
    let second = parse_digits(stamp, 13..15)?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

impl FromStr for SessionId {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(SESSION_PREFIX)
            .and_then(parse_stamp)
            .map(Self)
            .ok_or_else(|| {
                BackupError::Configuration(format!(
                    "invalid session id '{s}': expected {SESSION_PREFIX}YYYYMMDD_HHMMSS"
                ))
            })
    }
}

/// A session directory under a backup root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDir {
    /// Session identifier.
    pub id: SessionId,
    /// Absolute path of the session directory.
    pub path: PathBuf,
}

impl SessionDir {
    /// Session `id` located under `root`.
    #[must_use]
    pub fn new(root: &Path, id: SessionId) -> Self {
        Self {
            id,
            path: root.join(id.dir_name()),
        }
    }

    /// Path of the compressed archive.
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.path.join(ARCHIVE_FILE)
    }

    /// Path of the manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Path of the metadata store.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }
}

/// List session directories under `root`, most recent first.
///
/// Entries whose names do not follow the session naming convention, and
/// non-directories, are ignored.  A missing root yields an empty list.
///
/// # Errors
///
/// Returns an error if `root` exists but cannot be read.
pub fn list_sessions(root: &Path) -> BackupResult<Vec<SessionDir>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut sessions = Vec::new();
    for entry in fs::read_dir(root).at(root)? {
        let entry = entry.at(root)?;
        if !entry.file_type().at(&entry.path())?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(id) = name.to_str().and_then(|n| n.parse::<SessionId>().ok()) else {
            continue;
        };
        sessions.push(SessionDir {
            id,
            path: entry.path(),
        });
    }
    sessions.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(sessions)
}

/// Locate an existing session by identifier.
///
/// # Errors
///
/// Returns [`BackupError::Configuration`] if `raw` is not a valid session
/// identifier or no such session exists under `root`.
pub fn find_session(root: &Path, raw: &str) -> BackupResult<SessionDir> {
    let id: SessionId = raw.trim().trim_end_matches('/').parse()?;
    let session = SessionDir::new(root, id);
    if !session.path.is_dir() {
        return Err(BackupError::Configuration(format!(
            "session {id} not found in {}",
            root.display()
        )));
    }
    Ok(session)
}
