//! Per-session SQLite metadata store.
//!
//! Each session directory carries its own `metadata.db` with two tables:
//! one `backup_metadata` row describing the session and one `backup_paths`
//! row per source path.  Rows are written once, after the archive is
//! complete, inside a single transaction; they disappear together with the
//! session directory.
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use rusqlite::{Connection, OpenFlags, OptionalExtension as _, Row, params};

use crate::error::{BackupError, BackupResult};
use crate::session::SessionId;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS backup_metadata (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp         TEXT NOT NULL UNIQUE,
    hostname          TEXT NOT NULL,
    username          TEXT NOT NULL,
    backup_size       INTEGER NOT NULL,
    compressed_size   INTEGER NOT NULL,
    compression_ratio REAL NOT NULL,
    checksum          TEXT NOT NULL,
    created_at        TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS backup_paths (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    backup_id     INTEGER NOT NULL REFERENCES backup_metadata(id) ON DELETE CASCADE,
    original_path TEXT NOT NULL,
    size          INTEGER NOT NULL,
    file_count    INTEGER NOT NULL,
    checksum      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_backup_metadata_timestamp ON backup_metadata(timestamp);
CREATE INDEX IF NOT EXISTS idx_backup_paths_backup_id ON backup_paths(backup_id);
";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A recorded backup session.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupSession {
    /// Row id.
    pub id: i64,
    /// Session identifier (fixed-width timestamp).
    pub timestamp: String,
    /// Machine the backup ran on.
    pub hostname: String,
    /// User who ran the backup.
    pub username: String,
    /// Total uncompressed source size.
    pub total_source_size: u64,
    /// Archive size on disk.
    pub compressed_size: u64,
    /// `total_source_size / compressed_size`.
    pub compression_ratio: f64,
    /// sha256 of the archive.
    pub checksum: String,
    /// Wall-clock time the row was written.
    pub created_at: String,
}

/// A recorded source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPath {
    /// Row id.
    pub id: i64,
    /// Owning session row.
    pub backup_id: i64,
    /// Absolute source path.
    pub original_path: PathBuf,
    /// Recursive size at backup time.
    pub size: u64,
    /// Regular files at backup time.
    pub file_count: u64,
    /// Archive sha256, repeated per row.
    pub checksum: String,
}

/// Values for a new session row.
#[derive(Debug, Clone)]
pub struct NewSession<'a> {
    /// Session identifier.
    pub id: SessionId,
    /// Machine name.
    pub hostname: &'a str,
    /// User name.
    pub username: &'a str,
    /// Total uncompressed source size.
    pub total_source_size: u64,
    /// Archive size on disk.
    pub compressed_size: u64,
    /// sha256 of the archive.
    pub checksum: &'a str,
}

/// Values for a new path row.
#[derive(Debug, Clone, Copy)]
pub struct NewPath<'a> {
    /// Absolute source path.
    pub path: &'a Path,
    /// Recursive size.
    pub size: u64,
    /// Regular file count.
    pub file_count: u64,
}

/// Ratio of source bytes to archive bytes; `0.0` for an empty archive.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compression_ratio(source: u64, compressed: u64) -> f64 {
    if compressed == 0 {
        return 0.0;
    }
    source as f64 / compressed as f64
}

fn to_sql(value: u64, what: &str) -> BackupResult<i64> {
    i64::try_from(value)
        .map_err(|_| BackupError::Configuration(format!("{what} {value} does not fit the store")))
}

fn from_sql(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<BackupSession> {
    Ok(BackupSession {
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        hostname: row.get("hostname")?,
        username: row.get("username")?,
        total_source_size: from_sql(row.get("backup_size")?),
        compressed_size: from_sql(row.get("compressed_size")?),
        compression_ratio: row.get("compression_ratio")?,
        checksum: row.get("checksum")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_path(row: &Row<'_>) -> rusqlite::Result<BackupPath> {
    Ok(BackupPath {
        id: row.get("id")?,
        backup_id: row.get("backup_id")?,
        original_path: PathBuf::from(row.get::<_, String>("original_path")?),
        size: from_sql(row.get("size")?),
        file_count: from_sql(row.get("file_count")?),
        checksum: row.get("checksum")?,
    })
}

/// Handle on one session's metadata database.
#[derive(Debug)]
pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    /// Open (creating if needed) the store at `path` and ensure the schema.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Database`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn create(path: &Path) -> BackupResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Open an existing store without write access.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Database`] if the file is missing or is not a
    /// database.
    pub fn open_read_only(path: &Path) -> BackupResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Insert the session row and one row per path in one transaction.
    ///
    /// Every path row carries the archive checksum as well, so readers that
    /// only look at `backup_paths` still find it.
    ///
    /// Returns the new session row id.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Database`] if any insert fails; nothing is
    /// committed in that case.
    pub fn record(&mut self, session: &NewSession<'_>, paths: &[NewPath<'_>]) -> BackupResult<i64> {
        let backup_size = to_sql(session.total_source_size, "source size")?;
        let compressed_size = to_sql(session.compressed_size, "archive size")?;
        let ratio = compression_ratio(session.total_source_size, session.compressed_size);
        let created_at = Local::now().format(TIME_FORMAT).to_string();

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO backup_metadata
                (timestamp, hostname, username, backup_size, compressed_size,
                 compression_ratio, checksum, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id.stamp(),
                session.hostname,
                session.username,
                backup_size,
                compressed_size,
                ratio,
                session.checksum,
                created_at,
            ],
        )?;
        let backup_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO backup_paths
                    (backup_id, original_path, size, file_count, checksum)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for path in paths {
                stmt.execute(params![
                    backup_id,
                    path.path.to_string_lossy(),
                    to_sql(path.size, "path size")?,
                    to_sql(path.file_count, "file count")?,
                    session.checksum,
                ])?;
            }
        }
        tx.commit()?;
        Ok(backup_id)
    }

    /// The session row, if one was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Database`] on query failure.
    pub fn session(&self) -> BackupResult<Option<BackupSession>> {
        Ok(self
            .conn
            .query_row(
                "SELECT * FROM backup_metadata ORDER BY timestamp DESC LIMIT 1",
                [],
                row_to_session,
            )
            .optional()?)
    }

    /// Path rows belonging to session row `backup_id`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Database`] on query failure.
    pub fn paths(&self, backup_id: i64) -> BackupResult<Vec<BackupPath>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM backup_paths WHERE backup_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![backup_id], row_to_path)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The recorded archive checksum.
    ///
    /// Prefers the session row and falls back to the first path row for
    /// stores that only kept it there.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Database`] on query failure.
    pub fn checksum(&self) -> BackupResult<Option<String>> {
        if let Some(session) = self.session()?
            && !session.checksum.is_empty()
        {
            return Ok(Some(session.checksum));
        }
        Ok(self
            .conn
            .query_row(
                "SELECT checksum FROM backup_paths ORDER BY id LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }
}

/// Parse a stored `created_at` value.
#[must_use]
pub fn parse_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIME_FORMAT).ok()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn sample_id() -> SessionId {
        "backup_20240301_101500".parse().unwrap()
    }

    fn record_sample(store: &mut MetadataStore) -> i64 {
        store
            .record(
                &NewSession {
                    id: sample_id(),
                    hostname: "box",
                    username: "ada",
                    total_source_size: 900,
                    compressed_size: 300,
                    checksum: "abc123",
                },
                &[
                    NewPath {
                        path: Path::new("/home/ada/notes"),
                        size: 500,
                        file_count: 2,
                    },
                    NewPath {
                        path: Path::new("/home/ada/.bashrc"),
                        size: 400,
                        file_count: 1,
                    },
                ],
            )
            .unwrap()
    }

    #[test]
    fn ratio() {
        assert!((compression_ratio(900, 300) - 3.0).abs() < f64::EPSILON);
        assert!(compression_ratio(900, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn record_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("metadata.db");
        let mut store = MetadataStore::create(&db).unwrap();
        let id = record_sample(&mut store);
        drop(store);

        let store = MetadataStore::open_read_only(&db).unwrap();
        let session = store.session().unwrap().unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.timestamp, "20240301_101500");
        assert_eq!(session.hostname, "box");
        assert_eq!(session.total_source_size, 900);
        assert_eq!(session.compressed_size, 300);
        assert!((session.compression_ratio - 3.0).abs() < f64::EPSILON);
        assert!(parse_time(&session.created_at).is_some());

        let paths = store.paths(id).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].original_path, PathBuf::from("/home/ada/notes"));
        assert_eq!(paths[0].file_count, 2);
        assert!(paths.iter().all(|p| p.checksum == "abc123" && p.backup_id == id));
        assert_eq!(store.checksum().unwrap().as_deref(), Some("abc123"));
    }

    #[test]
    fn create_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("metadata.db");
        drop(MetadataStore::create(&db).unwrap());
        let store = MetadataStore::create(&db).unwrap();
        assert!(store.session().unwrap().is_none());
        assert!(store.checksum().unwrap().is_none());
    }

    #[test]
    fn duplicate_session_rolls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::create(&tmp.path().join("metadata.db")).unwrap();
        let id = record_sample(&mut store);
        let err = store
            .record(
                &NewSession {
                    id: sample_id(),
                    hostname: "box",
                    username: "ada",
                    total_source_size: 1,
                    compressed_size: 1,
                    checksum: "other",
                },
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, BackupError::Database(_)));
        assert_eq!(store.paths(id).unwrap().len(), 2);
    }

    #[test]
    fn checksum_falls_back_to_path_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::create(&tmp.path().join("metadata.db")).unwrap();
        record_sample(&mut store);
        store
            .conn
            .execute("UPDATE backup_metadata SET checksum = ''", [])
            .unwrap();
        assert_eq!(store.checksum().unwrap().as_deref(), Some("abc123"));
    }

    #[test]
    fn deleting_session_cascades_to_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::create(&tmp.path().join("metadata.db")).unwrap();
        let id = record_sample(&mut store);
        store
            .conn
            .execute("DELETE FROM backup_metadata WHERE id = ?1", params![id])
            .unwrap();
        assert!(store.paths(id).unwrap().is_empty());
    }

    #[test]
    fn open_read_only_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(MetadataStore::open_read_only(&tmp.path().join("missing.db")).is_err());
    }
}
