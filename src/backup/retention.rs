//! Eviction of old sessions beyond the retention count.
use std::fs;
use std::path::Path;

use crate::error::{BackupResult, IoContext as _};
use crate::logging::Log;
use crate::session::{SessionDir, list_sessions};

/// Outcome of one retention pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// Sessions still on disk, most recent first.
    pub kept: Vec<SessionDir>,
    /// Sessions deleted (or, in dry-run, that would be deleted).
    pub removed: Vec<SessionDir>,
}

/// Split `sessions` (most recent first) into kept and evicted sets.
#[must_use]
pub fn plan(mut sessions: Vec<SessionDir>, keep: usize) -> (Vec<SessionDir>, Vec<SessionDir>) {
    sessions.sort_by(|a, b| b.id.cmp(&a.id));
    let evicted = sessions.split_off(keep.min(sessions.len()));
    (sessions, evicted)
}

/// Keep the `keep` most recent sessions under `root` and delete the rest.
///
/// Running it again without new sessions deletes nothing.  In dry-run mode
/// the deletions are only logged.
///
/// # Errors
///
/// Returns an error if the root cannot be listed or a directory cannot be
/// removed.
pub fn enforce(
    root: &Path,
    keep: usize,
    dry_run: bool,
    log: &dyn Log,
) -> BackupResult<RetentionReport> {
    let (kept, removed) = plan(list_sessions(root)?, keep);
    for session in &removed {
        if dry_run {
            log.dry_run(&format!("would remove {}", session.id));
            continue;
        }
        fs::remove_dir_all(&session.path).at(&session.path)?;
        log.info(&format!("removed {}", session.id));
    }
    log.debug(&format!(
        "retention: kept {}, removed {}",
        kept.len(),
        removed.len()
    ));
    Ok(RetentionReport { kept, removed })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use crate::session::SessionId;

    fn make(root: &Path, names: &[&str]) {
        for name in names {
            fs::create_dir_all(root.join(name)).unwrap();
        }
    }

    fn names(sessions: &[SessionDir]) -> Vec<String> {
        sessions.iter().map(|s| s.id.to_string()).collect()
    }

    #[test]
    fn plan_keeps_most_recent() {
        let root = Path::new("/b");
        let sessions: Vec<SessionDir> = [
            "backup_20240101_000000",
            "backup_20240103_000000",
            "backup_20240102_000000",
        ]
        .iter()
        .map(|n| SessionDir::new(root, n.parse::<SessionId>().unwrap()))
        .collect();
        let (kept, evicted) = plan(sessions, 2);
        assert_eq!(
            names(&kept),
            vec!["backup_20240103_000000", "backup_20240102_000000"]
        );
        assert_eq!(names(&evicted), vec!["backup_20240101_000000"]);
    }

    #[test]
    fn plan_with_room_evicts_nothing() {
        let (kept, evicted) = plan(Vec::new(), 3);
        assert!(kept.is_empty() && evicted.is_empty());
    }

    #[test]
    fn enforce_deletes_and_is_idempotent() {
        let (log, _log_tmp, _guard) = isolated_logger();
        let tmp = tempfile::tempdir().unwrap();
        make(
            tmp.path(),
            &["backup_20240101_000000", "backup_20240102_000000", "backup_20240103_000000"],
        );
        fs::write(tmp.path().join("backup_20240101_000000/backup.tar.zst"), b"x").unwrap();

        let first = enforce(tmp.path(), 2, false, &log).unwrap();
        assert_eq!(names(&first.removed), vec!["backup_20240101_000000"]);
        assert!(!tmp.path().join("backup_20240101_000000").exists());

        let second = enforce(tmp.path(), 2, false, &log).unwrap();
        assert!(second.removed.is_empty());
        assert_eq!(second.kept.len(), 2);
    }

    #[test]
    fn enforce_dry_run_keeps_everything() {
        let (log, _log_tmp, _guard) = isolated_logger();
        let tmp = tempfile::tempdir().unwrap();
        make(tmp.path(), &["backup_20240101_000000", "backup_20240102_000000"]);
        let report = enforce(tmp.path(), 1, true, &log).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(tmp.path().join("backup_20240101_000000").exists());
        let contents = fs::read_to_string(log.log_path().unwrap()).unwrap();
        assert!(contents.contains("would remove backup_20240101_000000"));
    }

    #[test]
    fn unrelated_directories_are_untouched() {
        let (log, _log_tmp, _guard) = isolated_logger();
        let tmp = tempfile::tempdir().unwrap();
        make(tmp.path(), &["backup_20240101_000000", "photos", "backup_latest"]);
        let report = enforce(tmp.path(), 1, false, &log).unwrap();
        assert!(report.removed.is_empty());
        assert!(tmp.path().join("photos").exists());
        assert!(tmp.path().join("backup_latest").exists());
    }
}
