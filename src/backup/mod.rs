//! Backup pipeline: validate paths, build the archive, record metadata,
//! apply retention.
pub mod archive;
pub mod collect;
pub mod manifest;
pub mod metadata;
pub mod retention;

use std::fs;
use std::path::PathBuf;

use crate::cancel::CancelToken;
use crate::checksum::sha256_file;
use crate::config::{Config, paths};
use crate::error::{BackupError, BackupResult, IoContext as _};
use crate::lock::RootLock;
use crate::logging::{Log, Progress, StepStatus, human_size, run_step};
use crate::session::{SessionDir, SessionId};

pub use archive::ArchiveOptions;
pub use collect::{Collection, SourcePath};
pub use metadata::{BackupPath, BackupSession, MetadataStore};
pub use retention::RetentionReport;

/// What a backup run produced.
#[derive(Debug, Clone)]
pub struct BackupOutcome {
    /// The new session; `None` in dry-run mode.
    pub session: Option<SessionDir>,
    /// Validated source paths.
    pub collection: Collection,
    /// Archive size on disk (0 in dry-run mode).
    pub compressed_size: u64,
    /// Archive sha256 (`None` in dry-run mode).
    pub checksum: Option<String>,
    /// Retention result.
    pub retention: RetentionReport,
}

/// Removes a session directory on drop unless committed.
///
/// Covers every early return, including interruption, so a failed run
/// never leaves a half-written session behind.
#[derive(Debug)]
struct PartialSession {
    path: PathBuf,
    committed: bool,
}

impl PartialSession {
    fn create(session: &SessionDir) -> BackupResult<Self> {
        if session.path.exists() {
            return Err(BackupError::Configuration(format!(
                "session {} already exists; wait a second and retry",
                session.id
            )));
        }
        fs::create_dir_all(&session.path).at(&session.path)?;
        Ok(Self {
            path: session.path.clone(),
            committed: false,
        })
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialSession {
    fn drop(&mut self) {
        if !self.committed {
            fs::remove_dir_all(&self.path).ok();
        }
    }
}

/// Run one backup as session `id`.
///
/// Metadata and manifest are written only after the archive has been
/// produced and flushed.  In dry-run mode nothing is written: the plan and
/// the sessions retention would evict are logged instead.
///
/// # Errors
///
/// Returns the first failure; the partial session directory has been
/// removed by then.
pub fn run(
    config: &Config,
    id: SessionId,
    log: &dyn Log,
    cancel: &CancelToken,
    progress: Option<&mut dyn Progress>,
) -> BackupResult<BackupOutcome> {
    let collection = run_step(log, "Validate paths", || {
        let entries = paths::read_path_list(&config.path_list, &config.home, config.dry_run)?;
        collect::collect(&entries, &config.backup_root, log, cancel)
    })?;
    log.info(&format!(
        "{} path(s), {}",
        collection.sources.len(),
        human_size(collection.total_size)
    ));

    if config.dry_run {
        return plan_only(config, id, collection, log);
    }

    let _lock = RootLock::acquire(&config.backup_root)?;
    let session = SessionDir::new(&config.backup_root, id);
    let guard = PartialSession::create(&session)?;

    let options = ArchiveOptions {
        level: config.compression_level,
        threads: config.threads,
    };
    let compressed_size = run_step(log, "Build archive", || {
        archive::build_archive(
            &session.archive_path(),
            &collection.sources,
            collection.total_size,
            options,
            cancel,
            progress,
        )
    })?;

    let checksum = run_step(log, "Record metadata", || {
        record(config, &session, &collection, compressed_size, cancel)
    })?;
    guard.commit();

    log.info(&format!(
        "created {}: {} -> {} ({:.2}x)",
        session.id,
        human_size(collection.total_size),
        human_size(compressed_size),
        metadata::compression_ratio(collection.total_size, compressed_size)
    ));

    let retention = run_step(log, "Apply retention", || {
        retention::enforce(&config.backup_root, config.max_backups, false, log)
    })?;

    Ok(BackupOutcome {
        session: Some(session),
        collection,
        compressed_size,
        checksum: Some(checksum),
        retention,
    })
}

/// Hash the finished archive, then write the metadata store and manifest.
fn record(
    config: &Config,
    session: &SessionDir,
    collection: &Collection,
    compressed_size: u64,
    cancel: &CancelToken,
) -> BackupResult<String> {
    let checksum = sha256_file(&session.archive_path(), cancel)?;
    let mut store = MetadataStore::create(&session.metadata_path())?;
    let rows: Vec<metadata::NewPath<'_>> = collection
        .sources
        .iter()
        .map(|s| metadata::NewPath {
            path: &s.path,
            size: s.size,
            file_count: s.file_count,
        })
        .collect();
    store.record(
        &metadata::NewSession {
            id: session.id,
            hostname: &config.hostname,
            username: &config.username,
            total_source_size: collection.total_size,
            compressed_size,
            checksum: &checksum,
        },
        &rows,
    )?;
    manifest::write(&session.manifest_path(), collection.paths())?;
    Ok(checksum)
}

/// Dry-run: describe the backup and the retention it would trigger.
fn plan_only(
    config: &Config,
    id: SessionId,
    collection: Collection,
    log: &dyn Log,
) -> BackupResult<BackupOutcome> {
    let session = SessionDir::new(&config.backup_root, id);
    log.dry_run(&format!("would create {}", session.path.display()));
    for source in &collection.sources {
        log.dry_run(&format!(
            "would archive {} ({}, {} file(s))",
            source.path.display(),
            human_size(source.size),
            source.file_count
        ));
    }
    log.record_step("Build archive", StepStatus::DryRun, None);
    log.record_step("Record metadata", StepStatus::DryRun, None);

    // The new session would take one of the retained slots.
    let keep = config.max_backups.saturating_sub(1);
    let retention = retention::enforce(&config.backup_root, keep, true, log)?;
    log.record_step("Apply retention", StepStatus::DryRun, None);

    Ok(BackupOutcome {
        session: None,
        collection,
        compressed_size: 0,
        checksum: None,
        retention,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::host::HostInfo;
    use crate::logging::isolated_logger;
    use std::path::Path;

    fn config(tmp: &Path) -> Config {
        let host = HostInfo::with_home(tmp, "box", "ada");
        let mut config = Config::new(&host, &tmp.join("backups"), &tmp.join("paths.conf"));
        config.threads = 1;
        config
    }

    fn id(s: &str) -> SessionId {
        s.parse().unwrap()
    }

    #[test]
    fn partial_session_is_removed_unless_committed() {
        let tmp = tempfile::tempdir().unwrap();
        let session = SessionDir::new(tmp.path(), id("backup_20240101_000000"));
        drop(PartialSession::create(&session).unwrap());
        assert!(!session.path.exists());

        PartialSession::create(&session).unwrap().commit();
        assert!(session.path.exists());
    }

    #[test]
    fn existing_session_directory_is_configuration_error() {
        let tmp = tempfile::tempdir().unwrap();
        let session = SessionDir::new(tmp.path(), id("backup_20240101_000000"));
        fs::create_dir_all(&session.path).unwrap();
        let err = PartialSession::create(&session).unwrap_err();
        assert!(matches!(err, BackupError::Configuration(_)));
        assert!(session.path.exists());
    }

    #[test]
    fn run_writes_archive_manifest_and_metadata() {
        let (log, _log_tmp, _guard) = isolated_logger();
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a"), b"alpha").unwrap();
        let config = config(tmp.path());
        fs::write(&config.path_list, format!("{}\n", src.display())).unwrap();

        let outcome = run(&config, id("backup_20240101_000000"), &log, &CancelToken::new(), None)
            .unwrap();
        let session = outcome.session.unwrap();
        assert!(session.archive_path().is_file());
        assert_eq!(manifest::read(&session.manifest_path()).unwrap(), vec![src]);

        let store = MetadataStore::open_read_only(&session.metadata_path()).unwrap();
        let row = store.session().unwrap().unwrap();
        assert_eq!(row.compressed_size, outcome.compressed_size);
        assert_eq!(Some(row.checksum), outcome.checksum);
        assert!(!config.backup_root.join(crate::lock::LOCK_FILE).exists());
    }

    #[test]
    fn cancelled_run_leaves_no_session() {
        let (log, _log_tmp, _guard) = isolated_logger();
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("file");
        fs::write(&src, b"x").unwrap();
        let config = config(tmp.path());
        fs::write(&config.path_list, format!("{}\n", src.display())).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run(&config, id("backup_20240101_000000"), &log, &cancel, None).unwrap_err();
        assert!(matches!(err, BackupError::UserCancelled));
        assert!(
            crate::session::list_sessions(&config.backup_root)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (log, _log_tmp, _guard) = isolated_logger();
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("file");
        fs::write(&src, b"x").unwrap();
        let mut config = config(tmp.path());
        config.dry_run = true;
        fs::write(&config.path_list, format!("{}\n", src.display())).unwrap();

        let outcome = run(&config, id("backup_20240101_000000"), &log, &CancelToken::new(), None)
            .unwrap();
        assert!(outcome.session.is_none());
        assert!(!config.backup_root.exists());
        assert!(
            log.step_entries()
                .iter()
                .any(|s| s.name == "Build archive" && s.status == StepStatus::DryRun)
        );
    }
}
