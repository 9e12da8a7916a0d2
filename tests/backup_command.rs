#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the backup pipeline.
//!
//! These tests run [`backup::run`] end to end against a temporary home
//! directory and check the session directory, the metadata store and the
//! manifest it produces.

mod common;

use std::fs;

use common::{TestEnvBuilder, logger};
use dotbackup_cli::backup::{MetadataStore, manifest};
use dotbackup_cli::error::BackupError;
use dotbackup_cli::restore::select::summarize_all;
use dotbackup_cli::session::list_sessions;

// ---------------------------------------------------------------------------
// Mixed valid and invalid paths
// ---------------------------------------------------------------------------

/// One existing directory with two files and one missing path produce a
/// single session, one warning and one recorded path.
#[test]
fn missing_path_is_warned_and_skipped() {
    let env = TestEnvBuilder::new()
        .with_file("notes/a.txt", &[b'a'; 200])
        .with_file("notes/b.txt", &[b'b'; 300])
        .with_entry("notes")
        .with_entry("does-not-exist")
        .build();
    let log = logger();

    let outcome = env.backup("backup_20240301_120000", &log).unwrap();

    assert_eq!(outcome.collection.sources.len(), 1);
    assert_eq!(outcome.collection.total_size, 500);
    assert_eq!(log.warnings().len(), 1);
    assert!(log.warnings()[0].contains("does-not-exist"));

    let sessions = list_sessions(env.backup_root()).unwrap();
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert!(session.archive_path().is_file());

    let store = MetadataStore::open_read_only(&session.metadata_path()).unwrap();
    let recorded = store.session().unwrap().expect("session row");
    assert_eq!(recorded.total_source_size, 500);
    assert_eq!(recorded.hostname, "testbox");
    assert_eq!(recorded.username, "tester");
    assert_eq!(Some(recorded.checksum.clone()), outcome.checksum);

    let paths = store.paths(recorded.id).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].original_path, env.source("notes"));
    assert_eq!(paths[0].file_count, 2);
    assert_eq!(paths[0].size, 500);

    let summaries = summarize_all(env.backup_root()).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].path_count, 1);
}

/// The manifest lists exactly the validated source paths.
#[test]
fn manifest_lists_validated_paths() {
    let env = TestEnvBuilder::new()
        .with_file(".bashrc", b"export EDITOR=vi\n")
        .with_file(".config/app/settings.toml", b"theme = \"dark\"\n")
        .with_entry(".bashrc")
        .with_entry(".config/app")
        .build();
    let log = logger();

    let outcome = env.backup("backup_20240301_120000", &log).unwrap();
    let session = outcome.session.expect("session created");

    let listed = manifest::read(&session.manifest_path()).unwrap();
    assert_eq!(listed, vec![env.source(".bashrc"), env.source(".config/app")]);
}

/// The archive size reported matches the file on disk.
#[test]
fn compressed_size_matches_archive() {
    let env = TestEnvBuilder::new()
        .with_file("data.bin", &vec![7u8; 64 * 1024])
        .with_entry("data.bin")
        .build();
    let log = logger();

    let outcome = env.backup("backup_20240301_120000", &log).unwrap();
    let session = outcome.session.expect("session created");
    let on_disk = fs::metadata(session.archive_path()).unwrap().len();
    assert_eq!(outcome.compressed_size, on_disk);
    assert!(outcome.compressed_size < 64 * 1024);
}

/// A backup root inside a listed directory is left out of the archive, so
/// sessions never contain earlier sessions or themselves.
#[test]
fn backup_root_inside_source_is_not_archived() {
    let env = TestEnvBuilder::new()
        .with_file("a_data.bin", &vec![3u8; 8 * 1024])
        .with_entry("")
        .root_in_home()
        .build();
    let log = logger();

    env.backup("backup_20240301_120000", &log).unwrap();
    let second = env.backup("backup_20240301_120001", &log).unwrap();

    assert_eq!(second.collection.total_size, 8 * 1024);
    assert_eq!(second.collection.sources[0].file_count, 1);
    assert!(log.warnings().iter().all(|w| w.contains("contains the backup root")));

    let session = second.session.expect("session created");
    let decoder =
        zstd::stream::read::Decoder::new(fs::File::open(session.archive_path()).unwrap()).unwrap();
    let names: Vec<String> = tar::Archive::new(decoder)
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.ends_with("a_data.bin")));
    assert!(names.iter().all(|n| !n.contains("/backups")));
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

/// A path list where nothing exists is a validation error and leaves no
/// session behind.
#[test]
fn no_valid_paths_is_validation_error() {
    let env = TestEnvBuilder::new().with_entry("missing").build();
    let log = logger();

    let err = env.backup("backup_20240301_120000", &log).unwrap_err();
    assert!(matches!(err, BackupError::Validation(_)));
    assert!(list_sessions(env.backup_root()).unwrap().is_empty());
}

/// Reusing a session id fails instead of overwriting the earlier session.
#[test]
fn same_second_session_is_rejected() {
    let env = TestEnvBuilder::new()
        .with_file("a.txt", b"a")
        .with_entry("a.txt")
        .build();
    let log = logger();

    env.backup("backup_20240301_120000", &log).unwrap();
    let err = env.backup("backup_20240301_120000", &log).unwrap_err();
    assert!(matches!(err, BackupError::Configuration(_)));
    assert_eq!(list_sessions(env.backup_root()).unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

/// A dry run validates paths but writes nothing under the backup root.
#[test]
fn dry_run_writes_nothing() {
    let mut env = TestEnvBuilder::new()
        .with_file("a.txt", b"hello")
        .with_entry("a.txt")
        .build();
    env.config.dry_run = true;
    let log = logger();

    let outcome = env.backup("backup_20240301_120000", &log).unwrap();

    assert!(outcome.session.is_none());
    assert!(outcome.checksum.is_none());
    assert_eq!(outcome.collection.sources.len(), 1);
    assert!(!env.backup_root().exists());
}
