// Shared helpers for integration tests.
//
// Provides a temporary home, source tree and backup root with a fluent
// builder so each integration test can set up an isolated environment
// without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dotbackup_cli::backup::{self, BackupOutcome};
use dotbackup_cli::cancel::CancelToken;
use dotbackup_cli::config::Config;
use dotbackup_cli::host::HostInfo;
use dotbackup_cli::logging::Logger;
use dotbackup_cli::prompt::Prompter;
use dotbackup_cli::restore::{self, ConflictPolicy, RestoreOutcome, RestoreRequest, SessionChoice};
use dotbackup_cli::session::SessionId;

/// An isolated workstation backed by a [`tempfile::TempDir`].
///
/// `home/` holds the source files, `backups/` is the backup root and
/// `paths.conf` the path list.  Everything is deleted on drop.
pub struct TestEnv {
    /// Temporary directory containing the whole environment.
    pub root: tempfile::TempDir,
    /// Resolved configuration pointing into `root`.
    pub config: Config,
}

impl TestEnv {
    /// Home directory holding the source files.
    pub fn home(&self) -> PathBuf {
        self.root.path().join("home")
    }

    /// Backup root.
    pub fn backup_root(&self) -> &Path {
        &self.config.backup_root
    }

    /// Absolute path of `relative` under the home directory.
    pub fn source(&self, relative: &str) -> PathBuf {
        self.home().join(relative)
    }

    /// Where `path` lands when restored under the configured target root.
    pub fn restored(&self, path: &Path) -> PathBuf {
        self.config
            .target_root
            .join(path.strip_prefix("/").unwrap_or(path))
    }

    /// Run a backup with the given session id.
    pub fn backup(
        &self,
        id: &str,
        log: &Logger,
    ) -> dotbackup_cli::error::BackupResult<BackupOutcome> {
        let id: SessionId = id.parse().expect("valid session id");
        backup::run(&self.config, id, log, &CancelToken::new(), None)
    }

    /// Restore `session` without asking for confirmation.
    pub fn restore(
        &self,
        session: &str,
        prompter: &dyn Prompter,
        log: &Logger,
    ) -> dotbackup_cli::error::BackupResult<RestoreOutcome> {
        let request = RestoreRequest {
            choice: SessionChoice::Explicit(session.to_string()),
            assume_yes: true,
        };
        restore::run(&self.config, &request, prompter, log, &CancelToken::new())
    }
}

/// Fluent builder for [`TestEnv`].
pub struct TestEnvBuilder {
    root: tempfile::TempDir,
    entries: Vec<String>,
    max_backups: usize,
    policy: ConflictPolicy,
    in_place: bool,
    root_in_home: bool,
}

impl TestEnvBuilder {
    /// Begin building an environment with an empty home directory.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(root.path().join("home")).expect("create home");
        Self {
            root,
            entries: Vec::new(),
            max_backups: 5,
            policy: ConflictPolicy::Skip,
            in_place: false,
            root_in_home: false,
        }
    }

    /// Write `content` to `home/<relative>`, creating parent directories.
    pub fn with_file(self, relative: &str, content: &[u8]) -> Self {
        let path = self.root.path().join("home").join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create source parent");
        }
        std::fs::write(&path, content).expect("write source file");
        self
    }

    /// Add `home/<relative>` to the path list (whether or not it exists).
    pub fn with_entry(mut self, relative: &str) -> Self {
        let path = self.root.path().join("home").join(relative);
        self.entries.push(path.display().to_string());
        self
    }

    /// Retention count.
    pub const fn max_backups(mut self, n: usize) -> Self {
        self.max_backups = n;
        self
    }

    /// Restore conflict policy.
    pub const fn policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Restore to the original absolute paths instead of under `restore/`.
    pub const fn in_place(mut self) -> Self {
        self.in_place = true;
        self
    }

    /// Put the backup root at `home/backups` instead of beside `home/`.
    pub const fn root_in_home(mut self) -> Self {
        self.root_in_home = true;
        self
    }

    /// Write the path list and return the finished environment.
    pub fn build(self) -> TestEnv {
        let path_list = self.root.path().join("paths.conf");
        let mut list = String::from("# test sources\n");
        for entry in &self.entries {
            list.push_str(entry);
            list.push('\n');
        }
        std::fs::write(&path_list, list).expect("write path list");

        let host = HostInfo::with_home(&self.root.path().join("home"), "testbox", "tester");
        let backup_root = if self.root_in_home {
            self.root.path().join("home/backups")
        } else {
            self.root.path().join("backups")
        };
        let mut config = Config::new(&host, &backup_root, &path_list);
        config.max_backups = self.max_backups;
        config.threads = 1;
        config.conflict_policy = self.policy;
        if !self.in_place {
            config.target_root = self.root.path().join("restore");
        }
        TestEnv {
            root: self.root,
            config,
        }
    }
}

/// A logger that writes nothing to disk.
pub fn logger() -> Logger {
    Logger::new(None)
}

/// A [`Prompter`] that replays fixed answers, then reports end of input.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    /// Every line passed to [`Prompter::show`].
    pub shown: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// Prompter answering with `answers` in order.
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(ToString::to_string).collect()),
            shown: Mutex::new(Vec::new()),
        }
    }

    /// Prompter that must never be asked anything.
    pub fn silent() -> Self {
        Self::new(&[])
    }
}

impl Prompter for ScriptedPrompter {
    fn read_line(&self, _prompt: &str) -> io::Result<Option<String>> {
        Ok(self.answers.lock().expect("answers lock").pop_front())
    }

    fn show(&self, line: &str) {
        self.shown.lock().expect("shown lock").push(line.to_string());
    }
}
