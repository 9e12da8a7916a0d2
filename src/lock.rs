//! Advisory lock guarding a backup root against concurrent runs.
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, BackupResult, IoContext as _};

/// Name of the lock file created inside the backup root.
pub const LOCK_FILE: &str = ".dotbackup.lock";

/// Exclusive ownership of a backup root for the lifetime of the value.
///
/// The lock is a plain file created with `create_new`, holding the owning
/// process id.  It is removed on drop.  A stale lock left by a crashed
/// process must be removed by hand; the error message names the file.
#[derive(Debug)]
pub struct RootLock {
    path: PathBuf,
}

impl RootLock {
    /// Create `root` if needed and take the lock.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Configuration`] if another process holds the
    /// lock, or [`BackupError::Io`] if the root or lock file cannot be created.
    pub fn acquire(root: &Path) -> BackupResult<Self> {
        fs::create_dir_all(root).at(root)?;
        let path = root.join(LOCK_FILE);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id()).at(&path)?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(BackupError::Configuration(format!(
                    "another backup or restore is running against {} (remove {} if it is stale)",
                    root.display(),
                    path.display()
                )))
            }
            Err(e) => Err(BackupError::io(path, e)),
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        fs::remove_file(&self.path).ok();
    }
}
