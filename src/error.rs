//! Domain-specific error types for the backup engine.
//!
//! Internal modules return [`BackupError`] so that the failure category
//! survives to the process boundary; command handlers convert it to
//! [`anyhow::Error`] via `?`, and `main` recovers the category with
//! [`exit_code_for`] to choose the exit status.
//!
//! # Error taxonomy
//!
//! ```text
//! BackupError
//! ├── Configuration      - missing/empty/invalid config or arguments
//! ├── Validation         - no source path resolved
//! ├── Pipeline           - archiving or compression stage failed
//! ├── Integrity          - corrupted archive or checksum mismatch
//! ├── UserCancelled      - interrupt signal or operator abort
//! ├── ConflictUnresolved - operator declined a restore conflict
//! ├── Io                 - filesystem failure outside the pipeline
//! └── Database           - metadata store failure
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Exit status for fatal configuration or operation failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status for user interruption (128 + SIGINT).
pub const EXIT_INTERRUPTED: u8 = 130;

/// Convenience alias used throughout the engine.
pub type BackupResult<T> = Result<T, BackupError>;

/// The two stages of the archive pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Walking sources and producing the tar stream.
    Archive,
    /// Compressing the tar stream and writing it to disk.
    Compress,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive => f.write_str("archive"),
            Self::Compress => f.write_str("compress"),
        }
    }
}

/// Top-level error type for backup and restore operations.
#[derive(Error, Debug)]
pub enum BackupError {
    /// The path list, settings file, or command-line arguments are unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// None of the configured source paths could be resolved.
    #[error("validation error: {0}")]
    Validation(String),

    /// A pipeline stage failed while producing or reading an archive.
    #[error("{stage} stage failed: {source}")]
    Pipeline {
        /// Stage that reported the failure.
        stage: PipelineStage,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The archive failed its integrity check or checksum comparison.
    #[error("integrity check failed for {}: {reason}", .archive.display())]
    Integrity {
        /// Archive that failed verification.
        archive: PathBuf,
        /// Human-readable description of the failure.
        reason: String,
    },

    /// The operation was interrupted or explicitly aborted by the operator.
    #[error("cancelled by user")]
    UserCancelled,

    /// The operator declined to resolve a restore conflict.
    #[error("restore conflict at {} was not resolved", .path.display())]
    ConflictUnresolved {
        /// Destination path that was left unresolved.
        path: PathBuf,
    },

    /// A filesystem operation outside the archive pipeline failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path involved in the failing operation.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The embedded metadata store reported an error.
    #[error("metadata store error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl BackupError {
    /// Build an [`BackupError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a [`BackupError::Pipeline`] error for `stage`.
    #[must_use]
    pub const fn pipeline(stage: PipelineStage, source: std::io::Error) -> Self {
        Self::Pipeline { stage, source }
    }

    /// Build an [`BackupError::Integrity`] error for `archive`.
    pub fn integrity(archive: &Path, reason: impl Into<String>) -> Self {
        Self::Integrity {
            archive: archive.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Process exit status associated with this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::UserCancelled => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

/// Attach a path to a bare [`std::io::Error`].
pub trait IoContext<T> {
    /// Convert the error into [`BackupError::Io`] naming `path`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped error if `self` is an error.
    fn at(self, path: &Path) -> BackupResult<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> BackupResult<T> {
        self.map_err(|e| BackupError::io(path, e))
    }
}

/// Pick the exit status for an error that reached the CLI boundary.
///
/// Walks the [`anyhow`] context chain looking for a [`BackupError`]; errors
/// that do not carry one are treated as ordinary failures.
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|e| e.downcast_ref::<BackupError>())
        .map_or(EXIT_FAILURE, BackupError::exit_code)
}
