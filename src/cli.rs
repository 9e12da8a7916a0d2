use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::restore::ConflictPolicy;

/// Top-level CLI entry point for the backup engine.
#[derive(Parser, Debug)]
#[command(
    name = "dotbackup",
    about = "Timestamped local backups with verified, conflict-aware restore",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Preview actions without writing anything
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Override the backup root directory
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Read source paths from this file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Read settings from this TOML file
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new backup session
    Backup(BackupOpts),
    /// Restore files from a backup session
    Restore(RestoreOpts),
    /// List backup sessions
    List,
    /// Print version information
    Version,
}

impl Command {
    /// Subcommand name, used to name the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Backup(_) => "backup",
            Self::Restore(_) => "restore",
            Self::List => "list",
            Self::Version => "version",
        }
    }
}

/// Options for the `backup` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct BackupOpts {
    /// Show a progress line while archiving
    #[arg(long)]
    pub progress: bool,

    /// Number of sessions to keep
    #[arg(long, value_name = "N")]
    pub max_backups: Option<usize>,

    /// zstd compression level (1-19)
    #[arg(long, value_name = "LEVEL")]
    pub level: Option<i32>,

    /// Compression threads (0 = one per core)
    #[arg(long, value_name = "N")]
    pub threads: Option<u32>,
}

/// Options for the `restore` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct RestoreOpts {
    /// Session to restore, e.g. backup_20240131_235959
    pub session: Option<String>,

    /// List sessions and exit
    #[arg(short, long)]
    pub list: bool,

    /// Choose the session from a menu
    #[arg(short, long, conflicts_with = "session")]
    pub interactive: bool,

    /// What to do with files that already exist
    #[arg(long, value_enum)]
    pub policy: Option<ConflictPolicy>,

    /// Restore under this directory instead of /
    #[arg(long, value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Do not ask for confirmation before restoring
    #[arg(short, long)]
    pub yes: bool,
}
