//! Local backup and restore engine for workstation files.
//!
//! A backup reads a list of source paths, streams them through tar and zstd
//! into a timestamped session directory, records a SQLite metadata store
//! with the archive checksum, and evicts sessions beyond the retention
//! count.  A restore picks a session, verifies the archive, extracts it into
//! a staging directory and places each file under a conflict policy.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]**: settings file, path list and the resolved [`config::Config`]
//! - **[`backup`]**: path collection, archive builder, metadata, retention
//! - **[`restore`]**: session selection, verification, extraction, placement
//! - **[`commands`]**: top-level subcommand orchestration (`backup`, `restore`, `list`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod backup;
pub mod cancel;
pub mod checksum;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod lock;
pub mod logging;
pub mod prompt;
pub mod restore;
pub mod session;
