//! Moving staged files to their destinations under a conflict policy.
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::error::{BackupError, BackupResult, IoContext as _};
use crate::logging::Log;
use crate::prompt::Prompter;

use super::extract::DirMeta;

/// How to treat a destination file that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Keep the existing file and discard the restored copy.
    Skip,
    /// Replace the existing file.
    Overwrite,
    /// Rename the existing file aside, then place the restored copy.
    Backup,
    /// Ask for every conflict.
    #[serde(alias = "prompt")]
    #[value(alias = "prompt")]
    Ask,
}

impl ConflictPolicy {
    /// `Ask` when someone can answer, `Skip` otherwise.
    #[must_use]
    pub const fn default_for(interactive: bool) -> Self {
        if interactive { Self::Ask } else { Self::Skip }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
            Self::Backup => "backup",
            Self::Ask => "ask",
        })
    }
}

/// What to do with one conflicting file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// Leave the destination alone.
    Skip,
    /// Replace the destination.
    Overwrite,
    /// Move the destination aside first.
    Backup,
}

/// One answer to the per-file conflict prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    /// Apply an action to this file only.
    Once(ConflictAction),
    /// Overwrite this and every later conflict.
    OverwriteAll,
    /// Skip this and every later conflict.
    SkipAll,
    /// Abandon the restore.
    Quit,
}

/// Text shown for the per-file conflict prompt.
pub const PROMPT_CHOICES: &str =
    "[s]kip, [o]verwrite, [b]ackup, overwrite [a]ll, skip all [n], [q]uit";

/// Interpret one line typed at the conflict prompt.
#[must_use]
pub fn parse_answer(input: &str) -> Option<PromptAnswer> {
    match input.trim().to_ascii_lowercase().as_str() {
        "s" | "skip" => Some(PromptAnswer::Once(ConflictAction::Skip)),
        "o" | "overwrite" => Some(PromptAnswer::Once(ConflictAction::Overwrite)),
        "b" | "backup" => Some(PromptAnswer::Once(ConflictAction::Backup)),
        "a" | "all" => Some(PromptAnswer::OverwriteAll),
        "n" | "none" => Some(PromptAnswer::SkipAll),
        "q" | "quit" => Some(PromptAnswer::Quit),
        _ => None,
    }
}

const MAX_PROMPT_ATTEMPTS: usize = 3;

/// Applies a [`ConflictPolicy`], consulting the operator for `Ask`.
pub struct ConflictResolver<'a> {
    policy: ConflictPolicy,
    sticky: Option<ConflictAction>,
    prompter: &'a dyn Prompter,
}

impl fmt::Debug for ConflictResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictResolver")
            .field("policy", &self.policy)
            .field("sticky", &self.sticky)
            .finish_non_exhaustive()
    }
}

impl<'a> ConflictResolver<'a> {
    /// Resolver for `policy`; `prompter` is only used by `Ask`.
    #[must_use]
    pub fn new(policy: ConflictPolicy, prompter: &'a dyn Prompter) -> Self {
        Self {
            policy,
            sticky: None,
            prompter,
        }
    }

    /// Decide what to do about the existing file at `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::ConflictUnresolved`] if the operator quits,
    /// input ends, or no valid answer is given after three attempts.
    pub fn resolve(&mut self, dest: &Path) -> BackupResult<ConflictAction> {
        match self.policy {
            ConflictPolicy::Skip => return Ok(ConflictAction::Skip),
            ConflictPolicy::Overwrite => return Ok(ConflictAction::Overwrite),
            ConflictPolicy::Backup => return Ok(ConflictAction::Backup),
            ConflictPolicy::Ask => {}
        }
        if let Some(action) = self.sticky {
            return Ok(action);
        }

        let unresolved = || BackupError::ConflictUnresolved {
            path: dest.to_path_buf(),
        };
        let prompt = format!("{} exists. {PROMPT_CHOICES}: ", dest.display());
        for _ in 0..MAX_PROMPT_ATTEMPTS {
            let Some(input) = self
                .prompter
                .read_line(&prompt)
                .map_err(|e| BackupError::io(dest, e))?
            else {
                return Err(unresolved());
            };
            match parse_answer(&input) {
                Some(PromptAnswer::Once(action)) => return Ok(action),
                Some(PromptAnswer::OverwriteAll) => {
                    self.sticky = Some(ConflictAction::Overwrite);
                    return Ok(ConflictAction::Overwrite);
                }
                Some(PromptAnswer::SkipAll) => {
                    self.sticky = Some(ConflictAction::Skip);
                    return Ok(ConflictAction::Skip);
                }
                Some(PromptAnswer::Quit) => return Err(unresolved()),
                None => self.prompter.show(&format!("unrecognised answer '{}'", input.trim())),
            }
        }
        Err(unresolved())
    }
}

/// Counts reported after placement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementReport {
    /// Files and links placed at their destination.
    pub restored: usize,
    /// Conflicting files left untouched.
    pub skipped: usize,
    /// Pre-existing files moved aside, as their new paths.
    pub backed_up: Vec<PathBuf>,
    /// Directories created.
    pub dirs_created: usize,
}

/// Sibling path that an existing file is moved to under the backup policy:
/// `<name>.backup_<YYYYMMDD_HHMMSS>`, with a numeric suffix if taken.
#[must_use]
pub fn backup_name(dest: &Path, stamp: &str) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".backup_{stamp}"));
    let candidate = dest.with_file_name(&name);
    if candidate.symlink_metadata().is_err() {
        return candidate;
    }
    let mut n = 1u32;
    loop {
        let mut numbered = name.clone();
        numbered.push(format!(".{n}"));
        let candidate = dest.with_file_name(numbered);
        if candidate.symlink_metadata().is_err() {
            return candidate;
        }
        n += 1;
    }
}

/// Move everything under `staging` to the same relative path under
/// `target_root`.
///
/// Directories are created as needed and receive their archived attributes
/// from `dirs` once every file is in place, deepest first, so a read-only
/// directory cannot block its own contents.  Files and symbolic links whose
/// destination exists go through `resolver`.  A conflicting destination of
/// the other kind (a directory where a file belongs, or the reverse) is
/// never replaced; it is skipped with a warning together with everything
/// beneath it.
///
/// # Errors
///
/// Returns the first filesystem failure, [`BackupError::UserCancelled`] if
/// interrupted, or [`BackupError::ConflictUnresolved`] from the resolver.
pub fn place(
    staging: &Path,
    dirs: &BTreeMap<PathBuf, DirMeta>,
    target_root: &Path,
    resolver: &mut ConflictResolver<'_>,
    log: &dyn Log,
    cancel: &CancelToken,
) -> BackupResult<PlacementReport> {
    let entries: Vec<walkdir::DirEntry> = WalkDir::new(staging)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .collect::<Result<_, _>>()
        .map_err(|e| BackupError::io(staging, e.into()))?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut report = PlacementReport::default();
    let mut created: Vec<(PathBuf, DirMeta)> = Vec::new();
    let mut blocked: Vec<PathBuf> = Vec::new();

    for entry in entries {
        cancel.check()?;
        let rel = entry.path().strip_prefix(staging).unwrap_or(entry.path());
        let dest = target_root.join(rel);

        if blocked.iter().any(|b| rel.starts_with(b)) {
            if !entry.file_type().is_dir() {
                report.skipped += 1;
            }
            continue;
        }

        if entry.file_type().is_dir() {
            if dest.is_dir() {
                continue;
            }
            if dest.symlink_metadata().is_ok() {
                log.warn(&format!(
                    "not replacing file {} with a directory",
                    dest.display()
                ));
                blocked.push(rel.to_path_buf());
                continue;
            }
            fs::create_dir_all(&dest).at(&dest)?;
            created.push((dest, dirs.get(rel).copied().unwrap_or_default()));
            report.dirs_created += 1;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }

        if let Ok(existing) = dest.symlink_metadata() {
            if existing.is_dir() {
                log.warn(&format!(
                    "not replacing directory {} with a file",
                    dest.display()
                ));
                report.skipped += 1;
                continue;
            }
            match resolver.resolve(&dest)? {
                ConflictAction::Skip => {
                    log.debug(&format!("kept existing {}", dest.display()));
                    report.skipped += 1;
                    continue;
                }
                ConflictAction::Overwrite => {}
                ConflictAction::Backup => {
                    let aside = backup_name(&dest, &stamp);
                    fs::rename(&dest, &aside).at(&dest)?;
                    log.info(&format!("moved {} to {}", dest.display(), aside.display()));
                    report.backed_up.push(aside);
                }
            }
        }

        move_into_place(entry.path(), &dest)?;
        log.debug(&format!("restored {}", dest.display()));
        report.restored += 1;
    }

    // Deepest first so a read-only parent cannot block a child.
    created.sort_by(|a, b| b.0.cmp(&a.0));
    for (dir, meta) in &created {
        meta.apply(dir)?;
    }
    Ok(report)
}

/// Rename `src` over `dest`, copying when they live on different
/// filesystems.  `dest` is replaced in one step either way, so a failure
/// leaves any existing file intact.
fn move_into_place(src: &Path, dest: &Path) -> BackupResult<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_across(src, dest),
        Err(e) => Err(BackupError::io(dest, e)),
    }
}

/// Copy `src` to a sibling of `dest`, then rename the sibling over it.
fn copy_across(src: &Path, dest: &Path) -> BackupResult<()> {
    let mut name = std::ffi::OsString::from(".");
    name.push(dest.file_name().unwrap_or_default());
    name.push(format!(".dotbackup-{}", std::process::id()));
    let partial = dest.with_file_name(name);
    if partial.symlink_metadata().is_ok() {
        fs::remove_file(&partial).at(&partial)?;
    }

    let result = copy_entry(src, &partial)
        .and_then(|()| fs::rename(&partial, dest).at(dest));
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn copy_entry(src: &Path, dest: &Path) -> BackupResult<()> {
    let meta = src.symlink_metadata().at(src)?;
    if meta.file_type().is_symlink() {
        let target = fs::read_link(src).at(src)?;
        return make_symlink(&target, dest);
    }
    fs::copy(src, dest).at(dest)?;
    if let Ok(modified) = meta.modified() {
        fs::File::options()
            .write(true)
            .open(dest)
            .and_then(|f| f.set_modified(modified))
            .at(dest)?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &Path, dest: &Path) -> BackupResult<()> {
    std::os::unix::fs::symlink(target, dest).at(dest)
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, dest: &Path) -> BackupResult<()> {
    Err(BackupError::io(
        dest,
        io::Error::new(io::ErrorKind::Unsupported, "symbolic links are not supported"),
    ))
}
