//! Unpacking an archive into an isolated staging directory.
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;

use crate::cancel::CancelToken;
use crate::error::{BackupError, BackupResult, IoContext as _, PipelineStage};
use crate::logging::Log;

/// Entries listed by a dry-run preview.
pub const PREVIEW_LIMIT: usize = 50;

/// The first entries of an archive plus the total entry count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preview {
    /// Up to the requested number of entry names, in archive order.
    pub entries: Vec<String>,
    /// Number of entries in the whole archive.
    pub total: usize,
}

fn read_error(e: std::io::Error) -> BackupError {
    BackupError::pipeline(PipelineStage::Archive, e)
}

type ArchiveReader = tar::Archive<zstd::stream::read::Decoder<'static, std::io::BufReader<File>>>;

fn open(archive: &Path) -> BackupResult<ArchiveReader> {
    let file = File::open(archive).at(archive)?;
    let decoder = zstd::stream::read::Decoder::new(file).map_err(read_error)?;
    Ok(tar::Archive::new(decoder))
}

/// Keep only plain relative components; anything else could escape the
/// staging directory.
fn sanitize(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

/// List archive entries without extracting anything.
///
/// # Errors
///
/// Returns an error if the archive cannot be read.
pub fn preview(archive: &Path, limit: usize, cancel: &CancelToken) -> BackupResult<Preview> {
    let mut tar = open(archive)?;
    let mut preview = Preview::default();
    for entry in tar.entries().map_err(read_error)? {
        cancel.check()?;
        let entry = entry.map_err(read_error)?;
        if preview.entries.len() < limit {
            let name = entry.path().map_err(read_error)?;
            preview.entries.push(format!("/{}", name.display()));
        }
        preview.total += 1;
    }
    Ok(preview)
}

/// Attributes recorded for one archived directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirMeta {
    /// Permission bits.
    pub mode: Option<u32>,
    /// Modification time in seconds since the epoch.
    pub mtime: Option<u64>,
}

impl DirMeta {
    /// Set the recorded modification time and mode on `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if either attribute cannot be set.
    pub fn apply(&self, dir: &Path) -> BackupResult<()> {
        if let Some(secs) = self.mtime {
            let when = std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs);
            File::open(dir).and_then(|f| f.set_modified(when)).at(dir)?;
        }
        if let Some(mode) = self.mode {
            set_mode(dir, mode)?;
        }
        Ok(())
    }
}

/// An extracted archive.
///
/// Staged directories keep default, writable permissions so their contents
/// can be moved out and the tree removed; the archived directory attributes
/// are kept aside in [`Staging::dirs`] for the placer.
#[derive(Debug)]
pub struct Staging {
    dir: TempDir,
    dirs: BTreeMap<PathBuf, DirMeta>,
}

impl Staging {
    /// Root of the staged tree.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Archived directory attributes, keyed by path relative to
    /// [`Staging::path`].
    #[must_use]
    pub const fn dirs(&self) -> &BTreeMap<PathBuf, DirMeta> {
        &self.dirs
    }
}

/// Extract `archive` into a fresh temporary directory.
///
/// The directory is removed when the returned [`Staging`] is dropped, on
/// every exit path.  File permissions and modification times are
/// preserved; directory attributes are recorded rather than applied.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or a file cannot be
/// written, or [`BackupError::UserCancelled`] if interrupted.
pub fn extract_to_staging(
    archive: &Path,
    log: &dyn Log,
    cancel: &CancelToken,
) -> BackupResult<Staging> {
    let dir = tempfile::Builder::new()
        .prefix("dotbackup-restore-")
        .tempdir()
        .map_err(|e| BackupError::io(std::env::temp_dir(), e))?;
    log.debug(&format!("staging in {}", dir.path().display()));

    let mut tar = open(archive)?;
    tar.set_preserve_permissions(true);
    tar.set_preserve_mtime(true);
    tar.set_overwrite(true);

    let mut dirs = BTreeMap::new();
    for entry in tar.entries().map_err(read_error)? {
        cancel.check()?;
        let mut entry = entry.map_err(read_error)?;
        let raw = entry.path().map_err(read_error)?.into_owned();
        let Some(rel) = sanitize(&raw) else {
            log.warn(&format!("ignoring unsafe archive entry {}", raw.display()));
            continue;
        };
        let dest = dir.path().join(&rel);
        if entry.header().entry_type().is_dir() {
            fs::create_dir_all(&dest).at(&dest)?;
            let meta = DirMeta {
                mode: entry.header().mode().ok(),
                mtime: entry.header().mtime().ok(),
            };
            dirs.insert(rel, meta);
            continue;
        }
        entry.unpack_in(dir.path()).map_err(|e| BackupError::io(&dest, e))?;
    }
    Ok(Staging { dir, dirs })
}

#[cfg(unix)]
fn set_mode(dir: &Path, mode: u32) -> BackupResult<()> {
    use std::os::unix::fs::PermissionsExt as _;
    fs::set_permissions(dir, fs::Permissions::from_mode(mode & 0o7777)).at(dir)
}

#[cfg(not(unix))]
const fn set_mode(_dir: &Path, _mode: u32) -> BackupResult<()> {
    Ok(())
}
