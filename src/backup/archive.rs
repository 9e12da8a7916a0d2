//! Streaming tar + zstd archive builder.
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use walkdir::WalkDir;

use super::collect::{SourcePath, is_excluded};
use crate::cancel::CancelToken;
use crate::error::{BackupError, BackupResult, IoContext as _, PipelineStage};
use crate::logging::Progress;

/// Compressor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// zstd level.
    pub level: i32,
    /// Worker threads; `0` means one per available core.
    pub threads: u32,
}

impl ArchiveOptions {
    /// Number of compression workers to request.
    #[must_use]
    pub fn workers(&self) -> u32 {
        if self.threads != 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .ok()
            .and_then(|n| u32::try_from(n.get()).ok())
            .unwrap_or(1)
    }
}

/// Sits between the tar builder and the compressor, counting the
/// uncompressed bytes that pass through.
///
/// `failed` records whether the compressor itself rejected a write, which
/// is how a failure is attributed to the compress stage rather than the
/// archive stage.
struct CountingWriter<'p, W: Write> {
    inner: W,
    written: u64,
    total: u64,
    failed: bool,
    progress: Option<&'p mut dyn Progress>,
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.write(buf) {
            Ok(n) => {
                self.written = self.written.saturating_add(n as u64);
                if let Some(progress) = self.progress.as_deref_mut() {
                    progress.advance(self.written.min(self.total), self.total);
                }
                Ok(n)
            }
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().inspect_err(|_| self.failed = true)
    }
}

type TarWriter<'p> = tar::Builder<CountingWriter<'p, zstd::stream::write::Encoder<'static, File>>>;

/// Write `sources` as a zstd-compressed tar stream to `dest`.
///
/// Entry names are the absolute source paths without their leading `/`,
/// so extraction under any directory reproduces the absolute layout.
/// Directories are walked in file-name order, symbolic links are stored
/// as links and each source's excluded subtree is never entered.  `total`
/// (the collected source size) scales progress updates; progress only
/// observes the byte count and never touches the stream.
///
/// Returns the compressed size in bytes.
///
/// # Errors
///
/// Returns [`BackupError::Pipeline`] naming the failing stage, or
/// [`BackupError::UserCancelled`] if interrupted between entries.
pub fn build_archive(
    dest: &Path,
    sources: &[SourcePath],
    total: u64,
    options: ArchiveOptions,
    cancel: &CancelToken,
    progress: Option<&mut dyn Progress>,
) -> BackupResult<u64> {
    let compress = |e| BackupError::pipeline(PipelineStage::Compress, e);

    let file = File::create(dest).map_err(compress)?;
    let mut encoder = zstd::stream::write::Encoder::new(file, options.level).map_err(compress)?;
    encoder.include_checksum(true).map_err(compress)?;
    let workers = options.workers();
    if workers > 1 {
        encoder.multithread(workers).map_err(compress)?;
    }

    let mut builder = tar::Builder::new(CountingWriter {
        inner: encoder,
        written: 0,
        total,
        failed: false,
        progress,
    });
    builder.follow_symlinks(false);

    for source in sources {
        append_source(&mut builder, source, cancel)?;
    }

    let mut counting = builder.into_inner().map_err(compress)?;
    if let Some(progress) = counting.progress.as_deref_mut() {
        progress.finish();
    }
    let file = counting.inner.finish().map_err(compress)?;
    file.sync_all().map_err(compress)?;
    Ok(file.metadata().at(dest)?.len())
}

fn append_source(
    builder: &mut TarWriter<'_>,
    source: &SourcePath,
    cancel: &CancelToken,
) -> BackupResult<()> {
    let walker = WalkDir::new(&source.path)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e.path(), source.exclude.as_deref()));
    for entry in walker {
        cancel.check()?;
        let entry = entry.map_err(|e| BackupError::pipeline(PipelineStage::Archive, e.into()))?;
        if is_socket(&entry) {
            continue;
        }
        let path = entry.path();
        let name = path.strip_prefix("/").unwrap_or(path);
        builder
            .append_path_with_name(path, name)
            .map_err(|e| stage_error(builder, e))?;
    }
    Ok(())
}

/// Attribute a failed append to the stage that caused it.
fn stage_error(builder: &TarWriter<'_>, e: io::Error) -> BackupError {
    let stage = if builder.get_ref().failed {
        PipelineStage::Compress
    } else {
        PipelineStage::Archive
    };
    BackupError::pipeline(stage, e)
}

#[cfg(unix)]
fn is_socket(entry: &walkdir::DirEntry) -> bool {
    use std::os::unix::fs::FileTypeExt as _;
    entry.file_type().is_socket()
}

#[cfg(not(unix))]
const fn is_socket(_entry: &walkdir::DirEntry) -> bool {
    false
}
