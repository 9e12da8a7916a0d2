//! Pre-restore integrity checks.
use std::fs::File;
use std::io::{self, Read as _};

use crate::backup::MetadataStore;
use crate::cancel::CancelToken;
use crate::checksum::sha256_file;
use crate::error::{BackupError, BackupResult};
use crate::logging::Log;
use crate::session::SessionDir;

const CHUNK: usize = 64 * 1024;

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// sha256 of the archive as it is now.
    pub checksum: String,
    /// Whether a recorded checksum was found and compared.
    pub compared: bool,
}

/// Decode the whole archive, discarding the output.
///
/// zstd frames carry a content checksum, so a corrupted block fails here
/// as soon as it is reached.
///
/// # Errors
///
/// Returns [`BackupError::Integrity`] if the archive is missing or fails to
/// decode, or [`BackupError::UserCancelled`] if interrupted.
pub fn test_integrity(session: &SessionDir, cancel: &CancelToken) -> BackupResult<()> {
    let path = session.archive_path();
    let corrupt =
        |e: io::Error| BackupError::integrity(&path, format!("archive is corrupted: {e}"));

    let file = File::open(&path)
        .map_err(|e| BackupError::integrity(&path, format!("cannot open archive: {e}")))?;
    let mut decoder = zstd::stream::read::Decoder::new(file).map_err(corrupt)?;
    let mut buf = vec![0u8; CHUNK];
    loop {
        cancel.check()?;
        match decoder.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(corrupt(e)),
        }
    }
}

/// The checksum recorded for `session`, if its metadata store can supply
/// one.  An unreadable store is reported as a warning.
fn recorded_checksum(session: &SessionDir, log: &dyn Log) -> Option<String> {
    let path = session.metadata_path();
    if !path.exists() {
        log.warn(&format!("{}: no metadata store, checksum not compared", session.id));
        return None;
    }
    match MetadataStore::open_read_only(&path).and_then(|store| store.checksum()) {
        Ok(Some(checksum)) => Some(checksum),
        Ok(None) => {
            log.warn(&format!("{}: no checksum recorded", session.id));
            None
        }
        Err(e) => {
            log.warn(&format!("{}: cannot read metadata: {e}", session.id));
            None
        }
    }
}

/// Run the decoder check, then compare the archive digest with the
/// recorded one.
///
/// # Errors
///
/// Returns [`BackupError::Integrity`] on corruption or checksum mismatch;
/// nothing may be extracted from the archive in that case.
pub fn verify(
    session: &SessionDir,
    log: &dyn Log,
    cancel: &CancelToken,
) -> BackupResult<Verification> {
    test_integrity(session, cancel)?;
    log.debug(&format!("{}: archive decodes cleanly", session.id));

    let checksum = sha256_file(&session.archive_path(), cancel)?;
    let Some(recorded) = recorded_checksum(session, log) else {
        return Ok(Verification {
            checksum,
            compared: false,
        });
    };
    if !recorded.eq_ignore_ascii_case(&checksum) {
        return Err(BackupError::integrity(
            &session.archive_path(),
            format!("checksum mismatch (recorded {recorded}, found {checksum})"),
        ));
    }
    log.info(&format!("checksum verified: {checksum}"));
    Ok(Verification {
        checksum,
        compared: true,
    })
}
