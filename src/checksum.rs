//! SHA-256 digests of archive files.
use std::fmt::Write as _;
use std::fs::File;
use std::io::Read as _;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::cancel::CancelToken;
use crate::error::{BackupResult, IoContext as _};

const CHUNK: usize = 64 * 1024;

/// Compute the lowercase hex SHA-256 digest of the file at `path`.
///
/// The file is streamed in 64 KiB chunks so archives of any size hash in
/// constant memory; `cancel` is polled between chunks.
///
/// # Errors
///
/// Returns an error if the file cannot be read or cancellation is requested.
pub fn sha256_file(path: &Path, cancel: &CancelToken) -> BackupResult<String> {
    let mut file = File::open(path).at(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        cancel.check()?;
        let n = file.read(&mut buf).at(path)?;
        if n == 0 {
            break;
        }
        hasher.update(buf.get(..n).unwrap_or_default());
    }
    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // write! to a String is infallible; unwrap_or(()) makes that explicit.
        write!(hex, "{b:02x}").unwrap_or(());
    }
    hex
}
