//! Content checksums for the downloaded tree dump.
//!
//! The file server reports a SHA-1 for every stored file. Hashing the
//! previously downloaded dump with the same algorithm lets the fetch stage
//! skip a download when nothing changed. Content-based rather than
//! mtime-based, since the local copy's mtime is just the download time.

use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::warn;

/// Read size used when hashing, matching the download chunk size.
pub const HASH_CHUNK_SIZE: usize = 8192;

/// SHA-1 of a file's contents as lowercase hex, read in fixed-size chunks.
pub fn sha1_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Checksum of a local file, or `None` when it can't be computed.
///
/// A missing or unreadable file just means "no checksum available"; the
/// caller treats that as a mismatch and downloads again.
pub fn local_checksum(path: &Path) -> Option<String> {
    match sha1_file(path) {
        Ok(hash) => Some(hash),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "file does not exist, no checksum");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to compute SHA-1");
            None
        }
    }
}
