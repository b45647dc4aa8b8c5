//! Tree host trait and shared types.
//!
//! The [`TreeHost`] trait covers the two requests the fetch stage makes:
//! asking for a file's metadata and downloading a file. The production
//! implementation is [`AlistClient`](super::alist::AlistClient); tests use
//! the recording mock in this module so nothing touches the network.

use std::path::Path;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("File info response is missing {0}; check the storage login state")]
    MissingMetadata(&'static str),
}

/// What the server knows about the stored tree dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileMetadata {
    /// Last-modified timestamp as sent by the server (ISO-8601).
    pub modified: String,
    /// Lowercase hex SHA-1 of the stored file.
    pub sha1: String,
}

impl RemoteFileMetadata {
    /// `YYYY-MM-DD HH:MM:SS` when the timestamp is RFC 3339, raw otherwise.
    pub fn display_modified(&self) -> String {
        let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        OffsetDateTime::parse(&self.modified, &Rfc3339)
            .ok()
            .and_then(|t| t.format(fmt).ok())
            .unwrap_or_else(|| self.modified.clone())
    }
}

/// Remote side of the acquisition step.
pub trait TreeHost {
    /// Query metadata for a path on the server. Both the timestamp and the
    /// checksum must be present.
    fn file_info(&self, path: &str) -> Result<RemoteFileMetadata, HostError>;

    /// Download `url` into `dest`, following redirects. Returns the number
    /// of bytes written. Nothing is left at `dest` on failure.
    fn download(&self, url: &str, dest: &Path) -> Result<u64, HostError>;
}
