//! [`TreeHost`] over the file server's HTTP API, using a blocking `reqwest`
//! client.
//!
//! Two endpoints are used:
//!
//! - `POST <host>/api/fs/get` with `{path, page, per_page, refresh}`, read
//!   back as `data.modified` and `data.hash_info.sha1`.
//! - `GET <tree url>`, redirects followed, body streamed to disk.

use super::backend::{HostError, RemoteFileMetadata, TreeHost};
use crate::config::SyncConfig;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA, USER_AGENT};
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Size of each chunk copied from the response body to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct FileInfoRequest<'a> {
    path: &'a str,
    page: u32,
    per_page: u32,
    refresh: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileInfoResponse {
    #[serde(default)]
    data: Option<FileInfoData>,
}

#[derive(Debug, Deserialize)]
struct FileInfoData {
    #[serde(default)]
    modified: Option<String>,
    #[serde(default)]
    hash_info: Option<HashInfo>,
}

#[derive(Debug, Deserialize)]
struct HashInfo {
    #[serde(default)]
    sha1: Option<String>,
}

/// Pull the timestamp and checksum out of a file-info response.
pub(crate) fn extract_metadata(
    response: FileInfoResponse,
) -> Result<RemoteFileMetadata, HostError> {
    let data = response.data.ok_or(HostError::MissingMetadata("data"))?;
    let modified = data
        .modified
        .filter(|m| !m.is_empty())
        .ok_or(HostError::MissingMetadata("data.modified"))?;
    let sha1 = data
        .hash_info
        .and_then(|h| h.sha1)
        .filter(|s| !s.is_empty())
        .ok_or(HostError::MissingMetadata("data.hash_info.sha1"))?;
    Ok(RemoteFileMetadata {
        modified,
        sha1: sha1.to_lowercase(),
    })
}

pub struct AlistClient {
    client: Client,
    info_endpoint: String,
}

impl AlistClient {
    pub fn new(config: &SyncConfig) -> Result<Self, HostError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.1.2"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        // No overall timeout: tree dumps of large libraries take a while.
        let client = Client::builder()
            .default_headers(headers)
            .redirect(Policy::default())
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()?;

        Ok(Self {
            client,
            info_endpoint: config.file_info_endpoint(),
        })
    }
}

impl TreeHost for AlistClient {
    fn file_info(&self, path: &str) -> Result<RemoteFileMetadata, HostError> {
        debug!(endpoint = %self.info_endpoint, path, "querying file info");
        let response: FileInfoResponse = self
            .client
            .post(&self.info_endpoint)
            .json(&FileInfoRequest {
                path,
                page: 1,
                per_page: 0,
                refresh: true,
            })
            .send()
            .and_then(|r| r.error_for_status())?
            .json()?;
        extract_metadata(response)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64, HostError> {
        info!(url, "downloading tree dump");
        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())?;
        if response.url().as_str() != url {
            debug!(final_url = %response.url(), "followed redirect");
        }
        let bytes = stream_to_file(&mut response, dest)?;
        info!(dest = %dest.display(), bytes, "tree dump saved");
        Ok(bytes)
    }
}

/// Path the body is written to before it is moved onto `dest`.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Copy `reader` into `dest` in fixed-size chunks.
///
/// Writes go to a sibling `.part` file which is renamed over `dest` only
/// after the whole body arrived, so a failed transfer leaves the previous
/// copy (if any) untouched and no partial file behind.
pub(crate) fn stream_to_file<R: Read>(reader: &mut R, dest: &Path) -> io::Result<u64> {
    let part = part_path(dest);
    let result = (|| -> io::Result<u64> {
        let mut out = BufWriter::new(File::create(&part)?);
        let mut buf = [0u8; DOWNLOAD_CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            out.write_all(&buf[..n])?;
            total += n as u64;
        }
        out.flush()?;
        Ok(total)
    })();

    match result {
        Ok(total) => {
            fs::rename(&part, dest)?;
            Ok(total)
        }
        Err(e) => {
            let _ = fs::remove_file(&part);
            Err(e)
        }
    }
}
