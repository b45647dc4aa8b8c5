//! Tree dump acquisition.
//!
//! Stage 1 of the sync pipeline. Produces a local file holding the raw tree
//! dump, ready for [`tree`](crate::tree) to parse.
//!
//! ## Decision Flow
//!
//! ```text
//! location is a local path ──────────────────────────────→ use it as-is
//! location is a URL
//!   ├─ no guest path configured ─────────────────────────→ download
//!   └─ guest path configured → ask server for {modified, sha1}
//!        ├─ either field missing / request failed ───────→ error
//!        ├─ local copy exists and its SHA-1 matches ─────→ Unchanged (no-op)
//!        └─ otherwise ───────────────────────────────────→ download
//! ```
//!
//! The download lands in `strm_save_path` under the URL's last path
//! segment (percent-decoded). There are no retries: any failure ends the run.
//!
//! A dry run never replaces that saved copy, since its checksum decides
//! whether the next real run has anything to do. The dump goes to a
//! `.dry-run-` prefixed scratch file instead, which the caller removes.

use crate::checksum::local_checksum;
use crate::config::{SyncConfig, is_http_url};
use crate::remote::{HostError, RemoteFileMetadata, TreeHost};
use percent_encoding::percent_decode_str;
use reqwest::Url;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("Cannot derive a file name from tree URL: {0}")]
    InvalidUrl(String),
    #[error("Tree file does not exist: {0}")]
    TreeFileMissing(PathBuf),
}

/// Where the tree dump comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSource {
    Local(PathBuf),
    Remote(String),
}

impl TreeSource {
    pub fn resolve(location: &str) -> Self {
        if is_http_url(location) {
            Self::Remote(location.to_string())
        } else {
            Self::Local(PathBuf::from(location))
        }
    }
}

/// Result of the acquisition stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// The tree dump is on disk at this path.
    Ready(PathBuf),
    /// Dry-run download into a scratch file; remove it after parsing.
    Scratch(PathBuf),
    /// The server's copy matches the local one; nothing to do this run.
    Unchanged(RemoteFileMetadata),
}

/// Skip the download only when a local checksum exists and equals the
/// server's.
pub fn should_skip(remote: &RemoteFileMetadata, local_checksum: Option<&str>) -> bool {
    local_checksum.is_some_and(|local| local.eq_ignore_ascii_case(&remote.sha1))
}

/// Local path a downloaded tree dump is saved to.
pub fn download_target(url: &str, save_root: &Path) -> Result<PathBuf, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let name = percent_decode_str(segment).decode_utf8_lossy();
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    Ok(save_root.join(&*name))
}

/// Sibling of `dest` a dry-run download is written to.
pub fn scratch_path(dest: &Path) -> PathBuf {
    let name = dest.file_name().unwrap_or_default().to_string_lossy();
    dest.with_file_name(format!(".dry-run-{name}"))
}

/// Make the tree dump available locally.
pub fn acquire(
    config: &SyncConfig,
    location: &str,
    host: &impl TreeHost,
    dry_run: bool,
) -> Result<Acquired, FetchError> {
    let (path, scratch) = match TreeSource::resolve(location) {
        TreeSource::Local(path) => {
            debug!(path = %path.display(), "using local tree file");
            (path, false)
        }
        TreeSource::Remote(url) => {
            let save_root = Path::new(&config.strm_save_path);
            fs::create_dir_all(save_root)?;
            let dest = download_target(&url, save_root)?;

            if let Some(guest_path) = &config.tree_file_for_guest {
                let remote = host.file_info(guest_path)?;
                if dest.is_file() && should_skip(&remote, local_checksum(&dest).as_deref()) {
                    info!(
                        modified = %remote.display_modified(),
                        sha1 = %remote.sha1,
                        "tree dump unchanged, skipping update"
                    );
                    return Ok(Acquired::Unchanged(remote));
                }
                debug!(sha1 = %remote.sha1, "tree dump changed on server");
            }

            let target = if dry_run { scratch_path(&dest) } else { dest };
            host.download(&url, &target)?;
            (target, dry_run)
        }
    };

    if !path.is_file() {
        return Err(FetchError::TreeFileMissing(path));
    }
    if scratch {
        Ok(Acquired::Scratch(path))
    } else {
        Ok(Acquired::Ready(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::sha1_file;
    use crate::remote::backend::tests::{HostCall, MockHost};
    use tempfile::TempDir;

    const URL: &str = "http://127.0.0.1/d/115/%E7%9B%AE%E5%BD%95%E6%A0%91.txt";

    fn config_in(tmp: &TempDir) -> SyncConfig {
        SyncConfig {
            strm_save_path: tmp.path().to_string_lossy().to_string(),
            ..SyncConfig::default()
        }
    }

    fn meta(sha1: &str) -> RemoteFileMetadata {
        RemoteFileMetadata {
            modified: "2024-05-12T10:20:30+08:00".into(),
            sha1: sha1.into(),
        }
    }

    // =========================================================================
    // should_skip
    // =========================================================================

    #[test]
    fn should_skip_when_checksums_match() {
        assert!(should_skip(&meta("abc123"), Some("abc123")));
    }

    #[test]
    fn should_skip_ignores_case() {
        assert!(should_skip(&meta("abc123"), Some("ABC123")));
    }

    #[test]
    fn should_not_skip_on_mismatch() {
        assert!(!should_skip(&meta("abc123"), Some("def456")));
    }

    #[test]
    fn should_not_skip_without_local_checksum() {
        assert!(!should_skip(&meta("abc123"), None));
    }

    // =========================================================================
    // Source resolution
    // =========================================================================

    #[test]
    fn resolve_url_is_remote() {
        assert_eq!(
            TreeSource::resolve("https://nas/d/115/tree.txt"),
            TreeSource::Remote("https://nas/d/115/tree.txt".into())
        );
    }

    #[test]
    fn resolve_path_is_local() {
        assert_eq!(
            TreeSource::resolve("/srv/tree.txt"),
            TreeSource::Local(PathBuf::from("/srv/tree.txt"))
        );
    }

    #[test]
    fn download_target_decodes_file_name() {
        let target = download_target(URL, Path::new("/data")).unwrap();
        assert_eq!(target, PathBuf::from("/data/目录树.txt"));
    }

    #[test]
    fn download_target_accepts_raw_unicode() {
        let target = download_target("http://127.0.0.1/d/115/目录树.txt", Path::new("/data")).unwrap();
        assert_eq!(target, PathBuf::from("/data/目录树.txt"));
    }

    #[test]
    fn download_target_rejects_directory_url() {
        assert!(matches!(
            download_target("http://127.0.0.1/d/115/", Path::new("/data")),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn download_target_rejects_encoded_separator() {
        assert!(download_target("http://h/d/..%2F..%2Fetc", Path::new("/data")).is_err());
    }

    // =========================================================================
    // acquire
    // =========================================================================

    #[test]
    fn local_source_is_returned_without_network() {
        let tmp = TempDir::new().unwrap();
        let tree = tmp.path().join("tree.txt");
        fs::write(&tree, "Movies\n").unwrap();
        let host = MockHost::default();

        let result = acquire(&config_in(&tmp), &tree.to_string_lossy(), &host, false).unwrap();
        assert_eq!(result, Acquired::Ready(tree));
        assert!(host.get_calls().is_empty());
    }

    #[test]
    fn missing_local_source_is_error() {
        let tmp = TempDir::new().unwrap();
        let tree = tmp.path().join("nope.txt");
        let result = acquire(&config_in(&tmp), &tree.to_string_lossy(), &MockHost::default(), false);
        assert!(matches!(result, Err(FetchError::TreeFileMissing(_))));
    }

    #[test]
    fn downloads_unconditionally_without_guest_path() {
        let tmp = TempDir::new().unwrap();
        let host = MockHost::serving(b"Movies\n|-Foo\n");

        let result = acquire(&config_in(&tmp), URL, &host, false).unwrap();
        let expected = tmp.path().join("目录树.txt");
        assert_eq!(result, Acquired::Ready(expected.clone()));
        assert_eq!(fs::read(&expected).unwrap(), b"Movies\n|-Foo\n");
        assert_eq!(host.download_count(), 1);
        assert!(!host
            .get_calls()
            .iter()
            .any(|c| matches!(c, HostCall::FileInfo(_))));
    }

    #[test]
    fn unchanged_checksum_skips_download() {
        let tmp = TempDir::new().unwrap();
        let existing = tmp.path().join("目录树.txt");
        fs::write(&existing, "Movies\n").unwrap();
        let sha1 = sha1_file(&existing).unwrap();

        let mut config = config_in(&tmp);
        config.tree_file_for_guest = Some("/guest/目录树.txt".into());
        let host = MockHost::serving(b"Movies\n").with_metadata(&sha1);

        let result = acquire(&config, URL, &host, false).unwrap();
        assert!(matches!(result, Acquired::Unchanged(m) if m.sha1 == sha1));
        assert_eq!(host.download_count(), 0);
        assert_eq!(
            host.get_calls(),
            vec![HostCall::FileInfo("/guest/目录树.txt".into())]
        );
    }

    #[test]
    fn changed_checksum_downloads() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("目录树.txt"), "old\n").unwrap();

        let mut config = config_in(&tmp);
        config.tree_file_for_guest = Some("/guest/目录树.txt".into());
        let host = MockHost::serving(b"new\n").with_metadata("0000");

        let result = acquire(&config, URL, &host, false).unwrap();
        assert!(matches!(result, Acquired::Ready(_)));
        assert_eq!(host.download_count(), 1);
        assert_eq!(
            fs::read_to_string(tmp.path().join("目录树.txt")).unwrap(),
            "new\n"
        );
    }

    #[test]
    fn first_run_with_guest_path_downloads() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(&tmp);
        config.tree_file_for_guest = Some("/guest/目录树.txt".into());
        let host = MockHost::serving(b"Movies\n").with_metadata("abc");

        assert!(matches!(
            acquire(&config, URL, &host, false).unwrap(),
            Acquired::Ready(_)
        ));
        assert_eq!(host.download_count(), 1);
    }

    #[test]
    fn missing_metadata_fails_without_download() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(&tmp);
        config.tree_file_for_guest = Some("/guest/目录树.txt".into());
        let host = MockHost::serving(b"Movies\n");

        let result = acquire(&config, URL, &host, false);
        assert!(matches!(
            result,
            Err(FetchError::Host(HostError::MissingMetadata(_)))
        ));
        assert_eq!(host.download_count(), 0);
    }

    #[test]
    fn dry_run_downloads_beside_saved_copy() {
        let tmp = TempDir::new().unwrap();
        let saved = tmp.path().join("目录树.txt");
        fs::write(&saved, "old\n").unwrap();
        let host = MockHost::serving(b"new\n");

        let result = acquire(&config_in(&tmp), URL, &host, true).unwrap();
        let scratch = tmp.path().join(".dry-run-目录树.txt");
        assert_eq!(result, Acquired::Scratch(scratch.clone()));
        assert_eq!(fs::read_to_string(&scratch).unwrap(), "new\n");
        assert_eq!(fs::read_to_string(&saved).unwrap(), "old\n");
    }

    #[test]
    fn dry_run_still_skips_unchanged_dump() {
        let tmp = TempDir::new().unwrap();
        let saved = tmp.path().join("目录树.txt");
        fs::write(&saved, "Movies\n").unwrap();
        let sha1 = sha1_file(&saved).unwrap();
        let mut config = config_in(&tmp);
        config.tree_file_for_guest = Some("/guest/目录树.txt".into());
        let host = MockHost::serving(b"Movies\n").with_metadata(&sha1);

        let result = acquire(&config, URL, &host, true).unwrap();
        assert!(matches!(result, Acquired::Unchanged(_)));
        assert_eq!(host.download_count(), 0);
    }

    #[test]
    fn dry_run_local_source_is_ready() {
        let tmp = TempDir::new().unwrap();
        let tree = tmp.path().join("tree.txt");
        fs::write(&tree, "Movies\n").unwrap();

        let result = acquire(&config_in(&tmp), &tree.to_string_lossy(), &MockHost::default(), true);
        assert_eq!(result.unwrap(), Acquired::Ready(tree));
    }

    #[test]
    fn scratch_path_prefixes_file_name() {
        assert_eq!(
            scratch_path(Path::new("/data/目录树.txt")),
            PathBuf::from("/data/.dry-run-目录树.txt")
        );
    }

    #[test]
    fn download_failure_aborts() {
        let tmp = TempDir::new().unwrap();
        let host = MockHost {
            fail_download: true,
            ..MockHost::default()
        };

        let result = acquire(&config_in(&tmp), URL, &host, false);
        assert!(matches!(result, Err(FetchError::Host(HostError::Io(_)))));
        assert!(!tmp.path().join("目录树.txt").exists());
    }
}
