//! Shared test utilities for the strm-sync test suite.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let tree = write_tree(tmp.path(), SAMPLE_TREE);
//! let config = config_for(&tmp.path().join("strm"));
//! ```

use crate::config::SyncConfig;
use std::path::{Path, PathBuf};

// =========================================================================
// Fixture data
// =========================================================================

/// A small library in the provider's dump format. With the default
/// `exclude_option` of 1 it maps to four placeholders:
///
/// ```text
/// Movies/Heat (1995)/Heat.1995.1080p.mkv.strm
/// Shows/Dark/Season 1/Dark.S01E01.mkv.strm
/// Shows/Dark/Season 1/Dark.S01E02.mkv.strm
/// Music/Nujabes - Aruarian Dance.flac.strm
/// ```
pub const SAMPLE_TREE: &str = "\
|——115
|  |-Movies
|  |  |-Heat (1995)
|  |  |  |-Heat.1995.1080p.mkv
|  |  |  |-Heat.1995.1080p.nfo
|  |-Shows
|  |  |-Dark
|  |  |  |-Season 1
|  |  |  |  |-Dark.S01E01.mkv
|  |  |  |  |-Dark.S01E02.mkv
|  |-Music
|  |  |-Nujabes - Aruarian Dance.flac
|  |  |-desktop.ini
";

/// Path to a file under the crate's `fixtures/` directory.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

// =========================================================================
// Setup
// =========================================================================

/// Write `text` to `<dir>/tree.txt` and return the path.
pub fn write_tree(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("tree.txt");
    std::fs::write(&path, text).unwrap();
    path
}

/// Stock config pointed at a test host and the given output root.
pub fn config_for(root: &Path) -> SyncConfig {
    SyncConfig {
        alist_host: "http://nas:5244".into(),
        strm_save_path: root.to_string_lossy().to_string(),
        ..SyncConfig::default()
    }
}

#[test]
fn fixture_tree_matches_sample() {
    let text = std::fs::read_to_string(fixture("tree.txt")).unwrap();
    assert_eq!(text, SAMPLE_TREE);
}
