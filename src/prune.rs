//! Stale placeholder removal.
//!
//! Stage 4 of the sync pipeline. Walks the output root and deletes every
//! `.strm` file that the current generation pass did not map. Nothing else
//! is touched: other files, directories (including ones left empty) and
//! symlinks stay where they are.
//!
//! Comparison is by absolute path, so the walk starts from the absolute
//! form of the root just like [`generate`](crate::generate) does.

use crate::generate::PLACEHOLDER_SUFFIX;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PruneError {
    #[error("Cannot resolve output root {path}: {source}")]
    Root { path: PathBuf, source: io::Error },
    #[error("Failed to delete {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
}

fn is_placeholder(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(PLACEHOLDER_SUFFIX))
}

/// Every `.strm` file under `root`, in file-name order.
///
/// A missing root yields nothing. Unreadable entries are logged and
/// skipped.
pub fn find_placeholders(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_placeholder(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Delete every placeholder under `root` that is not in `keep`.
///
/// Returns the deleted paths (or the ones that would be deleted in a dry
/// run).
pub fn prune(
    root: &Path,
    keep: &HashSet<PathBuf>,
    dry_run: bool,
) -> Result<Vec<PathBuf>, PruneError> {
    let root = std::path::absolute(root).map_err(|source| PruneError::Root {
        path: root.to_path_buf(),
        source,
    })?;

    let mut deleted = Vec::new();
    for path in find_placeholders(&root) {
        if keep.contains(&path) {
            continue;
        }
        if !dry_run {
            fs::remove_file(&path).map_err(|source| PruneError::Remove {
                path: path.clone(),
                source,
            })?;
        }
        info!(path = %path.display(), dry_run, "removed stale placeholder");
        deleted.push(path);
    }

    info!(count = deleted.len(), dry_run, "stale placeholders pruned");
    Ok(deleted)
}
