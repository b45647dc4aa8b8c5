//! One complete sync run.
//!
//! ```text
//! 1. Acquire   tree location  →  local tree dump       (or stop: unchanged)
//! 2. Parse     tree dump      →  <stem>_converted.txt  (flat path list)
//! 3. Generate  path list      →  <root>/**/*.strm
//! 4. Prune     <root>         →  stale placeholders removed (if enabled)
//! ```
//!
//! Stages run strictly in order and the first failure ends the run. The
//! intermediate artifact from stage 2 is removed before returning, whether
//! the later stages succeeded or not. The downloaded dump itself is kept:
//! its checksum decides whether the next run has anything to do. A dry run
//! parses a scratch copy instead and removes that too.

use crate::config::SyncConfig;
use crate::fetch::{self, Acquired, FetchError};
use crate::generate::{self, GenerateError, GenerateStats};
use crate::prune::{self, PruneError};
use crate::remote::{RemoteFileMetadata, TreeHost};
use crate::tree::{self, TreeError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Acquiring tree dump failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Parsing tree dump failed: {0}")]
    Tree(#[from] TreeError),
    #[error("Generating placeholders failed: {0}")]
    Generate(#[from] GenerateError),
    #[error("Pruning stale placeholders failed: {0}")]
    Prune(#[from] PruneError),
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub tree_file: PathBuf,
    /// Paths produced by the parser, media or not.
    pub entries: usize,
    pub generate: GenerateStats,
    /// `None` when pruning is disabled.
    pub deleted: Option<Vec<PathBuf>>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(SyncSummary),
    /// The remote dump matches the local copy; nothing was touched.
    Unchanged(RemoteFileMetadata),
}

/// Run all four stages once against `location` (a URL or a local path).
pub fn run(
    config: &SyncConfig,
    location: &str,
    host: &impl TreeHost,
    dry_run: bool,
) -> Result<RunOutcome, SyncError> {
    info!(location, dry_run, "starting sync");
    let (tree_file, scratch) = match fetch::acquire(config, location, host, dry_run)? {
        Acquired::Ready(path) => (path, false),
        Acquired::Scratch(path) => (path, true),
        Acquired::Unchanged(remote) => return Ok(RunOutcome::Unchanged(remote)),
    };

    let artifact = tree::converted_path(&tree_file);
    let result = process_tree(config, &tree_file, &artifact, dry_run);
    remove_intermediate(&artifact);
    if scratch {
        remove_intermediate(&tree_file);
    }
    result.map(RunOutcome::Completed)
}

fn process_tree(
    config: &SyncConfig,
    tree_file: &Path,
    artifact: &Path,
    dry_run: bool,
) -> Result<SyncSummary, SyncError> {
    let entries = tree::parse_tree_file(tree_file, artifact)?;
    let generated = generate::generate(&entries, config, dry_run)?;

    let deleted = if config.delete_absent {
        Some(prune::prune(
            Path::new(&config.strm_save_path),
            &generated.placeholders,
            dry_run,
        )?)
    } else {
        debug!("pruning disabled");
        None
    };

    Ok(SyncSummary {
        tree_file: tree_file.to_path_buf(),
        entries: entries.len(),
        generate: generated.stats,
        deleted,
        dry_run,
    })
}

fn remove_intermediate(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed intermediate file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cannot remove intermediate file"),
    }
}
