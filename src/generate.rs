//! Placeholder generation.
//!
//! Stage 3 of the sync pipeline. Maps every media entry of the flattened
//! tree onto a `.strm` file under the output root whose content is the
//! entry's download URL.
//!
//! ## Path Mapping
//!
//! With `exclude_option = 1`, prefix `http://nas/d/115` and root `/data`:
//!
//! ```text
//! /115/电影/Heat (1995)/Heat.mkv
//!  └┬┘ └──────────┬───────────┘
//!   dropped    relative path
//!
//! URL:  http://nas/d/115/%E7%94%B5%E5%BD%B1/Heat%20%281995%29/Heat.mkv
//! File: /data/电影/Heat (1995)/Heat.mkv.strm
//! ```
//!
//! An entry needs at least `exclude_option + 2` `/`-separated segments (the
//! leading empty one included) to leave a non-empty relative path, and its
//! extension must be in the configured media set.
//!
//! ## Writes
//!
//! A placeholder is only written when it is missing or, with
//! `update_existing`, when its content differs. Re-running over an
//! unchanged tree writes nothing. Every mapped placeholder, written or not,
//! lands in the returned set; that set is what [`prune`](crate::prune)
//! keeps.

use crate::config::SyncConfig;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Cannot resolve output root {path}: {source}")]
    Root { path: PathBuf, source: io::Error },
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Appended to the relative path of every placeholder.
pub const PLACEHOLDER_SUFFIX: &str = ".strm";

/// Everything except ASCII alphanumerics and `-._~/` is escaped.
const URL_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// One tree entry mapped onto its placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Entry path with the excluded leading segments removed.
    pub relative_path: String,
    /// Placeholder content.
    pub url: String,
    /// Where the placeholder lives.
    pub path: PathBuf,
}

/// What happened to a single placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
    /// Content differs but updating existing files is disabled.
    KeptStale,
}

impl WriteOutcome {
    /// Outcome for a later entry mapping to a placeholder this pass already
    /// handled.
    pub fn repeated(self) -> Self {
        match self {
            WriteOutcome::KeptStale => WriteOutcome::KeptStale,
            _ => WriteOutcome::Unchanged,
        }
    }
}

/// Counts for one generation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateStats {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub kept_stale: u32,
    /// Entries that are too shallow or not media.
    pub skipped: u32,
}

impl GenerateStats {
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created => self.created += 1,
            WriteOutcome::Updated => self.updated += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
            WriteOutcome::KeptStale => self.kept_stale += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.created + self.updated + self.unchanged + self.kept_stale
    }

    /// Files written (or that would be written in a dry run).
    pub fn written(&self) -> u32 {
        self.created + self.updated
    }
}

impl fmt::Display for GenerateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged",
            self.created, self.updated, self.unchanged
        )?;
        if self.kept_stale > 0 {
            write!(f, ", {} stale kept", self.kept_stale)?;
        }
        write!(f, " ({} total)", self.total())
    }
}

/// Result of a generation pass.
#[derive(Debug, Default)]
pub struct Generated {
    /// Absolute paths of every placeholder that belongs to the current tree.
    pub placeholders: HashSet<PathBuf>,
    pub stats: GenerateStats,
}

/// Drop the first `exclude + 1` segments of an absolute entry path.
///
/// Returns `None` when nothing would remain, or when a remaining segment
/// would step outside the output root.
pub fn relative_path(entry: &str, exclude: usize) -> Option<String> {
    let segments: Vec<&str> = entry.split('/').collect();
    if segments.len() < exclude + 2 {
        return None;
    }
    let rest = &segments[exclude + 1..];
    if rest.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        return None;
    }
    Some(rest.join("/"))
}

/// Lowercased text after the final `.` of the last segment.
pub fn extension(relative_path: &str) -> Option<String> {
    let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

/// `prefix + "/" + percent-encoded relative path`.
pub fn target_url(prefix: &str, relative_path: &str) -> String {
    format!("{prefix}/{}", utf8_percent_encode(relative_path, URL_PATH))
}

/// Map one tree entry onto its placeholder, or `None` when the entry is
/// too shallow or not media.
pub fn map_entry(
    entry: &str,
    exclude: usize,
    extensions: &HashSet<String>,
    url_prefix: &str,
    root: &Path,
) -> Option<Placeholder> {
    let relative_path = relative_path(entry, exclude)?;
    if !extension(&relative_path).is_some_and(|ext| extensions.contains(&ext)) {
        return None;
    }
    Some(Placeholder {
        url: target_url(url_prefix, &relative_path),
        path: root.join(format!("{relative_path}{PLACEHOLDER_SUFFIX}")),
        relative_path,
    })
}

/// Bring one placeholder in line with its URL.
pub fn sync_placeholder(
    placeholder: &Placeholder,
    update_existing: bool,
    dry_run: bool,
) -> io::Result<WriteOutcome> {
    let path = &placeholder.path;
    let outcome = if path.exists() {
        let current = fs::read(path)?;
        if String::from_utf8_lossy(&current).trim() == placeholder.url {
            return Ok(WriteOutcome::Unchanged);
        }
        if !update_existing {
            return Ok(WriteOutcome::KeptStale);
        }
        WriteOutcome::Updated
    } else {
        WriteOutcome::Created
    };

    if !dry_run {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &placeholder.url)?;
    }
    Ok(outcome)
}

/// Create or refresh the placeholder for every media entry.
pub fn generate(
    entries: &[String],
    config: &SyncConfig,
    dry_run: bool,
) -> Result<Generated, GenerateError> {
    let root_arg = Path::new(&config.strm_save_path);
    if !dry_run {
        fs::create_dir_all(root_arg).map_err(|source| GenerateError::Root {
            path: root_arg.to_path_buf(),
            source,
        })?;
    }
    let root = std::path::absolute(root_arg).map_err(|source| GenerateError::Root {
        path: root_arg.to_path_buf(),
        source,
    })?;

    let extensions = config.media_extension_set();
    let prefix = config.file_url_prefix();
    let mut generated = Generated::default();
    let mut handled: HashMap<PathBuf, WriteOutcome> = HashMap::new();

    for entry in entries {
        let Some(placeholder) =
            map_entry(entry, config.exclude_option, &extensions, &prefix, &root)
        else {
            generated.stats.skipped += 1;
            continue;
        };

        if let Some(first) = handled.get(&placeholder.path) {
            generated.stats.record(first.repeated());
            continue;
        }

        let outcome = sync_placeholder(&placeholder, config.update_existing, dry_run).map_err(
            |source| GenerateError::Io {
                path: placeholder.path.clone(),
                source,
            },
        )?;
        match outcome {
            WriteOutcome::Created => debug!(path = %placeholder.path.display(), "created"),
            WriteOutcome::Updated => debug!(path = %placeholder.path.display(), "updated"),
            WriteOutcome::Unchanged => {}
            WriteOutcome::KeptStale => {
                debug!(path = %placeholder.path.display(), "content differs, update disabled")
            }
        }
        generated.stats.record(outcome);
        handled.insert(placeholder.path, outcome);
    }
    generated.placeholders = handled.into_keys().collect();

    if generated.stats.kept_stale > 0 {
        warn!(
            count = generated.stats.kept_stale,
            "placeholders with outdated URLs kept; set UPDATE_EXISTING=1 to rewrite them"
        );
    }
    info!(stats = %generated.stats, dry_run, "placeholders generated");
    Ok(generated)
}
