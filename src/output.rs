//! CLI output formatting for sync runs.
//!
//! Diagnostics go to stderr through `tracing`; what lands on stdout is the
//! short report below, meant to be read by a person or grepped by a cron
//! wrapper.
//!
//! # Output Format
//!
//! ## Completed run
//!
//! ```text
//! Tree: /data/目录树.txt (13 entries)
//! Placeholders: 4 created, 0 updated, 0 unchanged (4 total)
//!     Skipped: 9 entries (not media, or above the excluded depth)
//! Deleted 1 stale placeholder
//!     Movies/Gone (2001)/Gone.mkv.strm
//! ```
//!
//! Deleted paths are shown relative to the output root. A dry run adds a
//! leading `Dry run: nothing written or deleted` line.
//!
//! ## Unchanged tree
//!
//! ```text
//! Tree unchanged (modified 2024-05-12 10:20:30, sha1 2aae6c35…), nothing to do
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::remote::RemoteFileMetadata;
use crate::sync::SyncSummary;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `n` followed by the singular or plural noun.
fn count(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Shorten a checksum for display.
fn short_sha1(sha1: &str) -> String {
    match sha1.get(..8) {
        Some(head) if sha1.len() > 8 => format!("{head}…"),
        _ => sha1.to_string(),
    }
}

// ============================================================================
// Completed run
// ============================================================================

pub fn format_summary(summary: &SyncSummary, root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.dry_run {
        lines.push("Dry run: nothing written or deleted".to_string());
    }
    lines.push(format!(
        "Tree: {} ({})",
        summary.tree_file.display(),
        count(summary.entries, "entry", "entries")
    ));
    lines.push(format!("Placeholders: {}", summary.generate));
    if summary.generate.skipped > 0 {
        lines.push(format!(
            "{}Skipped: {} (not media, or above the excluded depth)",
            indent(1),
            count(summary.generate.skipped as usize, "entry", "entries")
        ));
    }

    match &summary.deleted {
        None => lines.push("Pruning disabled".to_string()),
        Some(deleted) if deleted.is_empty() => {
            lines.push("No stale placeholders".to_string());
        }
        Some(deleted) => {
            lines.push(format!(
                "Deleted {}",
                count(deleted.len(), "stale placeholder", "stale placeholders")
            ));
            let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
            for path in deleted {
                let shown = path.strip_prefix(&root).unwrap_or(path);
                lines.push(format!("{}{}", indent(1), shown.display()));
            }
        }
    }
    lines
}

pub fn print_summary(summary: &SyncSummary, root: &Path) {
    for line in format_summary(summary, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Unchanged tree
// ============================================================================

pub fn format_unchanged(remote: &RemoteFileMetadata) -> Vec<String> {
    vec![format!(
        "Tree unchanged (modified {}, sha1 {}), nothing to do",
        remote.display_modified(),
        short_sha1(&remote.sha1)
    )]
}

pub fn print_unchanged(remote: &RemoteFileMetadata) {
    for line in format_unchanged(remote) {
        println!("{}", line);
    }
}

// ============================================================================
// Parse only
// ============================================================================

/// Flattened tree paths, one per line.
pub fn print_paths(paths: &[String]) {
    for path in paths {
        println!("{}", path);
    }
}
