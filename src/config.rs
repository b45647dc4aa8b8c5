//! Sync configuration.
//!
//! Configuration is layered. Stock defaults are overridden by an optional
//! TOML file, which is in turn overridden by environment variables:
//!
//! ```text
//! stock defaults  →  --config strm-sync.toml  →  ALIST_HOST=... (env)
//! ```
//!
//! Every layer is a `toml::Value` table. Layers are merged key-by-key with
//! [`merge_toml`], the result is deserialized into [`SyncConfig`] and
//! validated once. The resolved value is immutable for the rest of the run
//! and passed by reference to every stage.
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ALIST_HOST` | `alist_host` |
//! | `ALIST_115_MOUNT_PATH` | `mount_path` |
//! | `ALIST_115_TREE_FILE` | `tree_file` |
//! | `STRM_SAVE_PATH` | `strm_save_path` |
//! | `EXCLUDE_OPTION` | `exclude_option` |
//! | `UPDATE_EXISTING` | `update_existing` (`0`/`1`) |
//! | `DELETE_ABSENT` | `delete_absent` (`0`/`1`) |
//! | `ALIST_115_TREE_FILE_FOR_GUEST` | `tree_file_for_guest` (empty = unset) |
//! | `MEDIA_EXTENSIONS` | `media_extensions` (comma separated, empty = keep) |
//!
//! Unknown keys in the TOML file are rejected to catch typos early.
//! Unrelated environment variables are ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Env {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Extensions treated as media when no override is configured.
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    // audio
    "mp3", "flac", "wav", "aac", "ogg", "wma", "alac", "m4a", "aiff", "ape", "dsf", "dff", "wv",
    "pcm", "tta",
    // video
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "vob", "mpg", "mpeg",
    // images
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "svg", "heic",
    // disc images
    "iso", "img", "bin", "nrg", "cue", "dvd",
    // subtitles, lyrics, documents
    "lrc", "srt", "sub", "ssa", "ass", "vtt", "txt", "pdf", "doc", "docx", "csv", "xml", "new",
];

/// Resolved configuration for one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Origin of the file server, e.g. `http://127.0.0.1:5244`.
    pub alist_host: String,
    /// Path segment of the remote mount files are served under.
    pub mount_path: String,
    /// Tree dump location: a path relative to the mount, or an absolute URL.
    pub tree_file: String,
    /// Root directory placeholder files are written to.
    pub strm_save_path: String,
    /// Leading path segments stripped from every tree entry.
    pub exclude_option: usize,
    /// Rewrite an existing placeholder whose content differs.
    pub update_existing: bool,
    /// Delete placeholders that are no longer in the tree.
    pub delete_absent: bool,
    /// Guest path of the tree dump, used to ask the server for its checksum
    /// before downloading. Unset means always download.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_file_for_guest: Option<String>,
    /// Lowercase extensions (no dot) that get a placeholder.
    pub media_extensions: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            alist_host: "http://127.0.0.1".to_string(),
            mount_path: "/115".to_string(),
            tree_file: "/目录树.txt".to_string(),
            strm_save_path: "/data".to_string(),
            exclude_option: 1,
            update_existing: false,
            delete_absent: true,
            tree_file_for_guest: None,
            media_extensions: DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl SyncConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alist_host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "alist_host must not be empty".into(),
            ));
        }
        if !self.mount_path.is_empty() && !self.mount_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "mount_path must start with '/': {}",
                self.mount_path
            )));
        }
        if !is_http_url(&self.tree_file) && !self.tree_file.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "tree_file must be an absolute URL or start with '/': {}",
                self.tree_file
            )));
        }
        if self.strm_save_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "strm_save_path must not be empty".into(),
            ));
        }
        if self.media_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "media_extensions must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Prefix every download URL starts with: `<host>/d<mount>`.
    pub fn file_url_prefix(&self) -> String {
        format!("{}/d{}", self.alist_host.trim_end_matches('/'), self.mount_path)
    }

    /// Where the tree dump lives. Absolute URLs are used as-is, anything
    /// else is resolved under [`file_url_prefix`](Self::file_url_prefix).
    pub fn tree_location(&self) -> String {
        if is_http_url(&self.tree_file) {
            self.tree_file.clone()
        } else {
            format!("{}{}", self.file_url_prefix(), self.tree_file)
        }
    }

    /// Metadata endpoint used for the unchanged-checksum check.
    pub fn file_info_endpoint(&self) -> String {
        format!("{}/api/fs/get", self.alist_host.trim_end_matches('/'))
    }

    pub fn media_extension_set(&self) -> HashSet<String> {
        self.media_extensions.iter().cloned().collect()
    }

    /// Effective configuration as TOML, for the `config` command.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

pub fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Trim, drop a leading dot, lowercase, and drop blanks and duplicates.
pub fn normalize_extensions<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .filter(|e| seen.insert(e.clone()))
        .collect()
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SyncConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a TOML config file as a raw value.
///
/// The file was asked for explicitly, so a missing file is an error.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Build the environment layer from `(key, value)` pairs.
///
/// Only the recognized keys contribute; values are parsed into their TOML
/// types here so a bad integer names the variable that carried it.
pub fn env_overlay<I, K, V>(vars: I) -> Result<toml::Value, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut table = toml::map::Map::new();
    for (key, value) in vars {
        let value = value.as_ref();
        match key.as_ref() {
            "ALIST_HOST" => {
                table.insert("alist_host".into(), value.into());
            }
            "ALIST_115_MOUNT_PATH" => {
                table.insert("mount_path".into(), value.into());
            }
            "ALIST_115_TREE_FILE" => {
                table.insert("tree_file".into(), value.into());
            }
            "STRM_SAVE_PATH" => {
                table.insert("strm_save_path".into(), value.into());
            }
            "EXCLUDE_OPTION" => {
                let depth = value
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|d| *d >= 0)
                    .ok_or_else(|| ConfigError::Env {
                        key: "EXCLUDE_OPTION",
                        value: value.to_string(),
                        reason: "expected a non-negative integer",
                    })?;
                table.insert("exclude_option".into(), depth.into());
            }
            "UPDATE_EXISTING" => {
                table.insert(
                    "update_existing".into(),
                    parse_flag("UPDATE_EXISTING", value)?.into(),
                );
            }
            "DELETE_ABSENT" => {
                table.insert(
                    "delete_absent".into(),
                    parse_flag("DELETE_ABSENT", value)?.into(),
                );
            }
            "ALIST_115_TREE_FILE_FOR_GUEST" => {
                if !value.trim().is_empty() {
                    table.insert("tree_file_for_guest".into(), value.into());
                }
            }
            "MEDIA_EXTENSIONS" => {
                let exts = normalize_extensions(&value.split(',').collect::<Vec<_>>());
                if !exts.is_empty() {
                    table.insert(
                        "media_extensions".into(),
                        toml::Value::Array(exts.into_iter().map(toml::Value::from).collect()),
                    );
                }
            }
            _ => {}
        }
    }
    Ok(toml::Value::Table(table))
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            key,
            value: value.to_string(),
            reason: "expected 0 or 1",
        }),
    }
}

/// Merge overlays onto a base value in order, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<SyncConfig, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let mut config: SyncConfig = merged.try_into()?;
    config.media_extensions = normalize_extensions(&config.media_extensions);
    config.validate()?;
    Ok(config)
}

/// Resolve the config from stock defaults, an optional file, and the given
/// environment pairs.
pub fn load_config_from<I, K, V>(file: Option<&Path>, env: I) -> Result<SyncConfig, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut overlays = Vec::new();
    if let Some(path) = file {
        overlays.push(load_raw_config(path)?);
    }
    overlays.push(env_overlay(env)?);
    resolve_config(stock_defaults_value()?, overlays)
}

/// Resolve the config against the process environment. Variables that are
/// not valid Unicode are ignored.
pub fn load_config(file: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    let env = std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
    load_config_from(file, env)
}

/// Returns a fully-commented stock config file with every key explained.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# strm-sync configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Environment variables (ALIST_HOST, STRM_SAVE_PATH, ...) override this file.
# Unknown keys will cause an error.

# Origin of the file server.
alist_host = "http://127.0.0.1"

# Mount path segment the storage is served under. Download URLs are
# built as <alist_host>/d<mount_path>/<relative path>.
mount_path = "/115"

# Tree dump location, relative to the mount, or an absolute http(s) URL.
tree_file = "/目录树.txt"

# Directory the .strm files are written to. The downloaded tree dump is
# stored here as well.
strm_save_path = "/data"

# Number of leading path segments dropped from every tree entry before
# building the local relative path.
exclude_option = 1

# Rewrite an existing .strm file whose URL no longer matches.
update_existing = false

# Delete .strm files that are no longer listed in the tree.
delete_absent = true

# Guest path of the tree dump. When set, the server is asked for the dump's
# SHA-1 first and the run stops early if the local copy is identical.
# tree_file_for_guest = "/guest/目录树.txt"

# Extensions that get a .strm file. Replaces the built-in list entirely.
# media_extensions = ["mkv", "mp4", "srt"]
"##
}
