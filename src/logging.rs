//! Diagnostic logging set-up.
//!
//! Everything the pipeline logs goes through `tracing` to stderr, keeping
//! stdout free for the run summary. The filter comes from `STRM_SYNC_LOG`,
//! then `RUST_LOG`, then defaults to `info`; it takes the usual
//! `EnvFilter` directives (`debug`, `strm_sync=trace,reqwest=warn`, ...).

use std::io::IsTerminal;
use tracing::warn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable read first for the filter directive.
pub const LOG_ENV: &str = "STRM_SYNC_LOG";
/// Read when [`LOG_ENV`] is unset or blank.
pub const FALLBACK_LOG_ENV: &str = "RUST_LOG";

const DEFAULT_FILTER: &str = "info";

/// Pick the filter directive from the two candidate variables.
pub fn filter_directive(primary: Option<String>, fallback: Option<String>) -> String {
    [primary, fallback]
        .into_iter()
        .flatten()
        .map(|d| d.trim().to_string())
        .find(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init() {
    let directive = filter_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var(FALLBACK_LOG_ENV).ok(),
    );
    let (filter, invalid) = match EnvFilter::try_new(&directive) {
        Ok(filter) => (filter, false),
        Err(_) => (EnvFilter::new(DEFAULT_FILTER), true),
    };

    let stderr = std::io::stderr();
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(stderr.is_terminal());

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .is_ok();

    if installed && invalid {
        warn!(directive = %directive, "invalid log filter, falling back to {DEFAULT_FILTER}");
    }
}
