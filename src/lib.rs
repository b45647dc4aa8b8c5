//! # strm-sync
//!
//! Keeps a local directory of `.strm` placeholder files in step with a
//! cloud drive that a file server exposes over HTTP. Each placeholder holds
//! the download URL of one remote media file, so a media server can index
//! the directory and stream straight from the file server.
//!
//! The drive is never walked remotely. Instead the provider's exported
//! directory tree, a single text dump, is fetched and flattened locally.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! ```text
//! 1. Acquire   tree location  →  local tree dump     (or stop: unchanged)
//! 2. Parse     tree dump      →  absolute paths
//! 3. Generate  paths          →  <root>/**/*.strm
//! 4. Prune     <root>         →  stale placeholders removed
//! ```
//!
//! Stages run once, in order, on one thread; [`sync::run`] drives them.
//! Each stage is also usable on its own, which is how the tests exercise
//! them: the parser is a pure function over text, the generator and pruner
//! work on any directory, and the network sits behind the
//! [`remote::TreeHost`] trait.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`fetch`] | Stage 1: resolve the tree source, skip when unchanged, download |
//! | [`tree`] | Stage 2: encoding detection and the stack-based tree parser |
//! | [`generate`] | Stage 3: entry → URL + placeholder mapping, idempotent writes |
//! | [`prune`] | Stage 4: delete placeholders that left the tree |
//! | [`sync`] | Runs the four stages and reports a [`sync::RunOutcome`] |
//! | [`remote`] | [`remote::TreeHost`] trait and its blocking HTTP client |
//! | [`checksum`] | Streamed SHA-1 of local files |
//! | [`config`] | Layered configuration: stock defaults, TOML file, environment |
//! | [`logging`] | `tracing` subscriber set-up |
//! | [`output`] | CLI output formatting for run summaries |
//!
//! # Design Decisions
//!
//! ## Idempotent Runs
//!
//! A run over an unchanged tree writes nothing: placeholders are compared
//! with their expected URL before writing, and with a guest path configured
//! the whole run stops after one metadata request if the dump's SHA-1
//! matches the local copy. Cron can call the tool every few minutes.
//!
//! ## Placeholder Set as the Source of Truth
//!
//! The generator returns the absolute path of every placeholder the current
//! tree maps to, whether it was written or not. The pruner deletes any
//! `.strm` file outside that set and nothing else, so files a user drops
//! into the output root survive.

pub mod checksum;
pub mod config;
pub mod fetch;
pub mod generate;
pub mod logging;
pub mod output;
pub mod prune;
pub mod remote;
pub mod sync;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_helpers;
