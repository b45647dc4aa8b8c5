//! Tree dump parsing.
//!
//! Stage 2 of the sync pipeline. Turns the indentation-marker text tree
//! exported by the storage provider into a flat list of absolute paths.
//!
//! ## Input Format
//!
//! Every line carries one `|` per nesting level, and the item name follows
//! the last `|-`:
//!
//! ```text
//! |——115
//! |  |-Movies
//! |  |  |-Heat (1995)
//! |  |  |  |-Heat.mkv
//! |  |-Shows
//! ```
//!
//! becomes
//!
//! ```text
//! /|——115
//! /|——115/Movies
//! /|——115/Movies/Heat (1995)
//! /|——115/Movies/Heat (1995)/Heat.mkv
//! /|——115/Shows
//! ```
//!
//! ## Algorithm
//!
//! A single pass over the lines with an explicit stack of path segments.
//! For a line at depth `d` the stack is cut back to `d` entries; if it
//! then holds exactly `d` entries the top one is the previous item at this
//! depth (a sibling) and is replaced rather than nested under. The stack
//! never grows past the deepest level in the file.
//!
//! ## Encoding
//!
//! Dumps are not always UTF-8 (GBK/GB18030 exports are common). The raw
//! bytes are sniffed for a BOM first, then run through `chardetng`, and
//! decoded with `encoding_rs`. The intermediate artifact is always UTF-8.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("IO error reading {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("IO error writing {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Counted once per nesting level.
pub const DEPTH_MARKER: char = '|';
/// The item name follows the last occurrence of this token.
pub const ITEM_SEPARATOR: &str = "|-";

const BOM: char = '\u{feff}';

/// Decode raw tree bytes, returning the text and the encoding used.
pub fn decode_tree(bytes: &[u8]) -> (String, &'static Encoding) {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            (detector.guess(None, true), bytes)
        }
    };
    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        warn!(
            encoding = encoding.name(),
            "tree dump contains malformed sequences, replaced"
        );
    }
    (text.into_owned(), encoding)
}

/// Depth and item name of one tree line, or `None` for a line without a
/// name.
pub fn parse_line(line: &str) -> Option<(usize, &str)> {
    let line = line.trim_start_matches(BOM).trim();
    let depth = line.matches(DEPTH_MARKER).count();
    let name = line.rsplit(ITEM_SEPARATOR).next().unwrap_or_default().trim();
    if name.is_empty() {
        None
    } else {
        Some((depth, name))
    }
}

/// Flatten a decoded tree dump into absolute paths, in input order.
pub fn parse_tree(text: &str) -> Vec<String> {
    let mut stack: Vec<&str> = Vec::new();
    let mut paths = Vec::new();

    for (depth, name) in text.lines().filter_map(parse_line) {
        stack.truncate(depth);
        if stack.len() == depth {
            stack.pop();
        }
        stack.push(name);
        paths.push(format!("/{}", stack.join("/")));
    }

    paths
}

/// Path of the intermediate artifact for a tree dump:
/// `<dir>/<stem>_converted.txt`.
pub fn converted_path(tree_file: &Path) -> PathBuf {
    let stem = tree_file.file_stem().unwrap_or_default().to_string_lossy();
    tree_file.with_file_name(format!("{stem}_converted.txt"))
}

/// Read, decode and flatten a tree dump file.
pub fn read_tree(input: &Path) -> Result<Vec<String>, TreeError> {
    let bytes = fs::read(input).map_err(|source| TreeError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let (text, encoding) = decode_tree(&bytes);
    info!(file = %input.display(), encoding = encoding.name(), "detected tree dump encoding");
    Ok(parse_tree(&text))
}

/// Parse a tree dump file and write the flattened paths, one per line, to
/// `output` as UTF-8.
pub fn parse_tree_file(input: &Path, output: &Path) -> Result<Vec<String>, TreeError> {
    let paths = read_tree(input)?;
    write_paths(&paths, output).map_err(|source| TreeError::Write {
        path: output.to_path_buf(),
        source,
    })?;
    info!(entries = paths.len(), output = %output.display(), "tree dump flattened");
    Ok(paths)
}

fn write_paths(paths: &[String], output: &Path) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(output)?);
    for path in paths {
        writeln!(out, "{path}")?;
    }
    out.flush()
}
