//! Run golden fixtures through the parser and compare snapshots.

use crate::diff_lines;
use crate::fixtures::{FixtureCase, FixtureOptions};
use dom_handler::dom_snapshot::{DomSnapshot, DomSnapshotOptions};
use dom_handler::{Dom, DomHandlerOptions, parse_document, parse_document_chunked};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    WholeInput,
    /// Char-aligned chunks of at most this many bytes.
    Chunked(usize),
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::WholeInput => f.write_str("whole"),
            Mode::Chunked(size) => write!(f, "chunked size={size}"),
        }
    }
}

pub fn handler_options(options: &FixtureOptions) -> DomHandlerOptions {
    DomHandlerOptions::default()
        .xml_mode(options.xml_mode)
        .normalize_whitespace(options.normalize_whitespace)
        .with_indices(options.with_indices)
        .with_dom_lvl1(options.with_dom_lvl1)
}

pub fn snapshot_lines(dom: &Dom, options: &FixtureOptions) -> Vec<String> {
    let snapshot_options = DomSnapshotOptions {
        include_indices: options.with_indices,
        ..DomSnapshotOptions::default()
    };
    DomSnapshot::new(dom, dom.root(), snapshot_options)
        .as_lines()
        .to_vec()
}

/// Split `input` into pieces of at most `size` bytes without cutting a char.
pub fn char_aligned_chunks(input: &str, size: usize) -> Vec<&str> {
    assert!(size > 0, "chunk size must be > 0");
    let mut out = Vec::new();
    let mut start = 0usize;
    while start < input.len() {
        let mut end = (start + size).min(input.len());
        while !input.is_char_boundary(end) {
            end += 1;
        }
        out.push(&input[start..end]);
        start = end;
    }
    out
}

pub fn run_case(case: &FixtureCase, mode: Mode) -> Result<Vec<String>, String> {
    let options = handler_options(&case.options);
    let dom = match mode {
        Mode::WholeInput => parse_document(&case.input, &options),
        Mode::Chunked(size) => {
            parse_document_chunked(char_aligned_chunks(&case.input, size), &options)
        }
    }
    .map_err(|err| format!("parse failed: {err}"))?;
    Ok(snapshot_lines(&dom, &case.options))
}

/// `Ok` when the produced snapshot equals the expected lines.
pub fn check_case(case: &FixtureCase, mode: Mode) -> Result<(), String> {
    let actual = run_case(case, mode)?;
    let expected = case.expected_lines();
    if actual == expected {
        return Ok(());
    }
    Err(format!(
        "fixture '{}' [{mode}] input={:?}\n{}",
        case.id,
        crate::escape_text(&case.input),
        diff_lines(&expected, &actual)
    ))
}
