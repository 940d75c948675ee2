//! Whole-input vs chunked parity.
//!
//! Fast CI mode: default seeds and budget when `CI` is set.
//! Extended local mode: set `DOM_HANDLER_STREAMING_PARITY_SEEDS` and
//! `DOM_HANDLER_STREAMING_PARITY_BUDGET` to increase coverage.

use crate::chunker::{SplitMix64, build_chunk_plans};
use crate::dom::Dom;
use crate::dom_handler::DomHandlerOptions;
use crate::dom_snapshot::{DomSnapshot, DomSnapshotOptions, compare_dom};
use crate::test_harness::{BoundaryPolicy, run_chunked, run_chunked_bytes, run_full};

const DEFAULT_BUDGET_CI: usize = 300;
const DEFAULT_BUDGET_LOCAL: usize = 1_500;
const DEFAULT_SEEDS_CI: usize = 8;
const DEFAULT_SEEDS_LOCAL: usize = 32;
const SEED_MIX: u64 = 0x9e3779b97f4a7c15;

const CASES: &[&str] = &[
    "plain text only",
    "<div foo=bar><div><div>",
    "<p>one<p>two<ul><li>a<li>b</ul>",
    "<a href='x' b c=\"d e\">link</a> tail",
    "<!-- a comment --><!doctype html><?pi data?>",
    "<script>if (a < b && c > d) {}</script><style>p{}</style>",
    "<div>  spread \n\t across   whitespace  </div>",
    "café <b>😀</b> e\u{0301} </b></p>",
    "<table><tr><td>1<td>2<tr><td>3</table>",
    "<br/><img src=x.png><input disabled>trailing <",
];

fn index_options() -> DomSnapshotOptions {
    DomSnapshotOptions {
        include_indices: true,
        ..DomSnapshotOptions::default()
    }
}

fn builder_variants() -> [DomHandlerOptions; 3] {
    [
        DomHandlerOptions::default().with_indices(true),
        DomHandlerOptions::default().with_indices(true).normalize_whitespace(true),
        DomHandlerOptions::default().with_indices(true).xml_mode(true),
    ]
}

#[test]
fn chunk_plans_match_whole_input() {
    let budget = run_budget();
    let fuzz_runs = seed_count();
    let mut runs = 0usize;
    for (case_idx, input) in CASES.iter().enumerate() {
        for options in builder_variants() {
            let expected = run_full(input, &options);
            for policy in [BoundaryPolicy::Utf8Aligned, BoundaryPolicy::ByteStream] {
                let seed = 0x646f6d5f68616e64 ^ (case_idx as u64).wrapping_mul(SEED_MIX);
                for case in build_chunk_plans(input, fuzz_runs, seed, policy) {
                    if runs >= budget {
                        return;
                    }
                    let actual = run_chunked(input, &case.plan, &options);
                    assert_same(&expected, &actual, || {
                        format!("case {case_idx} {input:?} {options:?} plan: {}", case.label)
                    });
                    runs += 1;
                }
            }
        }
    }
}

#[test]
fn random_byte_boundaries_match_whole_input() {
    let options = DomHandlerOptions::default().with_indices(true);
    let seeds = seed_count();
    for (case_idx, input) in CASES.iter().enumerate() {
        let expected = run_full(input, &options);
        let bytes = input.as_bytes();
        for iter in 0..seeds {
            let seed = (case_idx as u64) ^ (iter as u64).wrapping_mul(SEED_MIX);
            let mut rng = SplitMix64::new(seed);
            let boundaries = random_boundaries(&mut rng, bytes.len());
            let actual = run_chunked_bytes(bytes, &boundaries, &options);
            assert_same(&expected, &actual, || {
                format!("case {case_idx} seed=0x{seed:016x} boundaries={boundaries:?}")
            });
        }
    }
}

#[test]
fn invalid_utf8_is_replaced_lossily_regardless_of_split() {
    let bytes = [b'<', b'b', b'>', 0xFFu8, b'f', 0xC3];
    let options = DomHandlerOptions::default();
    let whole = run_chunked_bytes(&bytes, &[], &options);
    let split = run_chunked_bytes(&bytes, &[1, 4, 5], &options);
    assert_same(&whole, &split, || "invalid utf8".to_string());
    let b = whole.top_level()[0];
    assert_eq!(whole.node(b).text_content(), "\u{FFFD}f\u{FFFD}");
}

fn assert_same(expected: &Dom, actual: &Dom, context: impl FnOnce() -> String) {
    if let Err(mismatch) = compare_dom(expected, expected.root(), actual, actual.root(), index_options())
    {
        panic!(
            "streaming parity mismatch ({})\n{mismatch}\nexpected:\n{}\nactual:\n{}",
            context(),
            DomSnapshot::new(expected, expected.root(), index_options()),
            DomSnapshot::new(actual, actual.root(), index_options()),
        );
    }
}

fn random_boundaries(rng: &mut SplitMix64, len: usize) -> Vec<usize> {
    if len < 2 {
        return Vec::new();
    }
    let count = rng.below(len.min(16)) + 1;
    let mut out: Vec<usize> = (0..count).map(|_| 1 + rng.below(len - 1)).collect();
    out.sort_unstable();
    out.dedup();
    out
}

fn is_ci() -> bool {
    std::env::var_os("CI").is_some()
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.parse().ok()
}

fn seed_count() -> usize {
    env_usize("DOM_HANDLER_STREAMING_PARITY_SEEDS").unwrap_or(if is_ci() {
        DEFAULT_SEEDS_CI
    } else {
        DEFAULT_SEEDS_LOCAL
    })
}

fn run_budget() -> usize {
    env_usize("DOM_HANDLER_STREAMING_PARITY_BUDGET").unwrap_or(if is_ci() {
        DEFAULT_BUDGET_CI
    } else {
        DEFAULT_BUDGET_LOCAL
    })
}
