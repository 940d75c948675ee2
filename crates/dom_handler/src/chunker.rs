//! Chunk plans aimed at the points where the tokenizer has to stop and wait
//! for more input: inside multi-byte delimiters, at tag edges and quotes, and
//! inside UTF-8 sequences. Random walks cover everything in between.

use crate::test_harness::{BoundaryPolicy, ChunkPlan, filter_boundaries_by_policy};

const FIXED_SIZES: [usize; 7] = [1, 2, 3, 5, 7, 13, 64];

/// Delimiters the tokenizer matches across writes. Matched case-insensitively.
const DELIMITERS: &[&str] = &[
    "<!--",
    "-->",
    "<![cdata[",
    "]]>",
    "</",
    "<?",
    "/>",
    "</script",
    "</style",
];

#[derive(Clone, Debug)]
pub struct ChunkPlanCase {
    pub label: String,
    pub plan: ChunkPlan,
}

pub fn build_chunk_plans(
    input: &str,
    fuzz_runs: usize,
    fuzz_seed: u64,
    policy: BoundaryPolicy,
) -> Vec<ChunkPlanCase> {
    let mut plans: Vec<ChunkPlanCase> = FIXED_SIZES
        .iter()
        .map(|&size| ChunkPlanCase {
            label: format!("fixed size={size}"),
            plan: fixed_plan(size, policy),
        })
        .collect();

    let lowered = input.to_ascii_lowercase();
    for delimiter in DELIMITERS {
        let cuts = filter_boundaries_by_policy(input, &interior_cuts(&lowered, delimiter), policy);
        if !cuts.is_empty() {
            plans.push(ChunkPlanCase {
                label: format!("inside {delimiter:?} cuts={}", cuts.len()),
                plan: boundaries_plan(cuts, policy),
            });
        }
    }

    let edges = filter_boundaries_by_policy(input, &tag_edges(input), policy);
    if !edges.is_empty() {
        plans.push(ChunkPlanCase {
            label: format!("tag edges cuts={}", edges.len()),
            plan: boundaries_plan(edges, policy),
        });
    }

    if policy == BoundaryPolicy::ByteStream {
        let inside: Vec<usize> = (1..input.len())
            .filter(|&idx| !input.is_char_boundary(idx))
            .collect();
        if !inside.is_empty() {
            plans.push(ChunkPlanCase {
                label: format!("inside utf8 sequences cuts={}", inside.len()),
                plan: boundaries_plan(inside, policy),
            });
        }
    }

    for run in 0..fuzz_runs {
        let seed = fuzz_seed.wrapping_add(run as u64);
        let cuts = random_walk(input, &mut SplitMix64::new(seed), policy);
        let plan = if cuts.is_empty() {
            fixed_plan(1, policy)
        } else {
            boundaries_plan(cuts, policy)
        };
        plans.push(ChunkPlanCase {
            label: format!("random walk seed=0x{seed:016x}"),
            plan,
        });
    }

    plans
}

fn fixed_plan(size: usize, policy: BoundaryPolicy) -> ChunkPlan {
    match policy {
        BoundaryPolicy::Utf8Aligned => ChunkPlan::fixed(size),
        BoundaryPolicy::ByteStream => ChunkPlan::fixed_unaligned(size),
    }
}

fn boundaries_plan(indices: Vec<usize>, policy: BoundaryPolicy) -> ChunkPlan {
    match policy {
        BoundaryPolicy::Utf8Aligned => ChunkPlan::boundaries(indices),
        BoundaryPolicy::ByteStream => ChunkPlan::boundaries_unaligned(indices),
    }
}

/// Every cut strictly inside an occurrence of `delimiter` in `haystack`.
fn interior_cuts(haystack: &str, delimiter: &str) -> Vec<usize> {
    let mut cuts: Vec<usize> = haystack
        .match_indices(delimiter)
        .flat_map(|(start, _)| start + 1..start + delimiter.len())
        .collect();
    cuts.sort_unstable();
    cuts.dedup();
    cuts
}

/// Cuts before `<`, after `>` and right after each quote.
fn tag_edges(input: &str) -> Vec<usize> {
    input
        .bytes()
        .enumerate()
        .filter_map(|(idx, byte)| match byte {
            b'<' => Some(idx),
            b'>' | b'"' | b'\'' => Some(idx + 1),
            _ => None,
        })
        .collect()
}

/// Walk the input in random steps of up to a quarter of its length.
fn random_walk(input: &str, rng: &mut SplitMix64, policy: BoundaryPolicy) -> Vec<usize> {
    let len = input.len();
    let max_step = (len / 4).clamp(1, 16);
    let mut cuts = Vec::new();
    let mut at = 0usize;
    loop {
        at += 1 + rng.below(max_step);
        if at >= len {
            break;
        }
        cuts.push(at);
    }
    filter_boundaries_by_policy(input, &cuts, policy)
}

/// SplitMix64; small, seedable and good enough to pick split points.
pub(crate) struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform-ish value in `0..upper`; `0` when `upper` is zero.
    pub(crate) fn below(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.next_u64() % upper as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(plans: &[ChunkPlanCase]) -> Vec<&str> {
        plans.iter().map(|case| case.label.as_str()).collect()
    }

    #[test]
    fn plans_are_reproducible_for_a_seed() {
        let input = "<div class=\"a\">text<!-- c --></div>";
        let a = build_chunk_plans(input, 4, 7, BoundaryPolicy::Utf8Aligned);
        let b = build_chunk_plans(input, 4, 7, BoundaryPolicy::Utf8Aligned);
        let a: Vec<_> = a.into_iter().map(|c| c.plan).collect();
        let b: Vec<_> = b.into_iter().map(|c| c.plan).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn delimiter_plans_cut_inside_each_occurrence() {
        let input = "a<!--b-->c</SCRIPT>";
        let plans = build_chunk_plans(input, 0, 0, BoundaryPolicy::Utf8Aligned);
        let find = |label: &str| {
            plans
                .iter()
                .find(|case| case.label.starts_with(label))
                .map(|case| case.plan.split_points(input))
        };
        assert_eq!(find("inside \"<!--\""), Some(vec![2, 3, 4]));
        assert_eq!(find("inside \"-->\""), Some(vec![7, 8]));
        assert_eq!(find("inside \"</script\""), Some(vec![11, 12, 13, 14, 15, 16, 17]));
        assert_eq!(find("inside \"]]>\""), None);
    }

    #[test]
    fn utf8_interior_cuts_only_for_byte_streams() {
        let input = "<b>é</b>";
        let bytes = build_chunk_plans(input, 0, 0, BoundaryPolicy::ByteStream);
        let text = build_chunk_plans(input, 0, 0, BoundaryPolicy::Utf8Aligned);
        assert!(labels(&bytes).contains(&"inside utf8 sequences cuts=1"));
        assert!(!labels(&text).iter().any(|l| l.starts_with("inside utf8")));
    }

    #[test]
    fn random_walks_stay_inside_the_input() {
        let input = "<p>héllo wörld</p>";
        for policy in [BoundaryPolicy::Utf8Aligned, BoundaryPolicy::ByteStream] {
            for case in build_chunk_plans(input, 16, 3, policy) {
                let points = case.plan.split_points(input);
                assert!(points.iter().all(|&p| p > 0 && p < input.len()), "{}", case.label);
                if policy == BoundaryPolicy::Utf8Aligned {
                    assert!(points.iter().all(|&p| input.is_char_boundary(p)), "{}", case.label);
                }
            }
        }
    }

    #[test]
    fn empty_input_falls_back_to_fixed_plans() {
        let plans = build_chunk_plans("", 2, 1, BoundaryPolicy::ByteStream);
        assert!(
            plans
                .iter()
                .all(|c| matches!(c.plan, ChunkPlan::Fixed { .. }))
        );
    }
}
