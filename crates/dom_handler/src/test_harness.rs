//! Chunked-delivery helpers shared by the streaming tests.

use crate::dom::Dom;
use crate::dom_handler::{DomHandler, DomHandlerOptions};
use crate::parser::{Parser, ParserOptions, parse_document};
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BoundaryPolicy {
    /// Chunks are `&str` slices split on char boundaries.
    Utf8Aligned,
    /// Chunks are raw byte slices; the parser carries split sequences.
    ByteStream,
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryPolicy::Utf8Aligned => f.write_str("utf8"),
            BoundaryPolicy::ByteStream => f.write_str("bytes"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChunkPlan {
    Fixed {
        size: usize,
        policy: BoundaryPolicy,
    },
    Boundaries {
        indices: Vec<usize>,
        policy: BoundaryPolicy,
    },
}

impl fmt::Display for ChunkPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkPlan::Fixed { size, policy } => write!(f, "fixed size={size} policy={policy}"),
            ChunkPlan::Boundaries { indices, policy } => write!(
                f,
                "boundaries count={} policy={policy} indices={indices:?}",
                indices.len()
            ),
        }
    }
}

impl ChunkPlan {
    pub fn fixed(size: usize) -> Self {
        Self::Fixed {
            size,
            policy: BoundaryPolicy::Utf8Aligned,
        }
    }

    pub fn fixed_unaligned(size: usize) -> Self {
        Self::Fixed {
            size,
            policy: BoundaryPolicy::ByteStream,
        }
    }

    pub fn boundaries(indices: impl Into<Vec<usize>>) -> Self {
        Self::Boundaries {
            indices: indices.into(),
            policy: BoundaryPolicy::Utf8Aligned,
        }
    }

    pub fn boundaries_unaligned(indices: impl Into<Vec<usize>>) -> Self {
        Self::Boundaries {
            indices: indices.into(),
            policy: BoundaryPolicy::ByteStream,
        }
    }

    pub fn policy(&self) -> BoundaryPolicy {
        match self {
            ChunkPlan::Fixed { policy, .. } | ChunkPlan::Boundaries { policy, .. } => *policy,
        }
    }

    /// Split points in `(0, len)`, sorted and deduplicated.
    pub fn split_points(&self, input: &str) -> Vec<usize> {
        let len = input.len();
        let mut points = match self {
            ChunkPlan::Fixed { size, .. } => {
                assert!(*size > 0, "chunk size must be > 0");
                (1..)
                    .map(|i| i * size)
                    .take_while(|&idx| idx < len)
                    .collect()
            }
            ChunkPlan::Boundaries { indices, .. } => indices.clone(),
        };
        points.sort_unstable();
        points.dedup();
        filter_boundaries_by_policy(input, &points, self.policy())
    }

    pub fn for_each_chunk(&self, input: &str, mut f: impl FnMut(&[u8])) {
        let bytes = input.as_bytes();
        let mut last = 0usize;
        for idx in self.split_points(input) {
            f(&bytes[last..idx]);
            last = idx;
        }
        if last < bytes.len() {
            f(&bytes[last..]);
        }
    }
}

pub(crate) fn filter_boundaries_by_policy(
    input: &str,
    indices: &[usize],
    policy: BoundaryPolicy,
) -> Vec<usize> {
    indices
        .iter()
        .copied()
        .filter(|&idx| idx > 0 && idx < input.len())
        .filter(|&idx| policy == BoundaryPolicy::ByteStream || input.is_char_boundary(idx))
        .collect()
}

pub fn run_full(input: &str, options: &DomHandlerOptions) -> Dom {
    parse_document(input, options).unwrap_or_else(|err| panic!("whole-input parse failed: {err}"))
}

pub fn run_chunked(input: &str, plan: &ChunkPlan, options: &DomHandlerOptions) -> Dom {
    let mut parser = Parser::new(DomHandler::new(*options), ParserOptions::from(options));
    plan.for_each_chunk(input, |chunk| {
        let result = match plan.policy() {
            BoundaryPolicy::Utf8Aligned => match std::str::from_utf8(chunk) {
                Ok(text) => parser.write(text),
                Err(err) => panic!("plan {plan} produced a non-UTF-8 chunk: {err}"),
            },
            BoundaryPolicy::ByteStream => parser.write_bytes(chunk),
        };
        if let Err(err) = result {
            panic!("chunked parse failed under {plan}: {err}");
        }
    });
    if let Err(err) = parser.end() {
        panic!("chunked end failed under {plan}: {err}");
    }
    parser.into_handler().into_dom()
}

/// Feed `bytes` split at `boundaries` through the byte-stream entry point.
pub fn run_chunked_bytes(bytes: &[u8], boundaries: &[usize], options: &DomHandlerOptions) -> Dom {
    let mut parser = Parser::new(DomHandler::new(*options), ParserOptions::from(options));
    let mut last = 0usize;
    for &idx in boundaries.iter().chain(std::iter::once(&bytes.len())) {
        if idx <= last || idx > bytes.len() {
            continue;
        }
        if let Err(err) = parser.write_bytes(&bytes[last..idx]) {
            panic!("byte-stream write failed at {last}..{idx}: {err}");
        }
        last = idx;
    }
    if let Err(err) = parser.end() {
        panic!("byte-stream end failed: {err}");
    }
    parser.into_handler().into_dom()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_plan_covers_the_input() {
        let mut chunks = Vec::new();
        ChunkPlan::fixed(3).for_each_chunk("abcdefgh", |c| chunks.push(c.to_vec()));
        assert_eq!(chunks, vec![b"abc".to_vec(), b"def".to_vec(), b"gh".to_vec()]);
    }

    #[test]
    fn aligned_plans_skip_mid_char_boundaries() {
        let input = "aé";
        assert_eq!(ChunkPlan::boundaries(vec![1, 2]).split_points(input), vec![1]);
        assert_eq!(
            ChunkPlan::boundaries_unaligned(vec![1, 2]).split_points(input),
            vec![1, 2]
        );
    }

    #[test]
    fn boundaries_are_sorted_and_clipped() {
        let plan = ChunkPlan::boundaries(vec![5, 0, 2, 2, 99]);
        assert_eq!(plan.split_points("abcdefg"), vec![2, 5]);
    }
}
