use std::cmp::Ordering;

use crate::types::{FusedCandidate, RerankedCandidate};

pub const DEFAULT_TOP_M: u32 = 8;

/// Orders fused candidates by model score. Equal scores keep their fused order.
///
/// Returns `None` when the scorer did not return exactly one score per candidate.
pub fn order_by_rerank_scores(
	fused: &[FusedCandidate],
	scores: &[f32],
	keep: usize,
) -> Option<Vec<RerankedCandidate>> {
	if fused.len() != scores.len() {
		return None;
	}

	let mut order: Vec<usize> = (0..fused.len()).collect();

	// `sort_by` is stable, so ties fall back to the incoming fused order.
	order.sort_by(|left, right| cmp_f32_desc(scores[*left], scores[*right]));

	Some(
		order
			.into_iter()
			.take(keep)
			.enumerate()
			.map(|(idx, source_idx)| RerankedCandidate {
				fused: fused[source_idx].clone(),
				rerank_score: Some(scores[source_idx]),
				position: idx as u32 + 1,
			})
			.collect(),
	)
}

/// Fused order, untouched, for when the reranker is unavailable.
pub fn passthrough(fused: &[FusedCandidate], keep: usize) -> Vec<RerankedCandidate> {
	fused
		.iter()
		.take(keep)
		.enumerate()
		.map(|(idx, candidate)| RerankedCandidate {
			fused: candidate.clone(),
			rerank_score: None,
			position: idx as u32 + 1,
		})
		.collect()
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
