//! Reciprocal Rank Fusion over per-backend candidate lists.
//!
//! A chunk's fused score is `sum(1 / (k + rank))` over every source that returned it. Scores
//! are summed in source order, not input order, so swapping the input lists never changes a
//! single bit of the result.

use std::{
	cmp::Ordering,
	collections::{BTreeMap, BTreeSet, HashMap},
};

use crate::types::{FusedCandidate, RetrievalCandidate, RetrievalSource};

pub const DEFAULT_RRF_K: u32 = 60;
pub const DEFAULT_TOP_N: u32 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RrfFusion {
	k: u32,
	top_n: u32,
}
impl RrfFusion {
	pub fn new(k: u32, top_n: u32) -> Self {
		Self { k: k.max(1), top_n }
	}

	pub fn from_config(cfg: &searchit_config::Fusion) -> Self {
		Self::new(cfg.rrf_k, cfg.top_n)
	}

	pub fn k(&self) -> u32 {
		self.k
	}

	pub fn top_n(&self) -> u32 {
		self.top_n
	}

	/// Contribution of a single appearance at `rank` (1-based).
	pub fn contribution(&self, rank: u32) -> f64 {
		1.0 / (f64::from(self.k) + f64::from(rank.max(1)))
	}

	pub fn fuse(&self, lists: &[Vec<RetrievalCandidate>]) -> Vec<FusedCandidate> {
		if self.top_n == 0 {
			return Vec::new();
		}

		struct Entry {
			doc_id: String,
			doc_source: RetrievalSource,
			source_ranks: BTreeMap<RetrievalSource, u32>,
		}

		let mut by_chunk: HashMap<&str, Entry> = HashMap::new();

		for list in lists {
			for candidate in list {
				let rank = candidate.rank_in_source.max(1);

				match by_chunk.get_mut(candidate.chunk_id.as_str()) {
					Some(entry) => {
						let best = entry.source_ranks.entry(candidate.source).or_insert(rank);

						*best = (*best).min(rank);

						if candidate.source < entry.doc_source {
							entry.doc_id = candidate.doc_id.clone();
							entry.doc_source = candidate.source;
						}
					},
					None => {
						let mut source_ranks = BTreeMap::new();

						source_ranks.insert(candidate.source, rank);
						by_chunk.insert(
							candidate.chunk_id.as_str(),
							Entry {
								doc_id: candidate.doc_id.clone(),
								doc_source: candidate.source,
								source_ranks,
							},
						);
					},
				}
			}
		}

		let mut fused: Vec<FusedCandidate> = by_chunk
			.into_iter()
			.map(|(chunk_id, entry)| {
				let fused_score =
					entry.source_ranks.values().map(|rank| self.contribution(*rank)).sum();
				let contributing_sources: BTreeSet<RetrievalSource> =
					entry.source_ranks.keys().copied().collect();

				FusedCandidate {
					doc_id: entry.doc_id,
					chunk_id: chunk_id.to_string(),
					fused_score,
					contributing_sources,
					source_ranks: entry.source_ranks,
					fused_rank: 0,
				}
			})
			.collect();

		fused.sort_by(cmp_fused);
		fused.truncate(self.top_n as usize);

		for (idx, candidate) in fused.iter_mut().enumerate() {
			candidate.fused_rank = idx as u32 + 1;
		}

		fused
	}
}
impl Default for RrfFusion {
	fn default() -> Self {
		Self::new(DEFAULT_RRF_K, DEFAULT_TOP_N)
	}
}

/// Score descending, then source count descending, then chunk id ascending.
pub fn cmp_fused(left: &FusedCandidate, right: &FusedCandidate) -> Ordering {
	cmp_f64_desc(left.fused_score, right.fused_score)
		.then_with(|| right.contributing_sources.len().cmp(&left.contributing_sources.len()))
		.then_with(|| left.chunk_id.cmp(&right.chunk_id))
}

pub fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
