use std::collections::HashMap;

use searchit_domain::{ChunkRecord, FusedCandidate, RerankedCandidate, rerank};

use crate::{Deadline, SearchItService};

pub(crate) struct RerankOutcome {
	pub(crate) candidates: Vec<RerankedCandidate>,
	pub(crate) unreranked: bool,
	pub(crate) deadline_exceeded: bool,
}
impl RerankOutcome {
	fn passthrough(fused: &[FusedCandidate], keep: usize, deadline_exceeded: bool) -> Self {
		Self { candidates: rerank::passthrough(fused, keep), unreranked: true, deadline_exceeded }
	}
}

impl SearchItService {
	/// Reorders fused candidates by cross-encoder score and keeps the best `keep`.
	///
	/// Any reranker failure leaves the fused order in place and marks the outcome unreranked.
	pub(crate) async fn rerank_stage(
		&self,
		query: &str,
		fused: &[FusedCandidate],
		chunks: &HashMap<String, ChunkRecord>,
		keep: usize,
		deadline: &Deadline,
	) -> RerankOutcome {
		if fused.is_empty() {
			return RerankOutcome {
				candidates: Vec::new(),
				unreranked: false,
				deadline_exceeded: false,
			};
		}
		if !self.cfg.rerank.enabled {
			return RerankOutcome::passthrough(fused, keep, false);
		}

		let docs: Vec<String> =
			fused.iter().map(|candidate| rerank_text(chunks.get(&candidate.chunk_id))).collect();
		let cfg = &self.cfg.providers.rerank;
		let scored = deadline.run(cfg.timeout_ms, self.providers.rerank.rerank(cfg, query, &docs));
		let scores = match scored.await {
			Ok(scores) => scores,
			Err(err) => {
				tracing::warn!(
					error = %err,
					candidates = fused.len(),
					"Reranker unavailable, keeping fused order."
				);

				return RerankOutcome::passthrough(fused, keep, err.is_deadline());
			},
		};

		match rerank::order_by_rerank_scores(fused, &scores, keep) {
			Some(candidates) =>
				RerankOutcome { candidates, unreranked: false, deadline_exceeded: false },
			None => {
				tracing::warn!(
					expected = fused.len(),
					received = scores.len(),
					"Reranker returned a mismatched score count, keeping fused order."
				);

				RerankOutcome::passthrough(fused, keep, false)
			},
		}
	}
}

fn rerank_text(record: Option<&ChunkRecord>) -> String {
	let Some(record) = record else { return String::new() };

	if record.text.trim().is_empty() { record.title.clone() } else { record.text.clone() }
}
