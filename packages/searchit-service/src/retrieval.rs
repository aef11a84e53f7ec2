use std::collections::{HashMap, HashSet};

use serde::Serialize;

use searchit_domain::{ChunkRecord, Query, RetrievalCandidate, RetrievalSource};

use crate::{Deadline, Error, Result, ScoredChunk, SearchItService, StageError};

/// Non-fatal stage failures carried on search and ask responses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Degradation {
	pub degraded_retrieval: bool,
	pub unavailable_sources: Vec<RetrievalSource>,
	pub unreranked: bool,
	pub deadline_exceeded: bool,
}
impl Degradation {
	pub fn from_retrieval(outcome: &RetrievalOutcome) -> Self {
		Self {
			degraded_retrieval: !outcome.unavailable_sources.is_empty(),
			unavailable_sources: outcome.unavailable_sources.clone(),
			unreranked: false,
			deadline_exceeded: outcome.deadline_exceeded,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct RetrievalOutcome {
	/// One ranked list per backend that answered, in [`RetrievalSource`] order.
	pub lists: Vec<Vec<RetrievalCandidate>>,
	/// Chunk fields keyed by chunk id, taken from the first hit that carried text.
	pub chunks: HashMap<String, ChunkRecord>,
	pub unavailable_sources: Vec<RetrievalSource>,
	pub deadline_exceeded: bool,
}
impl RetrievalOutcome {
	pub fn candidate_count(&self) -> usize {
		self.lists.iter().map(Vec::len).sum()
	}
}

impl SearchItService {
	/// Queries both backends concurrently. A failed backend contributes nothing and is reported;
	/// the request fails only when every backend failed.
	pub async fn retrieve(&self, query: &Query, deadline: &Deadline) -> Result<RetrievalOutcome> {
		let depth = self.cfg.retrieval.candidate_depth;
		let lexical = deadline.run(
			self.cfg.backends.lexical.timeout_ms,
			self.backends.lexical.retrieve(&query.text, &query.filters, depth),
		);
		let vector = self.vector_hits(query, depth, deadline);
		let (lexical, vector) = tokio::join!(lexical, vector);
		let mut outcome = RetrievalOutcome::default();

		for (source, result) in [(RetrievalSource::Lexical, lexical), (RetrievalSource::Vector, vector)]
		{
			match result {
				Ok(hits) => {
					let list = normalize_hits(source, hits, &mut outcome.chunks);

					tracing::debug!(source = source.as_str(), hits = list.len(), "Backend answered.");

					outcome.lists.push(list);
				},
				Err(err) => {
					tracing::warn!(
						source = source.as_str(),
						error = %err,
						"Retrieval backend unavailable."
					);

					outcome.deadline_exceeded |= err.is_deadline();
					outcome.unavailable_sources.push(source);
				},
			}
		}

		if outcome.lists.is_empty() {
			return Err(Error::AllBackendsUnavailable);
		}

		Ok(outcome)
	}

	async fn vector_hits(
		&self,
		query: &Query,
		depth: u32,
		deadline: &Deadline,
	) -> std::result::Result<Vec<ScoredChunk>, StageError> {
		let embedding_cfg = &self.cfg.providers.embedding;
		let vectors = deadline
			.run(
				embedding_cfg.timeout_ms,
				self.providers.embedding.embed(embedding_cfg, std::slice::from_ref(&query.text)),
			)
			.await?;
		let Some(vector) = vectors.into_iter().next() else {
			return Err(StageError::Failed {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.backends.vector.vector_dim as usize {
			return Err(StageError::Failed {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		deadline
			.run(
				self.cfg.backends.vector.timeout_ms,
				self.backends.vector.retrieve(&vector, &query.filters, depth),
			)
			.await
	}
}

/// Turns one backend's hits into candidates with dense 1-based ranks.
///
/// Repeated `(doc_id, chunk_id)` pairs keep their first position. Chunk fields are recorded in
/// `chunks` unless a record with text is already present.
pub fn normalize_hits(
	source: RetrievalSource,
	hits: Vec<ScoredChunk>,
	chunks: &mut HashMap<String, ChunkRecord>,
) -> Vec<RetrievalCandidate> {
	let mut seen = HashSet::new();
	let mut out = Vec::with_capacity(hits.len());

	for hit in hits {
		if hit.chunk_id.trim().is_empty() {
			tracing::warn!(source = source.as_str(), "Skipping hit without chunk_id.");

			continue;
		}
		if !seen.insert((hit.doc_id.clone(), hit.chunk_id.clone())) {
			continue;
		}

		if let Some(record) = hit.record {
			let has_text = chunks.get(&hit.chunk_id).is_some_and(|r| !r.text.trim().is_empty());

			if !has_text && (!record.text.trim().is_empty() || !chunks.contains_key(&hit.chunk_id))
			{
				chunks.insert(hit.chunk_id.clone(), record);
			}
		}

		out.push(RetrievalCandidate {
			doc_id: hit.doc_id,
			chunk_id: hit.chunk_id,
			source,
			raw_score: hit.score,
			rank_in_source: out.len() as u32 + 1,
		});
	}

	out
}
