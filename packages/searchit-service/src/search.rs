use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use searchit_domain::{
	ChunkRecord, FacetCounts, Highlighter, Query, RerankedCandidate, RrfFusion, facets,
};

use crate::{Deadline, Degradation, Error, Result, SearchItService};

#[derive(Clone, Debug, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default = "default_true")]
	pub with_highlights: bool,
	#[serde(default)]
	pub filters: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchHit {
	pub doc_id: String,
	pub chunk_id: String,
	pub score: f64,
	pub title: String,
	pub url: String,
	pub highlights: Vec<String>,
	pub section: String,
	pub lang: String,
	pub tags: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
	pub query: String,
	pub results: Vec<SearchHit>,
	pub facets: FacetCounts,
	#[serde(flatten)]
	pub degradation: Degradation,
}

impl SearchItService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let deadline = Deadline::after_ms(self.cfg.service.request_timeout_ms);
		let query = self.build_query("q", &req.query, req.top_k, req.filters)?;

		tracing::info!(
			query_len = query.text.len(),
			top_k = query.top_k,
			filters = query.filters.len(),
			"Search request."
		);

		let retrieval = self.retrieve(&query, &deadline).await?;
		let fused = RrfFusion::from_config(&self.cfg.fusion).fuse(&retrieval.lists);
		let reranked = self
			.rerank_stage(&query.text, &fused, &retrieval.chunks, query.top_k as usize, &deadline)
			.await;
		let records = reranked.candidates.iter().filter_map(|c| retrieval.chunks.get(c.chunk_id()));
		let facets = facets::facet_counts(records, &self.cfg.search.facet_fields);
		let highlighter = req.with_highlights.then(|| Highlighter::from_config(&self.cfg.search));
		let results = reranked
			.candidates
			.iter()
			.map(|candidate| {
				search_hit(
					candidate,
					retrieval.chunks.get(candidate.chunk_id()),
					highlighter.as_ref().map(|h| (h, query.text.as_str())),
				)
			})
			.collect::<Vec<_>>();
		let mut degradation = Degradation::from_retrieval(&retrieval);

		degradation.unreranked = reranked.unreranked;
		degradation.deadline_exceeded |= reranked.deadline_exceeded;

		tracing::info!(
			candidates = retrieval.candidate_count(),
			fused = fused.len(),
			results = results.len(),
			degraded = degradation.degraded_retrieval,
			unreranked = degradation.unreranked,
			"Search completed."
		);

		Ok(SearchResponse { query: query.text, results, facets, degradation })
	}

	/// Validates caller input into a [`Query`]. `field` names the query text in error reports.
	pub(crate) fn build_query(
		&self,
		field: &str,
		text: &str,
		top_k: Option<u32>,
		filters: BTreeMap<String, String>,
	) -> Result<Query> {
		let text = text.trim();

		if text.is_empty() {
			return Err(Error::invalid(format!("{field} must be non-empty."), field));
		}

		let max_top_k = self.cfg.search.max_top_k;
		let top_k = top_k.unwrap_or(self.cfg.search.default_top_k);

		if top_k == 0 || top_k > max_top_k {
			return Err(Error::invalid(format!("top_k must be between 1 and {max_top_k}."), "top_k"));
		}

		let unknown: Vec<String> = filters
			.keys()
			.filter(|key| !self.cfg.retrieval.filter_fields.iter().any(|field| field == *key))
			.cloned()
			.collect();

		if !unknown.is_empty() {
			return Err(Error::InvalidRequest {
				message: format!("Unsupported filter fields: {}.", unknown.join(", ")),
				fields: unknown,
			});
		}

		let filters = filters
			.into_iter()
			.map(|(key, value)| (key, value.trim().to_string()))
			.filter(|(_, value)| !value.is_empty())
			.collect();

		Ok(Query { text: text.to_string(), filters, top_k })
	}
}

fn search_hit(
	candidate: &RerankedCandidate,
	record: Option<&ChunkRecord>,
	highlight: Option<(&Highlighter, &str)>,
) -> SearchHit {
	let empty = ChunkRecord::default();
	let record = record.unwrap_or(&empty);
	let highlights = match highlight {
		Some((highlighter, query)) => highlighter.highlight(query, &record.text),
		None => Vec::new(),
	};

	SearchHit {
		doc_id: candidate.doc_id().to_string(),
		chunk_id: candidate.chunk_id().to_string(),
		score: candidate.score(),
		title: record.title.clone(),
		url: record.url.clone(),
		highlights,
		section: record.section.clone(),
		lang: record.lang.clone(),
		tags: record.tags.clone(),
	}
}

fn default_true() -> bool {
	true
}
