use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Retrieval backend that produced a candidate list.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
	Lexical,
	Vector,
}
impl RetrievalSource {
	pub const ALL: [Self; 2] = [Self::Lexical, Self::Vector];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Lexical => "lexical",
			Self::Vector => "vector",
		}
	}
}

/// Immutable per-request query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
	pub text: String,
	/// Equality constraints keyed by field name.
	pub filters: BTreeMap<String, String>,
	pub top_k: u32,
}

/// Chunk content and metadata carried alongside retrieval hits.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ChunkRecord {
	pub doc_id: String,
	pub chunk_id: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub text: String,
	#[serde(default)]
	pub url: String,
	#[serde(default)]
	pub section: String,
	#[serde(default)]
	pub lang: String,
	#[serde(default)]
	pub tags: Vec<String>,
	/// Token count computed by the indexing pipeline, when it recorded one.
	#[serde(default)]
	pub token_count: Option<u32>,
}

/// One ranked hit from a single backend.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalCandidate {
	pub doc_id: String,
	pub chunk_id: String,
	pub source: RetrievalSource,
	pub raw_score: f32,
	/// 1-based, unique within `source` for one query.
	pub rank_in_source: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FusedCandidate {
	pub doc_id: String,
	pub chunk_id: String,
	pub fused_score: f64,
	pub contributing_sources: BTreeSet<RetrievalSource>,
	/// Best rank per contributing source.
	pub source_ranks: BTreeMap<RetrievalSource, u32>,
	/// 1-based position in the fused ordering.
	pub fused_rank: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RerankedCandidate {
	pub fused: FusedCandidate,
	/// `None` when the reranker was skipped and fusion order passed through.
	pub rerank_score: Option<f32>,
	/// 1-based final position.
	pub position: u32,
}
impl RerankedCandidate {
	pub fn chunk_id(&self) -> &str {
		self.fused.chunk_id.as_str()
	}

	pub fn doc_id(&self) -> &str {
		self.fused.doc_id.as_str()
	}

	/// Score reported to callers: the model score, or the fused score when unreranked.
	pub fn score(&self) -> f64 {
		self.rerank_score.map(f64::from).unwrap_or(self.fused.fused_score)
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContextChunk {
	pub chunk_id: String,
	pub doc_id: String,
	pub text: String,
	pub token_count: u32,
	/// Length of `text` in chars; citation spans are validated against it.
	pub char_len: usize,
	/// 1-based rank of the chunk inside the context.
	pub position: u32,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Span {
	pub start: usize,
	pub end: usize,
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Citation {
	pub chunk_id: String,
	pub span: Span,
}
