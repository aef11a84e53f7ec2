use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub backends: Backends,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub fusion: Fusion,
	#[serde(default)]
	pub rerank: Rerank,
	#[serde(default)]
	pub context: Context,
	#[serde(default)]
	pub grounding: Grounding,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub feedback: Feedback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Overall per-request deadline. Every stage timeout is capped by what remains of it.
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
	#[serde(default = "default_true")]
	pub bind_localhost_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backends {
	pub lexical: LexicalBackend,
	pub vector: VectorBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LexicalBackend {
	pub url: String,
	pub index: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorBackend {
	pub url: String,
	pub collection: String,
	/// Named vector inside the collection. `None` queries the unnamed default vector.
	pub vector_name: Option<String>,
	pub vector_dim: u32,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub generation: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	#[serde(default = "default_generation_max_tokens")]
	pub max_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	/// Per-backend candidate depth, independent of the caller's `top_k`.
	pub candidate_depth: u32,
	pub filter_fields: Vec<String>,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			candidate_depth: 50,
			filter_fields: ["lang", "tags", "section", "doc_id"]
				.into_iter()
				.map(str::to_string)
				.collect(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Fusion {
	pub rrf_k: u32,
	pub top_n: u32,
}
impl Default for Fusion {
	fn default() -> Self {
		Self { rrf_k: 60, top_n: 50 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Rerank {
	pub enabled: bool,
	pub top_m: u32,
}
impl Default for Rerank {
	fn default() -> Self {
		Self { enabled: true, top_m: 8 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Context {
	pub max_tokens: u32,
}
impl Default for Context {
	fn default() -> Self {
		Self { max_tokens: 2_048 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Grounding {
	pub coverage_threshold: f32,
	/// Fraction of the assembled context kept for the single generation retry.
	pub retry_context_ratio: f32,
}
impl Default for Grounding {
	fn default() -> Self {
		Self { coverage_threshold: 0.3, retry_context_ratio: 0.5 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_top_k: u32,
	pub max_top_k: u32,
	pub highlight_fragments: u32,
	pub highlight_fragment_chars: u32,
	pub facet_fields: Vec<String>,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_top_k: 10,
			max_top_k: 100,
			highlight_fragments: 3,
			highlight_fragment_chars: 160,
			facet_fields: vec!["lang".to_string(), "tags".to_string()],
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Feedback {
	/// External store that receives accepted feedback events. Events are only logged when unset.
	pub endpoint: Option<String>,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}
impl Default for Feedback {
	fn default() -> Self {
		Self { endpoint: None, timeout_ms: 2_000, default_headers: Map::new() }
	}
}

fn default_request_timeout_ms() -> u64 {
	10_000
}

fn default_generation_max_tokens() -> u32 {
	512
}

fn default_true() -> bool {
	true
}
