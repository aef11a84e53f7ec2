mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Backends, Config, Context, EmbeddingProviderConfig, Feedback, Fusion, Grounding,
	LexicalBackend, LlmProviderConfig, ProviderConfig, Providers, Rerank, Retrieval, Search,
	Service, VectorBackend,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.request_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "service.request_timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (label, timeout_ms) in [
		("backends.lexical.timeout_ms", cfg.backends.lexical.timeout_ms),
		("backends.vector.timeout_ms", cfg.backends.vector.timeout_ms),
		("providers.embedding.timeout_ms", cfg.providers.embedding.timeout_ms),
		("providers.rerank.timeout_ms", cfg.providers.rerank.timeout_ms),
		("providers.generation.timeout_ms", cfg.providers.generation.timeout_ms),
		("feedback.timeout_ms", cfg.feedback.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if cfg.backends.lexical.index.trim().is_empty() {
		return Err(Error::Validation {
			message: "backends.lexical.index must be non-empty.".to_string(),
		});
	}
	if cfg.backends.vector.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "backends.vector.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.backends.vector.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match backends.vector.vector_dim."
				.to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("generation", &cfg.providers.generation.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if !cfg.providers.generation.temperature.is_finite()
		|| cfg.providers.generation.temperature < 0.0
	{
		return Err(Error::Validation {
			message: "providers.generation.temperature must be a finite number, zero or greater."
				.to_string(),
		});
	}
	if cfg.providers.generation.max_tokens == 0 {
		return Err(Error::Validation {
			message: "providers.generation.max_tokens must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.candidate_depth == 0 {
		return Err(Error::Validation {
			message: "retrieval.candidate_depth must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.filter_fields.iter().any(|field| field.trim().is_empty()) {
		return Err(Error::Validation {
			message: "retrieval.filter_fields entries must be non-empty.".to_string(),
		});
	}
	if cfg.fusion.rrf_k == 0 {
		return Err(Error::Validation {
			message: "fusion.rrf_k must be greater than zero.".to_string(),
		});
	}
	if cfg.fusion.top_n == 0 {
		return Err(Error::Validation {
			message: "fusion.top_n must be greater than zero.".to_string(),
		});
	}
	if cfg.rerank.top_m == 0 {
		return Err(Error::Validation {
			message: "rerank.top_m must be greater than zero.".to_string(),
		});
	}
	if cfg.context.max_tokens == 0 {
		return Err(Error::Validation {
			message: "context.max_tokens must be greater than zero.".to_string(),
		});
	}

	let threshold = cfg.grounding.coverage_threshold;

	if !threshold.is_finite() {
		return Err(Error::Validation {
			message: "grounding.coverage_threshold must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&threshold) {
		return Err(Error::Validation {
			message: "grounding.coverage_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}

	let ratio = cfg.grounding.retry_context_ratio;

	if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
		return Err(Error::Validation {
			message: "grounding.retry_context_ratio must be greater than 0.0 and at most 1.0."
				.to_string(),
		});
	}
	if cfg.search.max_top_k == 0 {
		return Err(Error::Validation {
			message: "search.max_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_top_k == 0 || cfg.search.default_top_k > cfg.search.max_top_k {
		return Err(Error::Validation {
			message: "search.default_top_k must be between 1 and search.max_top_k.".to_string(),
		});
	}
	if cfg.rerank.top_m > cfg.search.max_top_k {
		return Err(Error::Validation {
			message: "rerank.top_m must not exceed search.max_top_k.".to_string(),
		});
	}
	if cfg.search.highlight_fragments > 0 && cfg.search.highlight_fragment_chars == 0 {
		return Err(Error::Validation {
			message: "search.highlight_fragment_chars must be greater than zero when highlights are enabled."
				.to_string(),
		});
	}
	if cfg.search.facet_fields.iter().any(|field| field.trim().is_empty()) {
		return Err(Error::Validation {
			message: "search.facet_fields entries must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.backends.vector.vector_name.as_deref().map(|name| name.trim().is_empty()).unwrap_or(false)
	{
		cfg.backends.vector.vector_name = None;
	}
	if cfg.feedback.endpoint.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false) {
		cfg.feedback.endpoint = None;
	}

	for field in cfg.retrieval.filter_fields.iter_mut().chain(cfg.search.facet_fields.iter_mut()) {
		*field = field.trim().to_string();
	}
}
