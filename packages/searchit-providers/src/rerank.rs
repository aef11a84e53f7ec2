use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Scores `(query, doc)` pairs with a cross-encoder rerank endpoint.
///
/// The returned scores are aligned with `docs`. Documents the provider did not score get
/// `f32::NEG_INFINITY` so they sink below every scored document.
pub async fn rerank(
	cfg: &searchit_config::ProviderConfig,
	query: &str,
	docs: &[String],
) -> Result<Vec<f32>> {
	if docs.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let body = serde_json::json!({ "model": cfg.model, "query": query, "documents": docs });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(json, docs.len())
}

fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<f32>> {
	let mut scores = vec![f32::NEG_INFINITY; doc_count];
	let results = json.get("results").or_else(|| json.get("data")).and_then(|v| v.as_array());
	let Some(results) = results else {
		return Err(Error::InvalidResponse {
			message: "Rerank response is missing results array.".to_string(),
		});
	};

	for item in results {
		let index = item.get("index").and_then(|v| v.as_u64()).ok_or_else(|| {
			Error::InvalidResponse { message: "Rerank result missing index.".to_string() }
		})? as usize;
		let score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| Error::InvalidResponse {
				message: "Rerank result missing score.".to_string(),
			})? as f32;

		if index < scores.len() {
			scores[index] = score;
		} else {
			tracing::warn!(index, doc_count, "Rerank result index out of range.");
		}
	}

	Ok(scores)
}
