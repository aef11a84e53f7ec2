use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Runs one chat completion and returns the assistant text.
///
/// No retries happen here; the caller owns the retry policy.
pub async fn generate(cfg: &searchit_config::LlmProviderConfig, messages: &[Value]) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"max_tokens": cfg.max_tokens,
		"messages": messages,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_generation_text(&json)
}

fn parse_generation_text(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.or_else(|| json.get("text").and_then(|t| t.as_str()));
	let Some(content) = content else {
		return Err(Error::InvalidResponse {
			message: "Generation response is missing message content.".to_string(),
		});
	};

	if content.trim().is_empty() {
		return Err(Error::InvalidResponse {
			message: "Generation response content is empty.".to_string(),
		});
	}

	Ok(content.to_string())
}
