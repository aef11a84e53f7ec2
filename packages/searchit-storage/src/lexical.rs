use std::{collections::BTreeMap, time::Duration};

use reqwest::{Client, header::HeaderMap};
use serde_json::Value;

use searchit_domain::ChunkRecord;

use crate::{Error, Result, models::ScoredChunk};

/// BM25 search over an OpenSearch-compatible index of chunk documents.
pub struct LexicalStore {
	client: Client,
	url: String,
	index: String,
	headers: HeaderMap,
}
impl LexicalStore {
	pub fn new(cfg: &searchit_config::LexicalBackend) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			client,
			url: cfg.url.trim_end_matches('/').to_string(),
			index: cfg.index.clone(),
			headers: crate::static_headers(&cfg.default_headers)?,
		})
	}

	pub async fn search(
		&self,
		text: &str,
		filters: &BTreeMap<String, String>,
		depth: u32,
	) -> Result<Vec<ScoredChunk>> {
		let url = format!("{}/{}/_search", self.url, self.index);
		let res = self
			.client
			.post(url)
			.headers(self.headers.clone())
			.json(&search_body(text, filters, depth))
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_hits(json)
	}
}

pub fn search_body(text: &str, filters: &BTreeMap<String, String>, depth: u32) -> Value {
	let filter: Vec<Value> = filters
		.iter()
		.map(|(field, value)| serde_json::json!({ "term": { field: value } }))
		.collect();

	serde_json::json!({
		"size": depth,
		"query": {
			"bool": {
				"must": [
					{ "multi_match": { "query": text, "fields": ["title^2", "text"] } }
				],
				"filter": filter,
			}
		}
	})
}

/// Reads `hits.hits` in response order. Hits without a usable `_source` are skipped.
pub fn parse_hits(json: Value) -> Result<Vec<ScoredChunk>> {
	let hits = json
		.get("hits")
		.and_then(|hits| hits.get("hits"))
		.and_then(|hits| hits.as_array())
		.ok_or_else(|| Error::InvalidResponse("Lexical response is missing hits.".to_string()))?;
	let mut out = Vec::with_capacity(hits.len());

	for hit in hits {
		let score = hit.get("_score").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
		let mut source = hit.get("_source").cloned().unwrap_or_else(|| serde_json::json!({}));

		if source.get("chunk_id").is_none()
			&& let (Some(obj), Some(id)) =
				(source.as_object_mut(), hit.get("_id").and_then(|v| v.as_str()))
		{
			obj.insert("chunk_id".to_string(), Value::String(id.to_string()));
		}

		let record: ChunkRecord = match serde_json::from_value(source) {
			Ok(record) => record,
			Err(err) => {
				tracing::warn!(error = %err, "Skipping lexical hit with unreadable source.");

				continue;
			},
		};

		out.push(
			ScoredChunk::new(record.doc_id.clone(), record.chunk_id.clone(), score)
				.with_record(record),
		);
	}

	Ok(out)
}
