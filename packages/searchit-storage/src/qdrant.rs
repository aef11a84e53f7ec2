use std::collections::{BTreeMap, HashMap};

use qdrant_client::qdrant::{
	Condition, Filter, PointId, Query, QueryPointsBuilder, Value, point_id::PointIdOptions,
	value::Kind,
};

use searchit_domain::ChunkRecord;

use crate::{Error, Result, models::ScoredChunk};

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_name: Option<String>,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &searchit_config::VectorBackend) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_name: cfg.vector_name.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	/// Nearest chunks to `vector`, best first, restricted by payload equality filters.
	pub async fn search(
		&self,
		vector: &[f32],
		filters: &BTreeMap<String, String>,
		depth: u32,
	) -> Result<Vec<ScoredChunk>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.limit(depth as u64)
			.with_payload(true);

		if let Some(name) = self.vector_name.as_ref() {
			search = search.using(name.clone());
		}
		if let Some(filter) = payload_filter(filters) {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;
		let mut out = Vec::with_capacity(response.result.len());

		for point in &response.result {
			if let Some(hit) = scored_chunk(point.id.as_ref(), &point.payload, point.score) {
				out.push(hit);
			}
		}

		Ok(out)
	}
}

pub fn payload_filter(filters: &BTreeMap<String, String>) -> Option<Filter> {
	if filters.is_empty() {
		return None;
	}

	Some(Filter::must(
		filters.iter().map(|(field, value)| Condition::matches(field.as_str(), value.clone())),
	))
}

/// Maps a scored point to a chunk hit. Points without a doc id are skipped.
pub fn scored_chunk(
	id: Option<&PointId>,
	payload: &HashMap<String, Value>,
	score: f32,
) -> Option<ScoredChunk> {
	let chunk_id = payload_string(payload, "chunk_id").or_else(|| id.and_then(point_id_to_string));
	let Some(chunk_id) = chunk_id else {
		tracing::warn!("Vector hit missing chunk_id.");

		return None;
	};
	let Some(doc_id) = payload_string(payload, "doc_id") else {
		tracing::warn!(chunk_id = %chunk_id, "Vector hit missing doc_id.");

		return None;
	};
	let record = ChunkRecord {
		doc_id: doc_id.clone(),
		chunk_id: chunk_id.clone(),
		title: payload_string(payload, "title").unwrap_or_default(),
		text: payload_string(payload, "text").unwrap_or_default(),
		url: payload_string(payload, "url").unwrap_or_default(),
		section: payload_string(payload, "section").unwrap_or_default(),
		lang: payload_string(payload, "lang").unwrap_or_default(),
		tags: payload_string_list(payload, "tags"),
		token_count: payload_u32(payload, "token_count"),
	};

	Some(ScoredChunk::new(doc_id, chunk_id, score).with_record(record))
}

pub fn point_id_to_string(point_id: &PointId) -> Option<String> {
	match point_id.point_id_options.as_ref()? {
		PointIdOptions::Uuid(text) => Some(text.to_string()),
		PointIdOptions::Num(num) => Some(num.to_string()),
	}
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

pub fn payload_string_list(payload: &HashMap<String, Value>, key: &str) -> Vec<String> {
	let Some(value) = payload.get(key) else { return Vec::new() };

	match &value.kind {
		Some(Kind::ListValue(list)) => list
			.values
			.iter()
			.filter_map(|item| match &item.kind {
				Some(Kind::StringValue(text)) => Some(text.to_string()),
				_ => None,
			})
			.collect(),
		Some(Kind::StringValue(text)) => vec![text.to_string()],
		_ => Vec::new(),
	}
}

pub fn payload_u32(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => u32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 && *value >= 0.0 {
				u32::try_from(*value as i64).ok()
			} else {
				None
			},
		_ => None,
	}
}
