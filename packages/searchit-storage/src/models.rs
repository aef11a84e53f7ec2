use searchit_domain::ChunkRecord;

/// One hit as returned by a retrieval backend, in backend order.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredChunk {
	pub doc_id: String,
	pub chunk_id: String,
	pub score: f32,
	/// Stored chunk fields, when the backend returned a payload.
	pub record: Option<ChunkRecord>,
}
impl ScoredChunk {
	pub fn new(doc_id: impl Into<String>, chunk_id: impl Into<String>, score: f32) -> Self {
		Self { doc_id: doc_id.into(), chunk_id: chunk_id.into(), score, record: None }
	}

	pub fn with_record(mut self, record: ChunkRecord) -> Self {
		self.record = Some(record);

		self
	}
}
