pub mod ask;
pub mod deadline;
pub mod feedback;
pub mod retrieval;
pub mod search;

mod error;
mod rerank;
mod time_serde;

pub use ask::{AskRequest, AskResponse};
pub use deadline::{Deadline, StageError};
pub use error::{Error, Result};
pub use feedback::{FeedbackEvent, FeedbackLabel, FeedbackRequest, FeedbackResponse};
pub use retrieval::{Degradation, RetrievalOutcome};
pub use search::{SearchHit, SearchRequest, SearchResponse};
pub use searchit_storage::models::ScoredChunk;

use std::{collections::BTreeMap, future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use searchit_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use searchit_providers::{embedding, generation, rerank as rerank_provider};
use searchit_storage::{feedback::FeedbackStore, lexical::LexicalStore, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Ranked lexical (BM25) candidates for a query text.
pub trait LexicalIndex
where
	Self: Send + Sync,
{
	fn retrieve<'a>(
		&'a self,
		text: &'a str,
		filters: &'a BTreeMap<String, String>,
		depth: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ScoredChunk>>>;
}

/// Ranked nearest-neighbour candidates for a query embedding.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn retrieve<'a>(
		&'a self,
		vector: &'a [f32],
		filters: &'a BTreeMap<String, String>,
		depth: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ScoredChunk>>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

/// Downstream store for accepted feedback events.
pub trait FeedbackSink
where
	Self: Send + Sync,
{
	fn submit<'a>(&'a self, event: &'a FeedbackEvent) -> BoxFuture<'a, color_eyre::Result<()>>;
}

#[derive(Clone)]
pub struct Backends {
	pub lexical: Arc<dyn LexicalIndex>,
	pub vector: Arc<dyn VectorIndex>,
}
impl Backends {
	pub fn new(lexical: Arc<dyn LexicalIndex>, vector: Arc<dyn VectorIndex>) -> Self {
		Self { lexical, vector }
	}
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub generation: Arc<dyn GenerationProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		generation: Arc<dyn GenerationProvider>,
	) -> Self {
		Self { embedding, rerank, generation }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider.clone(), generation: provider }
	}
}

/// Logs accepted feedback when no external store is configured.
pub struct LogFeedbackSink;
impl FeedbackSink for LogFeedbackSink {
	fn submit<'a>(&'a self, event: &'a FeedbackEvent) -> BoxFuture<'a, color_eyre::Result<()>> {
		tracing::info!(
			feedback_id = %event.feedback_id,
			label = event.label.as_str(),
			doc_id = %event.doc_id,
			chunk_id = %event.chunk_id,
			"Feedback event recorded."
		);

		Box::pin(async { Ok(()) })
	}
}

pub struct SearchItService {
	pub cfg: Config,
	pub backends: Backends,
	pub providers: Providers,
	pub feedback: Arc<dyn FeedbackSink>,
}
impl SearchItService {
	pub fn new(cfg: Config) -> Result<Self> {
		let lexical = LexicalStore::new(&cfg.backends.lexical)?;
		let vector = QdrantStore::new(&cfg.backends.vector)?;
		let feedback: Arc<dyn FeedbackSink> = match cfg.feedback.endpoint.as_deref() {
			Some(endpoint) => Arc::new(FeedbackStore::new(endpoint, &cfg.feedback)?),
			None => Arc::new(LogFeedbackSink),
		};
		let backends = Backends::new(Arc::new(lexical), Arc::new(vector));

		Ok(Self { cfg, backends, providers: Providers::default(), feedback })
	}

	pub fn with_parts(
		cfg: Config,
		backends: Backends,
		providers: Providers,
		feedback: Arc<dyn FeedbackSink>,
	) -> Self {
		Self { cfg, backends, providers, feedback }
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move { Ok(rerank_provider::rerank(cfg, query, docs).await?) })
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move { Ok(generation::generate(cfg, messages).await?) })
	}
}

impl LexicalIndex for LexicalStore {
	fn retrieve<'a>(
		&'a self,
		text: &'a str,
		filters: &'a BTreeMap<String, String>,
		depth: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ScoredChunk>>> {
		Box::pin(async move { Ok(self.search(text, filters, depth).await?) })
	}
}

impl VectorIndex for QdrantStore {
	fn retrieve<'a>(
		&'a self,
		vector: &'a [f32],
		filters: &'a BTreeMap<String, String>,
		depth: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<ScoredChunk>>> {
		Box::pin(async move { Ok(self.search(vector, filters, depth).await?) })
	}
}

impl FeedbackSink for FeedbackStore {
	fn submit<'a>(&'a self, event: &'a FeedbackEvent) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move { Ok(self.send(event).await?) })
	}
}
