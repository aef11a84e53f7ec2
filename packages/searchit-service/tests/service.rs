use std::{
	collections::{BTreeMap, VecDeque},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use color_eyre::{Result, eyre};
use serde_json::Value;

use searchit_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use searchit_domain::{AbstainReason, ChunkRecord, RetrievalSource};
use searchit_service::{
	AskRequest, Backends, BoxFuture, EmbeddingProvider, Error, FeedbackEvent, FeedbackRequest,
	FeedbackSink, GenerationProvider, LexicalIndex, Providers, RerankProvider, ScoredChunk,
	SearchItService, SearchRequest, VectorIndex,
};

const TEST_CONFIG: &str = r#"
[service]
http_bind          = "127.0.0.1:0"
log_level          = "info"
request_timeout_ms = 5000

[backends.lexical]
url        = "http://127.0.0.1:1"
index      = "chunks"
timeout_ms = 1000

[backends.vector]
url        = "http://127.0.0.1:1"
collection = "chunks"
vector_dim = 4
timeout_ms = 1000

[providers.embedding]
provider_id = "test"
api_base    = "http://127.0.0.1:1"
api_key     = "test-key"
path        = "/"
model       = "test"
dimensions  = 4
timeout_ms  = 1000

[providers.rerank]
provider_id = "test"
api_base    = "http://127.0.0.1:1"
api_key     = "test-key"
path        = "/"
model       = "test"
timeout_ms  = 1000

[providers.generation]
provider_id = "test"
api_base    = "http://127.0.0.1:1"
api_key     = "test-key"
path        = "/"
model       = "test"
temperature = 0.0
timeout_ms  = 1000
"#;

fn test_config() -> Config {
	toml::from_str(TEST_CONFIG).expect("Failed to parse test config.")
}

fn chunk(doc_id: &str, chunk_id: &str, text: &str, lang: &str, tags: &[&str]) -> ScoredChunk {
	let record = ChunkRecord {
		doc_id: doc_id.to_string(),
		chunk_id: chunk_id.to_string(),
		title: format!("Title {chunk_id}"),
		text: text.to_string(),
		url: format!("https://docs.example/{doc_id}"),
		section: "intro".to_string(),
		lang: lang.to_string(),
		tags: tags.iter().map(|tag| tag.to_string()).collect(),
		token_count: None,
	};

	ScoredChunk::new(doc_id, chunk_id, 1.0).with_record(record)
}

fn chunk_a() -> ScoredChunk {
	chunk("d-a", "c-a", "Alpha covers the borrow checker.", "en", &["rust"])
}

fn chunk_b() -> ScoredChunk {
	chunk("d-b", "c-b", "Beta explains borrow lifetimes.", "en", &["rust", "lifetimes"])
}

fn chunk_c() -> ScoredChunk {
	chunk("d-c", "c-c", "Gamma talks about garbage collection.", "de", &["gc"])
}

struct DummyIndex {
	hits: Option<Vec<ScoredChunk>>,
	delay: Option<Duration>,
	calls: Arc<AtomicUsize>,
}
impl DummyIndex {
	fn answering(hits: Vec<ScoredChunk>) -> Self {
		Self { hits: Some(hits), delay: None, calls: Arc::new(AtomicUsize::new(0)) }
	}

	fn offline() -> Self {
		Self { hits: None, delay: None, calls: Arc::new(AtomicUsize::new(0)) }
	}

	fn stalled() -> Self {
		Self { delay: Some(Duration::from_secs(10)), ..Self::answering(vec![chunk_a()]) }
	}

	fn answer(&self) -> BoxFuture<'_, Result<Vec<ScoredChunk>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let hits = self.hits.clone();
		let delay = self.delay;

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			hits.ok_or_else(|| eyre::eyre!("index offline"))
		})
	}
}
impl LexicalIndex for DummyIndex {
	fn retrieve<'a>(
		&'a self,
		_text: &'a str,
		_filters: &'a BTreeMap<String, String>,
		_depth: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredChunk>>> {
		self.answer()
	}
}
impl VectorIndex for DummyIndex {
	fn retrieve<'a>(
		&'a self,
		_vector: &'a [f32],
		_filters: &'a BTreeMap<String, String>,
		_depth: u32,
	) -> BoxFuture<'a, Result<Vec<ScoredChunk>>> {
		self.answer()
	}
}

struct DummyEmbedding;
impl EmbeddingProvider for DummyEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vec = vec![0.0; cfg.dimensions as usize];

		Box::pin(async move { Ok(vec![vec; texts.len()]) })
	}
}

enum DummyRerank {
	/// Scores documents by a substring of their text; unmatched documents score zero.
	ByText(Vec<(&'static str, f32)>),
	Slow,
	Failing,
}
impl RerankProvider for DummyRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			match self {
				Self::ByText(table) => Ok(docs
					.iter()
					.map(|doc| {
						table
							.iter()
							.find(|(needle, _)| doc.contains(needle))
							.map(|(_, score)| *score)
							.unwrap_or(0.0)
					})
					.collect()),
				Self::Slow => {
					tokio::time::sleep(Duration::from_secs(10)).await;

					Ok(vec![1.0; docs.len()])
				},
				Self::Failing => Err(eyre::eyre!("reranker offline")),
			}
		})
	}
}

struct SpyGeneration {
	replies: Mutex<VecDeque<Option<String>>>,
	delay: Option<Duration>,
	calls: AtomicUsize,
	context_sizes: Mutex<Vec<usize>>,
}
impl SpyGeneration {
	fn new(replies: Vec<Option<&str>>) -> Self {
		Self {
			replies: Mutex::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
			delay: None,
			calls: AtomicUsize::new(0),
			context_sizes: Mutex::new(Vec::new()),
		}
	}

	fn stalled(replies: Vec<Option<&str>>) -> Self {
		Self { delay: Some(Duration::from_secs(10)), ..Self::new(replies) }
	}

	fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	fn context_sizes(&self) -> Vec<usize> {
		self.context_sizes.lock().expect("Poisoned lock.").clone()
	}
}
impl GenerationProvider for SpyGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let user = messages.last().and_then(|m| m["content"].as_str()).unwrap_or_default();

		self.context_sizes.lock().expect("Poisoned lock.").push(user.matches("chunk_id=").count());

		let reply = self.replies.lock().expect("Poisoned lock.").pop_front().flatten();
		let delay = self.delay;

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			reply.ok_or_else(|| eyre::eyre!("generation offline"))
		})
	}
}

#[derive(Default)]
struct SpyFeedback {
	events: Mutex<Vec<FeedbackEvent>>,
	fail: bool,
}
impl FeedbackSink for SpyFeedback {
	fn submit<'a>(&'a self, event: &'a FeedbackEvent) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if self.fail {
				return Err(eyre::eyre!("feedback store offline"));
			}

			self.events.lock().expect("Poisoned lock.").push(event.clone());

			Ok(())
		})
	}
}

struct Harness {
	lexical: DummyIndex,
	vector: DummyIndex,
	rerank: DummyRerank,
	generation: Arc<SpyGeneration>,
	feedback: Arc<SpyFeedback>,
	cfg: Config,
}
impl Harness {
	fn new() -> Self {
		Self {
			lexical: DummyIndex::answering(vec![chunk_a(), chunk_b()]),
			vector: DummyIndex::answering(vec![chunk_b(), chunk_c()]),
			rerank: DummyRerank::ByText(Vec::new()),
			generation: Arc::new(SpyGeneration::new(Vec::new())),
			feedback: Arc::new(SpyFeedback::default()),
			cfg: test_config(),
		}
	}

	fn build(self) -> SearchItService {
		let backends = Backends::new(Arc::new(self.lexical), Arc::new(self.vector));
		let providers =
			Providers::new(Arc::new(DummyEmbedding), Arc::new(self.rerank), self.generation);

		SearchItService::with_parts(self.cfg, backends, providers, self.feedback)
	}
}

fn search_request(query: &str) -> SearchRequest {
	SearchRequest {
		query: query.to_string(),
		top_k: None,
		with_highlights: true,
		filters: BTreeMap::new(),
	}
}

fn ask_request(question: &str) -> AskRequest {
	AskRequest { question: question.to_string(), top_k: None, ground: true, filters: BTreeMap::new() }
}

fn chunk_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
	ids.collect()
}

#[tokio::test]
async fn search_reranks_fused_candidates_and_counts_facets() {
	let mut harness = Harness::new();

	harness.rerank = DummyRerank::ByText(vec![("Gamma", 0.9), ("Beta", 0.5), ("Alpha", 0.1)]);

	let service = harness.build();
	let response = service.search(search_request("borrow")).await.expect("Search failed.");

	assert_eq!(
		chunk_ids(response.results.iter().map(|hit| hit.chunk_id.as_str())),
		vec!["c-c", "c-b", "c-a"]
	);
	assert!(!response.degradation.unreranked);
	assert!(!response.degradation.degraded_retrieval);
	assert_eq!(response.results[0].score, 0.9_f32 as f64);
	assert_eq!(response.facets["lang"]["en"], 2);
	assert_eq!(response.facets["lang"]["de"], 1);
	assert_eq!(response.facets["tags"]["rust"], 2);
	assert!(response.results[1].highlights[0].contains("<em>borrow</em>"));
	assert!(response.results[0].highlights.is_empty());
}

#[tokio::test]
async fn reranker_timeout_keeps_fused_order() {
	let mut harness = Harness::new();

	harness.rerank = DummyRerank::Slow;
	harness.cfg.providers.rerank.timeout_ms = 50;

	let service = harness.build();
	let response = service.search(search_request("borrow")).await.expect("Search failed.");

	assert_eq!(
		chunk_ids(response.results.iter().map(|hit| hit.chunk_id.as_str())),
		vec!["c-b", "c-a", "c-c"]
	);
	assert!(response.degradation.unreranked);
	assert!(!response.degradation.deadline_exceeded);
}

#[tokio::test]
async fn reranker_failure_is_a_degradation() {
	let mut harness = Harness::new();

	harness.rerank = DummyRerank::Failing;

	let service = harness.build();
	let response = service.search(search_request("borrow")).await.expect("Search failed.");

	assert!(response.degradation.unreranked);
	assert_eq!(response.results.len(), 3);
	assert_eq!(response.results[0].chunk_id, "c-b");
}

#[tokio::test]
async fn search_without_highlights_returns_empty_fragments() {
	let service = Harness::new().build();
	let mut req = search_request("borrow");

	req.with_highlights = false;

	let response = service.search(req).await.expect("Search failed.");

	assert!(response.results.iter().all(|hit| hit.highlights.is_empty()));
}

#[tokio::test]
async fn one_backend_down_degrades_retrieval() {
	let mut harness = Harness::new();

	harness.vector = DummyIndex::offline();

	let service = harness.build();
	let response = service.search(search_request("borrow")).await.expect("Search failed.");

	assert!(response.degradation.degraded_retrieval);
	assert_eq!(response.degradation.unavailable_sources, vec![RetrievalSource::Vector]);
	assert_eq!(
		chunk_ids(response.results.iter().map(|hit| hit.chunk_id.as_str())),
		vec!["c-a", "c-b"]
	);
}

#[tokio::test]
async fn all_backends_down_fails_the_request() {
	let mut harness = Harness::new();

	harness.lexical = DummyIndex::offline();
	harness.vector = DummyIndex::offline();

	let service = harness.build();
	let err = service.search(search_request("borrow")).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::AllBackendsUnavailable));

	let err = service.ask(ask_request("borrow?")).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::AllBackendsUnavailable));
}

#[tokio::test]
async fn invalid_search_input_is_rejected_before_retrieval() {
	let harness = Harness::new();
	let lexical_calls = harness.lexical.calls.clone();
	let service = harness.build();
	let mut req = search_request("borrow");

	req.filters.insert("color".to_string(), "red".to_string());

	let err = service.search(req).await.expect_err("Expected unknown filter.");

	assert!(matches!(err, Error::InvalidRequest { ref fields, .. } if fields == &["color"]));

	let mut req = search_request("borrow");

	req.top_k = Some(0);

	let err = service.search(req).await.expect_err("Expected bad top_k.");

	assert!(matches!(err, Error::InvalidRequest { ref fields, .. } if fields == &["top_k"]));

	let err = service.search(search_request("  ")).await.expect_err("Expected empty query.");

	assert!(matches!(err, Error::InvalidRequest { ref fields, .. } if fields == &["q"]));
	assert_eq!(lexical_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn search_top_k_truncates_results() {
	let service = Harness::new().build();
	let mut req = search_request("borrow");

	req.top_k = Some(1);

	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.results.len(), 1);
	assert_eq!(response.results[0].chunk_id, "c-b");
}

#[tokio::test]
async fn ask_without_candidates_abstains_with_low_coverage() {
	let mut harness = Harness::new();

	harness.lexical = DummyIndex::answering(Vec::new());
	harness.vector = DummyIndex::answering(Vec::new());

	let generation = harness.generation.clone();
	let service = harness.build();
	let response = service.ask(ask_request("borrow?")).await.expect("Ask failed.");

	assert!(response.abstained);
	assert_eq!(response.reason, Some(AbstainReason::LowCoverage));
	assert_eq!(response.evidence_coverage, 0.0);
	assert!(response.citations.is_empty());
	assert_eq!(generation.count(), 0);
}

#[tokio::test]
async fn ask_drops_citations_to_unknown_chunks() {
	let mut harness = Harness::new();

	harness.generation = Arc::new(SpyGeneration::new(vec![Some(
		"Lifetimes are scoped [c-b:0-4] unlike GC [c-z:0-3].",
	)]));

	let service = harness.build();
	let response = service.ask(ask_request("What are lifetimes?")).await.expect("Ask failed.");

	assert!(!response.abstained);
	assert_eq!(response.citations.len(), 1);
	assert_eq!(response.citations[0].chunk_id, "c-b");
	assert!((response.evidence_coverage - 1.0 / 3.0).abs() < 1e-6);

	let answer = response.answer.expect("Expected an answer.");

	assert!(answer.contains("[c-b:0-4]"));
	assert!(!answer.contains("c-z"));
}

#[tokio::test]
async fn ask_with_only_invalid_citations_is_ungrounded() {
	let mut harness = Harness::new();

	harness.generation =
		Arc::new(SpyGeneration::new(vec![Some("Unsupported claim [c-z:0-3] [c-b:0-999].")]));

	let service = harness.build();
	let response = service.ask(ask_request("What are lifetimes?")).await.expect("Ask failed.");

	assert!(response.abstained);
	assert_eq!(response.reason, Some(AbstainReason::Ungrounded));
	assert_eq!(response.evidence_coverage, 0.0);
	assert!(response.citations.is_empty());
	assert!(response.answer.is_none());
}

#[tokio::test]
async fn ask_below_threshold_abstains_with_low_coverage() {
	let mut harness = Harness::new();

	harness.cfg.grounding.coverage_threshold = 0.5;
	harness.generation = Arc::new(SpyGeneration::new(vec![Some("Scoped [c-b:0-4].")]));

	let service = harness.build();
	let response = service.ask(ask_request("What are lifetimes?")).await.expect("Ask failed.");

	assert!(response.abstained);
	assert_eq!(response.reason, Some(AbstainReason::LowCoverage));
	assert!(response.citations.is_empty());
}

#[tokio::test]
async fn ungrounded_mode_answers_without_citations() {
	let mut harness = Harness::new();

	harness.generation = Arc::new(SpyGeneration::new(vec![Some("Lifetimes scope borrows.")]));

	let service = harness.build();
	let mut req = ask_request("What are lifetimes?");

	req.ground = false;

	let response = service.ask(req).await.expect("Ask failed.");

	assert!(!response.abstained);
	assert_eq!(response.evidence_coverage, 0.0);
	assert_eq!(response.answer.as_deref(), Some("Lifetimes scope borrows."));
}

#[tokio::test]
async fn generation_retries_once_on_shortened_context() {
	let mut harness = Harness::new();

	harness.generation =
		Arc::new(SpyGeneration::new(vec![None, Some("Scoped [c-b:0-4] and [c-a:0-5].")]));

	let generation = harness.generation.clone();
	let service = harness.build();
	let response = service.ask(ask_request("What are lifetimes?")).await.expect("Ask failed.");

	assert_eq!(generation.count(), 2);
	assert_eq!(generation.context_sizes(), vec![3, 2]);
	assert!(!response.abstained);
	assert_eq!(response.evidence_coverage, 1.0);
}

#[tokio::test]
async fn generation_failing_twice_abstains() {
	let mut harness = Harness::new();

	harness.generation = Arc::new(SpyGeneration::new(vec![None, None, Some("unused")]));

	let generation = harness.generation.clone();
	let service = harness.build();
	let response = service.ask(ask_request("What are lifetimes?")).await.expect("Ask failed.");

	assert_eq!(generation.count(), 2);
	assert!(response.abstained);
	assert_eq!(response.reason, Some(AbstainReason::GenerationUnavailable));
	assert!(response.citations.is_empty());
}

#[tokio::test]
async fn ask_top_k_limits_the_context() {
	let mut harness = Harness::new();

	harness.generation = Arc::new(SpyGeneration::new(vec![Some("Scoped [c-b:0-4].")]));

	let generation = harness.generation.clone();
	let service = harness.build();
	let mut req = ask_request("What are lifetimes?");

	req.top_k = Some(1);

	let response = service.ask(req).await.expect("Ask failed.");

	assert_eq!(generation.context_sizes(), vec![1]);
	assert_eq!(response.evidence_coverage, 1.0);
}

#[tokio::test]
async fn feedback_is_handed_to_the_sink() {
	let harness = Harness::new();
	let feedback = harness.feedback.clone();
	let service = harness.build();
	let response = service
		.feedback(FeedbackRequest {
			query: "borrow".to_string(),
			doc_id: "d-b".to_string(),
			chunk_id: "c-b".to_string(),
			label: "relevant".to_string(),
			user_id: Some("u1".to_string()),
		})
		.await
		.expect("Feedback failed.");
	let events = feedback.events.lock().expect("Poisoned lock.");

	assert_eq!(response.status, "accepted");
	assert_eq!(events.len(), 1);
	assert_eq!(events[0].feedback_id, response.feedback_id);
	assert_eq!(events[0].user_id.as_deref(), Some("u1"));
}

#[tokio::test]
async fn feedback_sink_failure_is_reported() {
	let mut harness = Harness::new();

	harness.feedback = Arc::new(SpyFeedback { events: Mutex::new(Vec::new()), fail: true });

	let service = harness.build();
	let err = service
		.feedback(FeedbackRequest {
			query: "borrow".to_string(),
			doc_id: "d-b".to_string(),
			chunk_id: "c-b".to_string(),
			label: "click".to_string(),
			user_id: None,
		})
		.await
		.expect_err("Expected sink failure.");

	assert!(matches!(err, Error::Feedback { .. }));
}


#[tokio::test]
async fn stalled_backend_is_cut_off_by_request_deadline() {
	let mut harness = Harness::new();

	harness.lexical = DummyIndex::stalled();
	harness.cfg.service.request_timeout_ms = 150;

	let service = harness.build();
	let response = service.search(search_request("borrow")).await.expect("Search failed.");

	assert!(response.degradation.deadline_exceeded);
	assert!(response.degradation.degraded_retrieval);
	assert_eq!(response.degradation.unavailable_sources, vec![RetrievalSource::Lexical]);
	assert_eq!(
		chunk_ids(response.results.iter().map(|hit| hit.chunk_id.as_str())),
		vec!["c-b", "c-c"]
	);
}

#[tokio::test]
async fn stalled_generation_abstains_when_request_deadline_runs_out() {
	let mut harness = Harness::new();
	let generation = Arc::new(SpyGeneration::stalled(vec![Some("Late [c-b:0-4].")]));

	harness.generation = generation.clone();
	harness.cfg.service.request_timeout_ms = 200;

	let service = harness.build();
	let response = service.ask(ask_request("borrow lifetimes")).await.expect("Ask failed.");

	assert!(response.abstained);
	assert_eq!(response.reason, Some(AbstainReason::GenerationUnavailable));
	assert!(response.degradation.deadline_exceeded);
	assert!(response.answer.is_none());
	assert_eq!(generation.count(), 1);
}
