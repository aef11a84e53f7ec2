use serde_json::{Map, Value};

use searchit_config::{Feedback, LexicalBackend, VectorBackend};
use searchit_storage::{feedback::FeedbackStore, lexical::LexicalStore, qdrant::QdrantStore};

fn lexical_cfg(default_headers: Map<String, Value>) -> LexicalBackend {
	LexicalBackend {
		url: "http://127.0.0.1:9200/".to_string(),
		index: "chunks".to_string(),
		timeout_ms: 500,
		default_headers,
	}
}

#[test]
fn lexical_store_rejects_non_string_headers() {
	let mut headers = Map::new();

	headers.insert("x-shard".to_string(), Value::from(1));

	let err = LexicalStore::new(&lexical_cfg(headers))
		.err()
		.expect("Expected non-string header to fail.");

	assert!(matches!(err, searchit_storage::Error::InvalidArgument(_)));
}

#[test]
fn feedback_store_keeps_endpoint() {
	let cfg = Feedback::default();
	let store =
		FeedbackStore::new("http://127.0.0.1:9/feedback", &cfg).expect("Failed to build store.");

	assert_eq!(store.endpoint(), "http://127.0.0.1:9/feedback");
}

#[tokio::test]
async fn qdrant_store_rejects_dimension_mismatch_before_querying() {
	let cfg = VectorBackend {
		url: "http://127.0.0.1:6334".to_string(),
		collection: "chunks".to_string(),
		vector_name: None,
		vector_dim: 4,
		timeout_ms: 500,
	};
	let store = QdrantStore::new(&cfg).expect("Failed to build Qdrant client.");
	let err = store
		.search(&[0.1, 0.2], &Default::default(), 10)
		.await
		.expect_err("Expected dimension mismatch.");

	assert!(matches!(err, searchit_storage::Error::InvalidArgument(_)));
}
