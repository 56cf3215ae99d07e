//! End-to-end tests: index → search → filter → citation validation over
//! the in-memory store with deterministic stub model providers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use semantic_retrieval::citation::validate_citations;
use semantic_retrieval::config::EngineConfig;
use semantic_retrieval::engine::RetrievalEngine;
use semantic_retrieval::error::{Result, RetrievalError};
use semantic_retrieval::filter::{ContextFilter, FilterStrategy};
use semantic_retrieval::providers::Embedder;
use semantic_retrieval::store::memory::InMemoryStore;

/// Deterministic stub embedder: one dimension per topic keyword, plus a
/// constant component so no vector is ever zero.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RetrievalError::Embedding("empty input".to_string()));
        }
        let lower = text.to_lowercase();
        let count = |term: &str| lower.matches(term).count() as f32;
        Ok(vec![
            count("rust"),
            count("python"),
            count("kubernetes"),
            1.0,
        ])
    }
}

/// Proves code paths that must not touch the embedder.
struct PanickingEmbedder;

#[async_trait]
impl Embedder for PanickingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        panic!("embedder must not be called on this path");
    }
}

/// Hangs longer than any configured timeout.
struct SlowEmbedder;

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![1.0])
    }
}

fn engine_over(store: Arc<InMemoryStore>, config: EngineConfig) -> RetrievalEngine {
    RetrievalEngine::new(store, Arc::new(KeywordEmbedder), config).unwrap()
}

async fn seed(engine: &RetrievalEngine) {
    engine
        .index_document(
            "docs/rust.md",
            "Rust Guide",
            "Rust ownership and borrowing rules. The rust compiler enforces memory safety. Cargo builds rust crates into binaries.",
        )
        .await
        .unwrap();
    engine
        .index_document(
            "docs/python.md",
            "Python Notes",
            "Python is dynamically typed. The python interpreter executes bytecode modules.",
        )
        .await
        .unwrap();
    engine
        .index_document(
            "docs/deploy.md",
            "Deploy Guide",
            "Kubernetes schedules pods across nodes. A kubernetes deployment manages replica sets.",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_search_ranks_most_similar_document_first() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_over(store, EngineConfig::default());
    seed(&engine).await;

    let results = engine.search("rust tooling", 10).await.unwrap();
    assert!(!results.is_empty());
    assert_eq!(
        results[0].document_file_path.as_deref(),
        Some("docs/rust.md")
    );
    assert_eq!(results[0].document_title.as_deref(), Some("Rust Guide"));

    // Ranked descending, deterministically.
    for pair in results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
async fn test_blank_query_short_circuits_before_embedding() {
    let store = Arc::new(InMemoryStore::new());
    let engine =
        RetrievalEngine::new(store, Arc::new(PanickingEmbedder), EngineConfig::default()).unwrap();

    let results = engine.search("   \n\t", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_empty_knowledge_base_returns_empty() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_over(store, EngineConfig::default());

    let results = engine.search("anything at all", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_search_filtered_applies_similarity_floor() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_over(store, EngineConfig::default());
    seed(&engine).await;

    let results = engine.search_filtered("rust", 10, 0.5).await.unwrap();
    assert!(!results.is_empty());
    for r in &results {
        assert!(r.similarity >= 0.5);
        assert_eq!(r.document_file_path.as_deref(), Some("docs/rust.md"));
    }
}

#[tokio::test]
async fn test_search_with_threshold_truncates_to_limit() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_over(store, EngineConfig::default());
    seed(&engine).await;

    let results = engine
        .search_with_threshold("rust python kubernetes", 1, 0.0)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_reindex_replaces_document_and_chunks() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_over(store.clone(), EngineConfig::default());

    let first = engine
        .index_document("docs/a.md", "A", "Rust content version one, with several rust mentions.")
        .await
        .unwrap();
    let second = engine
        .index_document("docs/a.md", "A", "Shorter rust text.")
        .await
        .unwrap();

    assert_eq!(first.document_id, second.document_id);
    assert_eq!(store.document_count(), 1);

    let results = engine.search("rust", 10).await.unwrap();
    assert_eq!(results.len(), second.chunks_written);
    for r in &results {
        assert_eq!(r.content, "Shorter rust text.");
    }
}

#[tokio::test]
async fn test_delete_document_removes_it_from_results() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_over(store, EngineConfig::default());
    seed(&engine).await;

    let results = engine.search("python", 10).await.unwrap();
    let python_doc = results[0].document_id.clone();
    engine.delete_document(&python_doc).await.unwrap();

    let results = engine.search("python", 10).await.unwrap();
    assert!(results.iter().all(|r| r.document_id != python_doc));
}

#[tokio::test]
async fn test_indexing_empty_content_writes_no_chunks() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_over(store, EngineConfig::default());

    let summary = engine.index_document("docs/empty.md", "Empty", "").await.unwrap();
    assert_eq!(summary.chunks_written, 0);
    assert_eq!(summary.tokens_estimated, 0);
}

#[tokio::test(start_paused = true)]
async fn test_embedding_timeout_fails_the_request() {
    let store = Arc::new(InMemoryStore::new());
    let engine =
        RetrievalEngine::new(store, Arc::new(SlowEmbedder), EngineConfig::default()).unwrap();

    let err = engine.search("rust", 5).await.unwrap_err();
    match err {
        RetrievalError::Embedding(msg) => assert!(msg.contains("timed out")),
        other => panic!("expected embedding error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_full_pipeline_with_filter_and_citations() {
    let store = Arc::new(InMemoryStore::new());
    let engine = engine_over(store, EngineConfig::default());
    seed(&engine).await;

    let candidates = engine.search("kubernetes scheduling", 10).await.unwrap();

    let config = EngineConfig {
        filter_strategy: FilterStrategy::Threshold,
        min_similarity: 0.5,
        ..EngineConfig::default()
    };
    let filter = ContextFilter::new(config, None);
    let outcome = filter.filter("kubernetes scheduling", candidates).await;
    assert!(!outcome.is_degraded());

    let kept = outcome.into_result();
    assert!(!kept.kept.is_empty());
    assert!(kept
        .kept
        .iter()
        .all(|r| r.document_file_path.as_deref() == Some("docs/deploy.md")));

    // The model quotes one real span and fabricates another; only the
    // real one survives validation.
    let answer = "The docs say \"kubernetes schedules pods across nodes\". \
                  They also say \"pods are stored in a blockchain ledger\".";
    let citations = validate_citations(answer, &kept.kept);
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].document_path, "docs/deploy.md");
    assert_eq!(citations[0].document_title, "Deploy Guide");
}
