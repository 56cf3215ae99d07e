//! Retrieval engine: query embedding, scoring, ranking, and enrichment.
//!
//! The engine receives its collaborators (knowledge store, embedder) as
//! constructor parameters and holds no other state. One logical pipeline
//! execution per incoming query; the knowledge store is the only shared
//! state between concurrent executions.
//!
//! Scoring is an intentional brute-force scan over every stored chunk —
//! O(number of chunks) per query. That is the documented scalability
//! boundary of this engine, not a defect; an index would also change the
//! deterministic tie-break contract below.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Result, RetrievalError};
use crate::models::SearchResult;
use crate::providers::Embedder;
use crate::similarity::cosine_similarity;
use crate::store::KnowledgeStore;

pub struct RetrievalEngine {
    pub(crate) store: Arc<dyn KnowledgeStore>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) config: EngineConfig,
}

impl RetrievalEngine {
    /// Build an engine over the given collaborators.
    ///
    /// Fails fast with `RetrievalError::Configuration` when the
    /// configuration is invalid; nothing is retried later.
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn Embedder>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            embedder,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Search the knowledge base, returning at most `limit` results ranked
    /// by descending similarity.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        self.search_filtered(query, limit, 0.0).await
    }

    /// [`search`](Self::search) with a similarity floor applied after the
    /// limit truncation.
    ///
    /// Ties are broken by ascending `chunk_index`, then `document_id`, so
    /// rankings are deterministic. A blank query returns no results
    /// without calling the embedder; an empty knowledge base logs a
    /// warning and returns no results.
    pub async fn search_filtered(
        &self,
        query: &str,
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embed_query(query).await?;
        let chunks = self.store.get_all_chunks().await?;
        if chunks.is_empty() {
            warn!("search against an empty knowledge base");
            return Ok(Vec::new());
        }

        let mut results: Vec<SearchResult> = chunks
            .iter()
            .map(|chunk| SearchResult {
                chunk_id: chunk.id.clone(),
                document_id: chunk.document_id.clone(),
                content: chunk.content.clone(),
                similarity: cosine_similarity(&query_vec, &chunk.embedding),
                chunk_index: chunk.chunk_index,
                start_index: chunk.start_index,
                end_index: chunk.end_index,
                document_title: None,
                document_file_path: None,
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
                .then(a.document_id.cmp(&b.document_id))
        });
        results.truncate(limit);

        if min_similarity > 0.0 {
            results.retain(|r| r.similarity >= min_similarity);
        }

        self.enrich(&mut results).await?;
        debug!(query_len = query.len(), results = results.len(), "search complete");
        Ok(results)
    }

    /// Threshold-aware search: over-fetches `2 × limit` raw results to
    /// compensate for candidates the floor discards, then truncates back
    /// to `limit`.
    pub async fn search_with_threshold(
        &self,
        query: &str,
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        let mut results = self
            .search_filtered(query, limit.saturating_mul(2), min_similarity)
            .await?;
        results.truncate(limit);
        Ok(results)
    }

    /// Embed and normalize a query with the process-wide strategy.
    pub(crate) async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let raw = timeout(self.config.embed_timeout(), self.embedder.embed(query))
            .await
            .map_err(|_| {
                RetrievalError::Embedding(format!(
                    "embedding timed out after {}s",
                    self.config.embed_timeout_secs
                ))
            })??;
        Ok(self.config.normalization_strategy.apply(&raw))
    }

    /// Attach document title and path to each result, fetching owning
    /// documents in one batch deduplicated by id.
    async fn enrich(&self, results: &mut [SearchResult]) -> Result<()> {
        let ids: HashSet<String> = results.iter().map(|r| r.document_id.clone()).collect();
        if ids.is_empty() {
            return Ok(());
        }

        let docs = self.store.get_documents_by_ids(&ids).await?;
        let by_id: HashMap<&str, (&str, &str)> = docs
            .iter()
            .map(|d| (d.id.as_str(), (d.title.as_str(), d.file_path.as_str())))
            .collect();

        for result in results.iter_mut() {
            if let Some((title, path)) = by_id.get(result.document_id.as_str()) {
                result.document_title = Some((*title).to_string());
                result.document_file_path = Some((*path).to_string());
            }
        }
        Ok(())
    }
}
