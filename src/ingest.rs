//! Indexing path: chunk, embed, normalize, persist.
//!
//! Re-indexing a path replaces the previous document and its chunks in one
//! `save_document` call, so concurrent scans never observe a partially
//! written chunk set.

use tokio::time::timeout;
use tracing::{debug, info};

use crate::chunk::chunk_text;
use crate::engine::RetrievalEngine;
use crate::error::{Result, RetrievalError};
use crate::models::Document;

/// Counters reported after indexing one document.
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub document_id: String,
    pub chunks_written: usize,
    pub tokens_estimated: usize,
}

impl RetrievalEngine {
    /// Index (or re-index) a document.
    ///
    /// Chunks the content, embeds each chunk with the configured timeout,
    /// normalizes the vectors with the process-wide strategy, and persists
    /// document and chunks atomically. The document id is deterministic in
    /// `file_path`, so indexing the same path again replaces the earlier
    /// version and its chunks.
    pub async fn index_document(
        &self,
        file_path: &str,
        title: &str,
        content: &str,
    ) -> Result<IndexSummary> {
        let mut doc = Document::new(file_path, title, content);
        let mut chunks = chunk_text(
            content,
            &doc.id,
            self.config.chunk_size_tokens,
            self.config.overlap_tokens,
        )?;

        for chunk in chunks.iter_mut() {
            debug!(chunk = %chunk.id, "embedding chunk");
            let raw = timeout(self.config.embed_timeout(), self.embedder.embed(&chunk.content))
                .await
                .map_err(|_| {
                    RetrievalError::Embedding(format!(
                        "embedding timed out after {}s",
                        self.config.embed_timeout_secs
                    ))
                })??;
            chunk.embedding = self.config.normalization_strategy.apply(&raw);
        }

        doc.chunk_count = chunks.len();
        let tokens_estimated = chunks.iter().map(|c| c.token_count).sum();
        self.store.save_document(&doc, &chunks).await?;

        info!(
            document = %doc.id,
            path = %doc.file_path,
            chunks = chunks.len(),
            "indexed document"
        );

        Ok(IndexSummary {
            document_id: doc.id,
            chunks_written: chunks.len(),
            tokens_estimated,
        })
    }

    /// Remove a document and its chunks from the knowledge base.
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.store.delete_document(document_id).await
    }
}
