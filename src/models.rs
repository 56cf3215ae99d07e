//! Core data models for the retrieval pipeline.
//!
//! [`Document`] and [`Chunk`] are persisted through the knowledge store;
//! [`SearchResult`], [`FilterDecision`], and [`Citation`] are per-request
//! values that never outlive the response they were built for.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// An indexed source document.
///
/// Immutable once written; re-indexing the same `file_path` produces a
/// document with the same id, replacing it and its chunks in the store.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub file_path: String,
    pub title: String,
    /// Full source text.
    pub content: String,
    pub indexed_at: DateTime<Utc>,
    pub chunk_count: usize,
}

impl Document {
    /// Build a document with a deterministic id derived from `file_path`.
    pub fn new(file_path: &str, title: &str, content: &str) -> Self {
        Self {
            id: document_id(file_path),
            file_path: file_path.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            indexed_at: Utc::now(),
            chunk_count: 0,
        }
    }
}

/// Deterministic document id: truncated SHA-256 of the file path.
pub fn document_id(file_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    let digest = hasher.finalize();
    format!("{:x}", digest)[..16].to_string()
}

/// Deterministic chunk id: `"<documentId>-chunk-<n>"`.
pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{}-chunk-{}", document_id, index)
}

/// A bounded, possibly-overlapping substring of a document — the unit of
/// retrieval.
///
/// `start_index`/`end_index` are byte offsets into the owning document's
/// content, always on UTF-8 character boundaries, with
/// `start_index < end_index <= document.content.len()`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub start_index: usize,
    pub end_index: usize,
    pub token_count: usize,
    /// 0-based, contiguous per document.
    pub chunk_index: usize,
    /// Normalized embedding vector. Empty until the indexing pipeline
    /// fills it in; fixed-length per embedding model afterwards.
    pub embedding: Vec<f32>,
}

/// A scored chunk returned from the query path. Transient, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    /// Higher is more relevant.
    pub similarity: f32,
    pub chunk_index: usize,
    pub start_index: usize,
    pub end_index: usize,
    /// Populated by document enrichment.
    pub document_title: Option<String>,
    pub document_file_path: Option<String>,
}

/// Per-candidate audit record emitted by the context filter.
#[derive(Debug, Clone, Serialize)]
pub struct FilterDecision {
    pub chunk_id: String,
    pub kept: bool,
    /// The score the decision was based on: cosine similarity for the
    /// threshold strategy, the model's relevance score for the reranker.
    pub score: f32,
    pub reason: String,
}

/// A validated source citation attached to a generated answer.
///
/// Only produced after the quoted text has been matched back to a chunk
/// that was actually served in the prompt context.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    /// The quoted span, as it appeared in the answer.
    pub text: String,
    pub document_path: String,
    pub document_title: String,
    pub chunk_id: Option<String>,
}
