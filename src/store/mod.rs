//! Knowledge store abstraction.
//!
//! The [`KnowledgeStore`] trait is the engine's only view of persistence,
//! enabling pluggable backends. The store is read-heavy and
//! append/replace-only: documents and their chunks are written atomically,
//! read by the query path, and removed only by re-indexing or explicit
//! deletion.
//!
//! Implementations must be `Send + Sync` and must guarantee that a scan
//! never observes a partially replaced chunk set: readers see a document's
//! old chunks or its new chunks, never a mix.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`get_all_chunks`](KnowledgeStore::get_all_chunks) | Fetch every stored chunk for scanning |
//! | [`get_documents_by_ids`](KnowledgeStore::get_documents_by_ids) | Batch-fetch documents for result enrichment |
//! | [`save_document`](KnowledgeStore::save_document) | Upsert a document and replace its chunks |
//! | [`delete_document`](KnowledgeStore::delete_document) | Remove a document and its chunks |

pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, Document};

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Fetch all stored chunks. The query path scans these brute-force.
    async fn get_all_chunks(&self) -> Result<Vec<Chunk>>;

    /// Batch-fetch documents by id. Ids not present are silently absent
    /// from the result.
    async fn get_documents_by_ids(&self, ids: &HashSet<String>) -> Result<Vec<Document>>;

    /// Insert or replace a document together with its complete chunk set.
    ///
    /// Replacement is atomic with respect to concurrent reads: any chunks
    /// previously stored for `doc.id` are gone once the new set is
    /// visible.
    async fn save_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()>;

    /// Remove a document and all of its chunks.
    async fn delete_document(&self, document_id: &str) -> Result<()>;
}
