//! In-memory [`KnowledgeStore`] for tests and single-process deployments.
//!
//! All state lives behind one `RwLock`, so `save_document` replaces a
//! document's chunk set in a single write section and concurrent scans see
//! either the old or the new set, never a mix.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, Document};

use super::KnowledgeStore;

#[derive(Default)]
struct State {
    docs: HashMap<String, Document>,
    chunks: Vec<Chunk>,
}

/// In-memory knowledge store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> usize {
        self.state.read().unwrap().docs.len()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn get_all_chunks(&self) -> Result<Vec<Chunk>> {
        let state = self.state.read().unwrap();
        Ok(state.chunks.clone())
    }

    async fn get_documents_by_ids(&self, ids: &HashSet<String>) -> Result<Vec<Document>> {
        let state = self.state.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.docs.get(id).cloned())
            .collect())
    }

    async fn save_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.chunks.retain(|c| c.document_id != doc.id);
        state.chunks.extend_from_slice(chunks);
        state.docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.chunks.retain(|c| c.document_id != document_id);
        state.docs.remove(document_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunk_id;

    fn make_doc(path: &str, content: &str) -> Document {
        Document::new(path, path, content)
    }

    fn make_chunks(doc: &Document, texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                id: chunk_id(&doc.id, i),
                document_id: doc.id.clone(),
                content: t.to_string(),
                start_index: 0,
                end_index: t.len(),
                token_count: 1,
                chunk_index: i,
                embedding: vec![1.0, 0.0],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_save_and_fetch() {
        let store = InMemoryStore::new();
        let doc = make_doc("a.md", "alpha");
        let chunks = make_chunks(&doc, &["alpha one", "alpha two"]);
        store.save_document(&doc, &chunks).await.unwrap();

        assert_eq!(store.get_all_chunks().await.unwrap().len(), 2);
        let ids: HashSet<String> = [doc.id.clone()].into();
        let docs = store.get_documents_by_ids(&ids).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_path, "a.md");
    }

    #[tokio::test]
    async fn test_save_replaces_previous_chunks() {
        let store = InMemoryStore::new();
        let doc = make_doc("a.md", "v1");
        store
            .save_document(&doc, &make_chunks(&doc, &["old one", "old two", "old three"]))
            .await
            .unwrap();

        let doc2 = make_doc("a.md", "v2");
        store
            .save_document(&doc2, &make_chunks(&doc2, &["new only"]))
            .await
            .unwrap();

        let chunks = store.get_all_chunks().await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "new only");
        assert_eq!(store.document_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_document_and_chunks() {
        let store = InMemoryStore::new();
        let doc = make_doc("a.md", "alpha");
        store
            .save_document(&doc, &make_chunks(&doc, &["chunk"]))
            .await
            .unwrap();
        store.delete_document(&doc.id).await.unwrap();

        assert!(store.get_all_chunks().await.unwrap().is_empty());
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_absent_not_errors() {
        let store = InMemoryStore::new();
        let ids: HashSet<String> = ["missing".to_string()].into();
        assert!(store.get_documents_by_ids(&ids).await.unwrap().is_empty());
    }
}
