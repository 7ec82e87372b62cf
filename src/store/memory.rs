//! In-memory [`VectorStore`] implementation for testing.
//!
//! Documents live in a `Vec` behind `std::sync::RwLock`. Similarity search
//! is brute-force cosine over every stored vector.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, embed_query, EmbeddingProvider};
use crate::models::{IndexedDocument, SearchHit};

use super::{rank, VectorStore};

pub struct InMemoryStore {
    embedder: Arc<dyn EmbeddingProvider>,
    docs: RwLock<Vec<IndexedDocument>>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            docs: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of stored documents, in insertion order.
    pub fn documents(&self) -> Vec<IndexedDocument> {
        self.docs.read().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<()> {
        let mut docs = self
            .docs
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        for doc in documents {
            match docs.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = doc.clone(),
                None => docs.push(doc.clone()),
            }
        }
        Ok(())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        let docs = self
            .docs
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        let hits = docs
            .iter()
            .map(|d| SearchHit {
                content: d.content.clone(),
                metadata: d.metadata.clone(),
                score: cosine_similarity(&query_vec, &d.embedding) as f64,
            })
            .collect();
        Ok(rank(hits, k))
    }
}
