//! Index building: chunks → embeddings → vector store.
//!
//! Chunks are embedded batch by batch, in order, and each batch is
//! upserted before the next is embedded. The builder does not transform
//! chunk content. Failures are labelled by collaborator
//! ([`PipelineError::EmbeddingProvider`] vs [`PipelineError::VectorStore`])
//! and are not retried here; the HTTP clients retry transient errors
//! themselves. Because documents are keyed on [`Chunk::id`], rerunning a
//! failed build overwrites what already landed.

use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::PipelineError;
use crate::models::{Chunk, DocumentMetadata, IndexedDocument};
use crate::progress::{IngestProgressEvent, IngestProgressReporter};
use crate::store::VectorStore;

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub batches: usize,
}

pub struct IndexBuilder<'a> {
    embedder: &'a dyn EmbeddingProvider,
    store: &'a dyn VectorStore,
    batch_size: usize,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(embedder: &'a dyn EmbeddingProvider, store: &'a dyn VectorStore) -> Self {
        Self {
            embedder,
            store,
            batch_size: 64,
        }
    }

    /// Texts per embedding call; clamped to at least 1.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn build(
        &self,
        chunks: &[Chunk],
        progress: &dyn IngestProgressReporter,
    ) -> Result<IndexReport, PipelineError> {
        let total = chunks.len() as u64;
        let mut documents = 0usize;
        let mut batches = 0usize;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .map_err(PipelineError::EmbeddingProvider)?;

            if vectors.len() != batch.len() {
                return Err(PipelineError::EmbeddingProvider(anyhow::anyhow!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            let dims = self.embedder.dims();
            if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
                return Err(PipelineError::EmbeddingProvider(anyhow::anyhow!(
                    "{} returned a {}-dimensional embedding, expected {}",
                    self.embedder.model_name(),
                    bad.len(),
                    dims
                )));
            }

            let docs: Vec<IndexedDocument> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, embedding)| IndexedDocument {
                    id: chunk.id.clone(),
                    content: chunk.content.clone(),
                    metadata: DocumentMetadata {
                        source_id: chunk.source_id.clone(),
                    },
                    embedding,
                })
                .collect();

            self.store
                .upsert(&docs)
                .await
                .map_err(PipelineError::VectorStore)?;

            documents += docs.len();
            batches += 1;
            debug!(batch = batches, documents, "indexed batch");
            progress.report(IngestProgressEvent::Embedding {
                n: documents as u64,
                total,
            });
        }

        info!(
            documents,
            batches,
            model = self.embedder.model_name(),
            "index build complete"
        );
        Ok(IndexReport { documents, batches })
    }
}
