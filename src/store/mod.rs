//! Vector store abstraction for repo-chat.
//!
//! The [`VectorStore`] trait is the only surface the index builder and the
//! chat loop see. Backends:
//!
//! | Backend | Type | Notes |
//! |---------|------|-------|
//! | in-memory | [`memory::InMemoryStore`] | tests; brute-force cosine |
//! | `sqlite` | [`sqlite::SqliteStore`] | local file; vectors as BLOBs |
//! | `supabase` | [`supabase::SupabaseStore`] | pgvector via PostgREST |
//!
//! Every backend owns an [`EmbeddingProvider`] handle so that
//! [`similarity_search`](VectorStore::similarity_search) can take the raw
//! query text. Upserts are keyed on the document id, so indexing the same
//! chunk twice replaces it instead of duplicating it.

pub mod memory;
pub mod sqlite;
pub mod supabase;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::models::{IndexedDocument, SearchHit};

/// Persistence and nearest-neighbour lookup for indexed chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace documents by id.
    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<()>;

    /// Return up to `k` documents closest to `query`, by descending score.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

/// Build the store selected by `[store] backend`.
pub async fn create_store(
    config: &Config,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend.as_str() {
        "sqlite" => Ok(Arc::new(
            sqlite::SqliteStore::open(&config.store.path, embedder).await?,
        )),
        "supabase" => Ok(Arc::new(supabase::SupabaseStore::from_env(
            &config.store,
            config.embedding.max_retries,
            config.embedding.timeout_secs,
            embedder,
        )?)),
        other => bail!("Unknown store backend: {}", other),
    }
}

/// Sort hits by descending score and keep the top `k`.
pub(crate) fn rank(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}
