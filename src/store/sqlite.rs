//! SQLite-backed [`VectorStore`].
//!
//! Vectors are persisted as BLOBs and ranked in process with cosine
//! similarity, which is plenty for a single repository's worth of chunks.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::db;
use crate::embedding::{
    blob_to_vec, cosine_similarity, embed_query, vec_to_blob, EmbeddingProvider,
};
use crate::migrate;
use crate::models::{DocumentMetadata, IndexedDocument, SearchHit};

use super::{rank, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteStore {
    /// Connect to (creating if needed) the database at `path` and ensure
    /// the schema exists.
    pub async fn open(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let pool = db::connect(path)
            .await
            .with_context(|| format!("Failed to open index database: {}", path.display()))?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool, embedder })
    }

    /// Number of stored documents.
    pub async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for doc in documents {
            let metadata_json = serde_json::to_string(&doc.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO documents (id, source_id, content, metadata_json, embedding, dims, indexed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source_id = excluded.source_id,
                    content = excluded.content,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    dims = excluded.dims,
                    indexed_at = excluded.indexed_at
                "#,
            )
            .bind(&doc.id)
            .bind(&doc.metadata.source_id)
            .bind(&doc.content)
            .bind(&metadata_json)
            .bind(vec_to_blob(&doc.embedding))
            .bind(doc.embedding.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(documents = documents.len(), "sqlite upsert committed");
        Ok(())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;

        let rows = sqlx::query("SELECT content, metadata_json, embedding FROM documents")
            .fetch_all(&self.pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let content: String = row.get("content");
            let metadata_json: String = row.get("metadata_json");
            let blob: Vec<u8> = row.get("embedding");
            let metadata: DocumentMetadata = serde_json::from_str(&metadata_json)
                .with_context(|| "Corrupt metadata_json in index database")?;
            let score = cosine_similarity(&query_vec, &blob_to_vec(&blob)) as f64;
            hits.push(SearchHit {
                content,
                metadata,
                score,
            });
        }

        Ok(rank(hits, k))
    }
}
