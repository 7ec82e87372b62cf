//! Supabase (pgvector over PostgREST) [`VectorStore`].
//!
//! Expects the conventional schema: a table with `id text primary key`,
//! `content text`, `metadata jsonb`, `embedding vector(N)`, plus a
//! `match_documents(query_embedding, match_count)` SQL function returning
//! `content`, `metadata`, and `similarity` ordered by similarity.
//!
//! Upserts use `Prefer: resolution=merge-duplicates` so a retried build
//! overwrites rows instead of duplicating them.
//!
//! Requires `SUPABASE_URL` and `SUPABASE_KEY` in the environment.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::StoreConfig;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::models::{DocumentMetadata, IndexedDocument, SearchHit};
use crate::retry::send_with_retry;

use super::VectorStore;

pub struct SupabaseStore {
    url: String,
    key: String,
    table: String,
    query_name: String,
    max_retries: u32,
    client: reqwest::Client,
    embedder: Arc<dyn EmbeddingProvider>,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    content: String,
    metadata: DocumentMetadata,
    similarity: f64,
}

impl SupabaseStore {
    pub fn from_env(
        config: &StoreConfig,
        max_retries: u32,
        timeout_secs: u64,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| anyhow::anyhow!("SUPABASE_URL environment variable not set"))?;
        let key = std::env::var("SUPABASE_KEY")
            .map_err(|_| anyhow::anyhow!("SUPABASE_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            key,
            table: config.table.clone(),
            query_name: config.query_name.clone(),
            max_retries,
            client,
            embedder,
        })
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }
}

fn upsert_body(documents: &[IndexedDocument]) -> serde_json::Value {
    serde_json::Value::Array(
        documents
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id,
                    "content": d.content,
                    "metadata": d.metadata,
                    "embedding": d.embedding,
                })
            })
            .collect(),
    )
}

fn parse_matches(text: &str) -> Result<Vec<SearchHit>> {
    let rows: Vec<MatchRow> =
        serde_json::from_str(text).with_context(|| "Invalid Supabase match response")?;
    Ok(rows
        .into_iter()
        .map(|r| SearchHit {
            content: r.content,
            metadata: r.metadata,
            score: r.similarity,
        })
        .collect())
}

#[async_trait]
impl VectorStore for SupabaseStore {
    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let endpoint = format!("{}/rest/v1/{}?on_conflict=id", self.url, self.table);
        let body = upsert_body(documents);

        send_with_retry("Supabase", self.max_retries, || {
            self.authed(self.client.post(&endpoint))
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&body)
        })
        .await?;
        Ok(())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        let endpoint = format!("{}/rest/v1/rpc/{}", self.url, self.query_name);
        let body = serde_json::json!({
            "query_embedding": query_vec,
            "match_count": k,
        });

        let text = send_with_retry("Supabase", self.max_retries, || {
            self.authed(self.client.post(&endpoint)).json(&body)
        })
        .await?;

        let mut hits = parse_matches(&text)?;
        hits.truncate(k);
        Ok(hits)
    }
}
