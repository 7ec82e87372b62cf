//! Core data models used throughout repo-chat.
//!
//! These types represent the files, chunks, cost estimates, and retrieval
//! results that flow through the ingestion pipeline and the chat loop.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A file read from the ingestion root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path as produced by the collector (root-joined).
    pub path: PathBuf,
    /// Path relative to the ingestion root, `/`-separated.
    pub relative_path: String,
    pub raw_content: String,
}

/// A header-tagged slice of a source file.
///
/// `content` is `FILE NAME: {source_id}\n###\n{segment}` with NUL
/// characters removed from the segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Stable SHA-256 over source id, index, and content.
    pub id: String,
    pub source_id: String,
    pub chunk_index: usize,
    pub content: String,
    /// Filled in by the cost estimator; zero before estimation.
    pub token_count: usize,
}

/// Pre-index spend estimate for a chunk set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    pub total_tokens: usize,
    pub model: String,
    pub estimated_usd: f64,
    /// Version label of the price table the rate came from.
    pub price_table_version: String,
}

/// Metadata persisted alongside each indexed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source_id: String,
}

/// A chunk plus its embedding, as handed to the vector store.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub embedding: Vec<f32>,
}

/// A similarity search match, ordered by descending `score`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub score: f64,
}

/// One query/answer exchange in the chat loop. Never persisted.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub query: String,
    pub retrieved_chunks: Vec<SearchHit>,
    pub answer: String,
}
