//! Error taxonomy for the ingestion pipeline and chat loop.
//!
//! Each variant names the stage or collaborator that failed, so callers can
//! decide on retry policy without string matching. Application glue
//! (CLI, config loading) uses `anyhow` and converts into these at the
//! pipeline boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the core pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The ingestion root or one of its entries could not be read.
    /// Fatal to the whole traversal; no partial result is returned.
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No tokenizer or price entry is registered for the requested model.
    #[error("unsupported model '{model}': no {missing} registered")]
    UnsupportedModel { model: String, missing: &'static str },

    /// The embedding collaborator failed.
    #[error("embedding provider error: {0:#}")]
    EmbeddingProvider(#[source] anyhow::Error),

    /// The vector store collaborator failed.
    #[error("vector store error: {0:#}")]
    VectorStore(#[source] anyhow::Error),

    /// The generation collaborator failed for a single chat turn.
    #[error("generation provider error: {0:#}")]
    GenerationProvider(#[source] anyhow::Error),

    /// Invalid pipeline parameters (chunk sizes and the like).
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Short label of the failing stage, used in progress and log output.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Filesystem { .. } => "filesystem",
            PipelineError::UnsupportedModel { .. } => "model",
            PipelineError::EmbeddingProvider(_) => "embedding",
            PipelineError::VectorStore(_) => "vector-store",
            PipelineError::GenerationProvider(_) => "generation",
            PipelineError::Config(_) => "config",
        }
    }
}
