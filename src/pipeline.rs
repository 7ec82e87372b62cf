//! Ingestion pipeline orchestration.
//!
//! Ingest runs in two phases:
//!
//! 1. [`prepare`]: collect → read → chunk → estimate. Touches only the
//!    filesystem and the tokenizer; nothing is sent anywhere.
//! 2. [`IngestPlan::commit`]: embed and upsert the planned chunks.
//!
//! An [`IngestPlan`] can only be produced by [`prepare`], so every index
//! build is preceded by a cost estimate the caller has had a chance to show.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::chunk;
use crate::collect;
use crate::config::Config;
use crate::cost::{CostEstimator, TokenizerSource};
use crate::embedding::EmbeddingProvider;
use crate::error::PipelineError;
use crate::index::{IndexBuilder, IndexReport};
use crate::models::{Chunk, CostEstimate};
use crate::progress::{IngestProgressEvent, IngestProgressReporter};
use crate::store::VectorStore;

/// Chunks ready to index, plus what indexing them is expected to cost.
#[derive(Debug)]
pub struct IngestPlan {
    root: PathBuf,
    files: usize,
    chunks: Vec<Chunk>,
    estimate: CostEstimate,
}

impl IngestPlan {
    pub fn files(&self) -> usize {
        self.files
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn estimate(&self) -> &CostEstimate {
        &self.estimate
    }

    /// Embed and store every planned chunk.
    pub async fn commit(
        self,
        embedder: &dyn EmbeddingProvider,
        store: &dyn VectorStore,
        batch_size: usize,
        progress: &dyn IngestProgressReporter,
    ) -> Result<IndexReport, PipelineError> {
        let report = IndexBuilder::new(embedder, store)
            .batch_size(batch_size)
            .build(&self.chunks, progress)
            .await?;
        info!(
            root = %self.root.display(),
            files = self.files,
            documents = report.documents,
            "ingest committed"
        );
        Ok(report)
    }
}

/// Collect, chunk, and estimate `root` under `config`.
///
/// The model is validated before the tree is walked, so an unsupported
/// model fails without reading any file.
pub fn prepare(
    config: &Config,
    root: &Path,
    tokenizers: &dyn TokenizerSource,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestPlan, PipelineError> {
    let estimator = CostEstimator::new(&config.model.name, &config.pricing, tokenizers)?;

    progress.report(IngestProgressEvent::Collecting {
        root: root.display().to_string(),
    });
    let rules = config.ingest.exclusion_rules();
    let paths = collect::collect(root, &rules)?;
    let sources = collect::read_sources(root, &paths)?;

    progress.report(IngestProgressEvent::Chunking {
        files: sources.len() as u64,
    });
    let mut chunks = chunk::chunk(
        &sources,
        config.chunking.max_chars,
        config.chunking.overlap_chars,
    )?;

    progress.report(IngestProgressEvent::Estimating {
        chunks: chunks.len() as u64,
    });
    let estimate = estimator.estimate(&mut chunks);

    info!(
        root = %root.display(),
        files = sources.len(),
        chunks = chunks.len(),
        model = estimator.model(),
        tokens = estimate.total_tokens,
        "ingest prepared"
    );

    Ok(IngestPlan {
        root: root.to_path_buf(),
        files: sources.len(),
        chunks,
        estimate,
    })
}

/// Lines shown to the user before confirming an ingest.
pub fn estimate_lines(estimate: &CostEstimate) -> [String; 3] {
    [
        "! Usage Estimate".to_string(),
        format!("> Token: {}", estimate.total_tokens),
        format!("> Price: ${}", estimate.estimated_usd),
    ]
}

pub fn print_estimate(estimate: &CostEstimate) {
    for line in estimate_lines(estimate) {
        println!("{}", line);
    }
}
