//! TOML configuration parsing.
//!
//! Every section is optional; missing sections fall back to the defaults
//! the tool has always shipped with (gpt-4, 2000/200 character chunks,
//! the classic exclusion lists). When no config file exists at all,
//! [`Config::minimal`] is used.
//!
//! ```toml
//! [model]
//! name = "gpt-4"
//!
//! [chunking]
//! max_chars = 2000
//! overlap_chars = 200
//!
//! [store]
//! backend = "sqlite"
//! path = "./data/repo-chat.sqlite"
//!
//! [pricing]
//! version = "2023-06"
//!
//! [pricing.models."gpt-4"]
//! input_per_1k = 0.03
//! output_per_1k = 0.06
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::collect::ExclusionRules;
use crate::cost::PriceTable;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub pricing: PriceTable,
}

/// Model identifier selecting tokenizer, price entry, and default chat model.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub name: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
        }
    }
}

fn default_model() -> String {
    "gpt-4".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    #[serde(default = "default_exclude_files")]
    pub exclude_files: Vec<String>,
    #[serde(default = "default_exclude_extensions")]
    pub exclude_extensions: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: default_exclude_dirs(),
            exclude_files: default_exclude_files(),
            exclude_extensions: default_exclude_extensions(),
            follow_symlinks: false,
        }
    }
}

impl IngestConfig {
    pub fn exclusion_rules(&self) -> ExclusionRules {
        ExclusionRules::new(
            self.exclude_dirs.iter().cloned(),
            self.exclude_files.iter().cloned(),
            self.exclude_extensions.iter().cloned(),
        )
        .follow_symlinks(self.follow_symlinks)
    }
}

fn default_exclude_dirs() -> Vec<String> {
    [".git", "node_modules", "public", "assets"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_files() -> Vec<String> {
    ["package-lock.json", ".DS_Store"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_extensions() -> Vec<String> {
    [
        ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".ico", ".svg", ".webp", ".mp3", ".wav",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    2000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// SQLite database file (sqlite backend).
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Table name (supabase backend).
    #[serde(default = "default_table")]
    pub table: String,
    /// Similarity RPC function name (supabase backend).
    #[serde(default = "default_query_name")]
    pub query_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
            table: default_table(),
            query_name: default_query_name(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./data/repo-chat.sqlite")
}
fn default_table() -> String {
    "documents".to_string()
}
fn default_query_name() -> String {
    "match_documents".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per chat turn.
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    /// Chat model; falls back to `[model] name` when unset.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "openai".to_string()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_generation_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Built-in configuration used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Chat model name, resolved against the top-level model.
    pub fn generation_model(&self) -> &str {
        self.generation
            .model
            .as_deref()
            .unwrap_or(self.model.name.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            bail!("chunking.max_chars must be > 0");
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            bail!(
                "chunking.overlap_chars ({}) must be smaller than chunking.max_chars ({})",
                self.chunking.overlap_chars,
                self.chunking.max_chars
            );
        }

        if self.retrieval.k < 1 {
            bail!("retrieval.k must be >= 1");
        }

        if self.embedding.is_enabled() {
            if self.embedding.dims == 0 {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.batch_size == 0 {
                bail!("embedding.batch_size must be > 0");
            }
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }

        match self.generation.provider.as_str() {
            "disabled" | "openai" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be disabled or openai.",
                other
            ),
        }

        match self.store.backend.as_str() {
            "sqlite" | "supabase" => {}
            other => bail!(
                "Unknown store backend: '{}'. Must be sqlite or supabase.",
                other
            ),
        }

        self.pricing.validate()?;

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using built-in defaults");
        let config = Config::minimal();
        config.validate()?;
        Ok(config)
    }
}
