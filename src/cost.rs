//! Token counting and pre-index cost estimation.
//!
//! The estimate gates the embedding spend: it is computed over the final
//! chunk contents (headers included) before any embedding call is made.
//!
//! Prices live in a versioned [`PriceTable`] that is part of the
//! configuration, not in code paths, so rates can be updated without a
//! release. Only the input rate feeds the estimate; the output rate is
//! carried for completeness.
//!
//! Both the tokenizer and the price entry for a model are resolved when a
//! [`CostEstimator`] is constructed, so an unsupported model fails before
//! a single chunk is tokenized.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;
use crate::models::{Chunk, CostEstimate};

/// Per-model rates in USD per 1,000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ModelRates {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelRates {
    pub fn input_rate_per_token(&self) -> f64 {
        self.input_per_1k / 1000.0
    }

    pub fn output_rate_per_token(&self) -> f64 {
        self.output_per_1k / 1000.0
    }
}

/// Versioned model → rates table.
///
/// A `[pricing.models]` section in the config replaces the built-in
/// entries wholesale.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PriceTable {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelRates>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            version: default_version(),
            models: default_models(),
        }
    }
}

fn default_version() -> String {
    "2023-06".to_string()
}

fn default_models() -> BTreeMap<String, ModelRates> {
    let mut models = BTreeMap::new();
    // GPT-4 8K
    models.insert(
        "gpt-4".to_string(),
        ModelRates {
            input_per_1k: 0.03,
            output_per_1k: 0.06,
        },
    );
    models.insert(
        "gpt-4-32k".to_string(),
        ModelRates {
            input_per_1k: 0.06,
            output_per_1k: 0.12,
        },
    );
    // GPT-3.5 Turbo 4K
    models.insert(
        "gpt-3.5-turbo".to_string(),
        ModelRates {
            input_per_1k: 0.0015,
            output_per_1k: 0.002,
        },
    );
    models.insert(
        "gpt-3.5-turbo-16k".to_string(),
        ModelRates {
            input_per_1k: 0.003,
            output_per_1k: 0.004,
        },
    );
    models
}

impl PriceTable {
    pub fn rates(&self, model: &str) -> Option<&ModelRates> {
        self.models.get(model)
    }

    /// Input rate in USD per token, if the model is registered.
    pub fn input_rate_per_token(&self, model: &str) -> Option<f64> {
        self.rates(model).map(ModelRates::input_rate_per_token)
    }

    pub fn validate(&self) -> Result<()> {
        for (model, rates) in &self.models {
            if !(rates.input_per_1k >= 0.0 && rates.output_per_1k >= 0.0) {
                bail!("pricing.models.\"{}\" rates must be non-negative", model);
            }
        }
        Ok(())
    }
}

/// Counts model-specific tokens.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

/// Resolves a [`Tokenizer`] for a model identifier.
pub trait TokenizerSource: Send + Sync {
    fn tokenizer_for(&self, model: &str) -> Result<Box<dyn Tokenizer>, PipelineError>;
}

/// BPE tokenizers from `tiktoken-rs`, selected by OpenAI model name.
pub struct TiktokenSource;

struct BpeTokenizer(tiktoken_rs::CoreBPE);

impl Tokenizer for BpeTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.0.encode_ordinary(text).len()
    }
}

impl TokenizerSource for TiktokenSource {
    fn tokenizer_for(&self, model: &str) -> Result<Box<dyn Tokenizer>, PipelineError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            debug!(model, error = %e, "no tiktoken encoding for model");
            PipelineError::UnsupportedModel {
                model: model.to_string(),
                missing: "tokenizer",
            }
        })?;
        Ok(Box::new(BpeTokenizer(bpe)))
    }
}

/// A validated model binding: tokenizer plus input rate.
pub struct CostEstimator {
    model: String,
    input_rate: f64,
    price_table_version: String,
    tokenizer: Box<dyn Tokenizer>,
}

impl CostEstimator {
    /// Resolve price entry, then tokenizer, for `model`.
    pub fn new(
        model: &str,
        prices: &PriceTable,
        tokenizers: &dyn TokenizerSource,
    ) -> Result<Self, PipelineError> {
        let input_rate =
            prices
                .input_rate_per_token(model)
                .ok_or_else(|| PipelineError::UnsupportedModel {
                    model: model.to_string(),
                    missing: "price entry",
                })?;
        let tokenizer = tokenizers.tokenizer_for(model)?;

        Ok(Self {
            model: model.to_string(),
            input_rate,
            price_table_version: prices.version.clone(),
            tokenizer,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Count tokens per chunk, recording each count on its chunk, and price
    /// the total at the input rate.
    pub fn estimate(&self, chunks: &mut [Chunk]) -> CostEstimate {
        let mut total_tokens = 0usize;
        for chunk in chunks.iter_mut() {
            chunk.token_count = self.tokenizer.count_tokens(&chunk.content);
            total_tokens += chunk.token_count;
        }

        let estimate = CostEstimate {
            total_tokens,
            model: self.model.clone(),
            estimated_usd: total_tokens as f64 * self.input_rate,
            price_table_version: self.price_table_version.clone(),
        };
        debug!(
            model = %estimate.model,
            chunks = chunks.len(),
            tokens = estimate.total_tokens,
            usd = estimate.estimated_usd,
            "cost estimate computed"
        );
        estimate
    }
}

/// One-shot estimate; validates the model before touching any chunk.
pub fn estimate(
    chunks: &mut [Chunk],
    model: &str,
    prices: &PriceTable,
    tokenizers: &dyn TokenizerSource,
) -> Result<CostEstimate, PipelineError> {
    let estimator = CostEstimator::new(model, prices, tokenizers)?;
    Ok(estimator.estimate(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Whitespace tokenizer that counts how often it is invoked.
    struct CountingTokenizer {
        calls: Arc<AtomicUsize>,
    }

    impl Tokenizer for CountingTokenizer {
        fn count_tokens(&self, text: &str) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst);
            text.split_whitespace().count()
        }
    }

    struct CountingSource {
        lookups: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
        known: Vec<&'static str>,
    }

    impl CountingSource {
        fn new(known: Vec<&'static str>) -> Self {
            Self {
                lookups: Arc::new(AtomicUsize::new(0)),
                calls: Arc::new(AtomicUsize::new(0)),
                known,
            }
        }
    }

    impl TokenizerSource for CountingSource {
        fn tokenizer_for(&self, model: &str) -> Result<Box<dyn Tokenizer>, PipelineError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if !self.known.contains(&model) {
                return Err(PipelineError::UnsupportedModel {
                    model: model.to_string(),
                    missing: "tokenizer",
                });
            }
            Ok(Box::new(CountingTokenizer {
                calls: self.calls.clone(),
            }))
        }
    }

    fn sample_chunks() -> Vec<Chunk> {
        let mut chunks = chunk_text("app/a.ts", "let a = 1;\nlet b = 2;\n", 2000, 200).unwrap();
        chunks.extend(chunk_text("app/b.ts", "export default b;", 2000, 200).unwrap());
        chunks
    }

    #[test]
    fn test_price_is_tokens_times_input_rate() {
        let prices = PriceTable::default();
        let source = CountingSource::new(vec![
            "gpt-4",
            "gpt-4-32k",
            "gpt-3.5-turbo",
            "gpt-3.5-turbo-16k",
        ]);
        for model in prices.models.keys() {
            let mut chunks = sample_chunks();
            let est = estimate(&mut chunks, model, &prices, &source).unwrap();
            let rate = prices.input_rate_per_token(model).unwrap();
            assert_eq!(est.estimated_usd, est.total_tokens as f64 * rate);
            assert_eq!(
                est.total_tokens,
                chunks.iter().map(|c| c.token_count).sum::<usize>()
            );
            assert_eq!(est.price_table_version, "2023-06");
        }
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let prices = PriceTable::default();
        let source = CountingSource::new(vec!["gpt-4"]);
        let mut a = sample_chunks();
        let mut b = sample_chunks();
        let estimator = CostEstimator::new("gpt-4", &prices, &source).unwrap();
        assert_eq!(estimator.model(), "gpt-4");
        let e1 = estimator.estimate(&mut a);
        let e2 = estimate(&mut b, "gpt-4", &prices, &source).unwrap();
        assert_eq!(e1, e2);
        assert_eq!(e1.model, estimator.model());
    }

    #[test]
    fn test_missing_price_entry_fails_before_tokenizing() {
        let prices = PriceTable::default();
        let source = CountingSource::new(vec!["gpt-4", "text-davinci-003"]);
        let mut chunks = sample_chunks();
        let err = estimate(&mut chunks, "text-davinci-003", &prices, &source).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnsupportedModel {
                missing: "price entry",
                ..
            }
        ));
        assert_eq!(source.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(chunks.iter().all(|c| c.token_count == 0));
    }

    #[test]
    fn test_missing_tokenizer_fails_before_tokenizing() {
        let mut prices = PriceTable::default();
        prices.models.insert(
            "custom-model".to_string(),
            ModelRates {
                input_per_1k: 0.001,
                output_per_1k: 0.002,
            },
        );
        let source = CountingSource::new(vec!["gpt-4"]);
        let mut chunks = sample_chunks();
        let err = estimate(&mut chunks, "custom-model", &prices, &source).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnsupportedModel {
                missing: "tokenizer",
                ..
            }
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_one_tokenizer_call_per_chunk() {
        let prices = PriceTable::default();
        let source = CountingSource::new(vec!["gpt-4"]);
        let mut chunks = sample_chunks();
        estimate(&mut chunks, "gpt-4", &prices, &source).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), chunks.len());
    }

    #[test]
    fn test_tiktoken_counts_header_tokens() {
        let tokenizer = TiktokenSource.tokenizer_for("gpt-4").unwrap();
        let mut chunks = chunk_text("app/a.ts", "hello world", 2000, 200).unwrap();
        let est = CostEstimator {
            model: "gpt-4".to_string(),
            input_rate: 0.00003,
            price_table_version: "test".to_string(),
            tokenizer,
        }
        .estimate(&mut chunks);
        assert!(est.total_tokens > 2);
        assert_eq!(est.total_tokens, chunks[0].token_count);
    }

    #[test]
    fn test_tiktoken_unknown_model() {
        assert!(matches!(
            TiktokenSource.tokenizer_for("definitely-not-a-model"),
            Err(PipelineError::UnsupportedModel { .. })
        ));
    }

    #[test]
    fn test_price_table_from_toml() {
        let table: PriceTable = toml::from_str(
            r#"
            version = "2024-01"
            [models."gpt-4"]
            input_per_1k = 0.01
            output_per_1k = 0.03
            "#,
        )
        .unwrap();
        assert_eq!(table.version, "2024-01");
        assert_eq!(table.models.len(), 1);
        assert_eq!(table.input_rate_per_token("gpt-4"), Some(0.01 / 1000.0));
    }

    #[test]
    fn test_negative_rates_rejected() {
        let mut table = PriceTable::default();
        table.models.insert(
            "bad".to_string(),
            ModelRates {
                input_per_1k: -1.0,
                output_per_1k: 0.0,
            },
        );
        assert!(table.validate().is_err());
    }
}
