//! Engine configuration: strongly typed, defaulted at the boundary, and
//! validated once at load time. Nothing deeper in the engine re-interprets
//! raw configuration values.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, RetrievalError};
use crate::filter::FilterStrategy;
use crate::normalize::NormalizationStrategy;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Approximate token budget per chunk.
    #[serde(default = "default_chunk_size_tokens")]
    pub chunk_size_tokens: usize,

    /// Approximate token overlap between adjacent chunks.
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Rescale applied to every embedding vector, at indexing time and
    /// query time alike.
    #[serde(default)]
    pub normalization_strategy: NormalizationStrategy,

    /// Post-retrieval context filtering strategy.
    #[serde(default)]
    pub filter_strategy: FilterStrategy,

    /// Similarity floor used by the threshold and hybrid strategies.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// Optional cap on kept chunks after the threshold cut.
    #[serde(default)]
    pub keep_top: Option<usize>,

    /// Maximum chunks the reranker strategy may keep.
    #[serde(default = "default_reranker_max_chunks")]
    pub reranker_max_chunks: usize,

    /// Timeout for a single embedding call.
    #[serde(default = "default_timeout_secs")]
    pub embed_timeout_secs: u64,

    /// Timeout for the reranking call.
    #[serde(default = "default_timeout_secs")]
    pub rerank_timeout_secs: u64,
}

fn default_chunk_size_tokens() -> usize {
    512
}
fn default_overlap_tokens() -> usize {
    64
}
fn default_min_similarity() -> f32 {
    0.7
}
fn default_reranker_max_chunks() -> usize {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size_tokens(),
            overlap_tokens: default_overlap_tokens(),
            normalization_strategy: NormalizationStrategy::default(),
            filter_strategy: FilterStrategy::default(),
            min_similarity: default_min_similarity(),
            keep_top: None,
            reranker_max_chunks: default_reranker_max_chunks(),
            embed_timeout_secs: default_timeout_secs(),
            rerank_timeout_secs: default_timeout_secs(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration. Called once at engine construction;
    /// failures are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size_tokens == 0 {
            return Err(RetrievalError::Configuration(
                "chunk_size_tokens must be > 0".to_string(),
            ));
        }
        if self.overlap_tokens >= self.chunk_size_tokens {
            return Err(RetrievalError::Configuration(format!(
                "overlap_tokens ({}) must be smaller than chunk_size_tokens ({})",
                self.overlap_tokens, self.chunk_size_tokens
            )));
        }
        if !self.min_similarity.is_finite() || !(-1.0..=1.0).contains(&self.min_similarity) {
            return Err(RetrievalError::Configuration(format!(
                "min_similarity must be in [-1.0, 1.0], got {}",
                self.min_similarity
            )));
        }
        if self.reranker_max_chunks == 0 {
            return Err(RetrievalError::Configuration(
                "reranker_max_chunks must be >= 1".to_string(),
            ));
        }
        if self.embed_timeout_secs == 0 || self.rerank_timeout_secs == 0 {
            return Err(RetrievalError::Configuration(
                "timeouts must be >= 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn rerank_timeout(&self) -> Duration {
        Duration::from_secs(self.rerank_timeout_secs)
    }
}

/// Load and validate an [`EngineConfig`] from a TOML file.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RetrievalError::Configuration(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: EngineConfig = toml::from_str(&content)
        .map_err(|e| RetrievalError::Configuration(format!("failed to parse config file: {}", e)))?;

    config.validate()?;
    Ok(config)
}
