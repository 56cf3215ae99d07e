//! Error taxonomy for the retrieval engine.
//!
//! Callers are expected to match on the variant: configuration errors are
//! fatal at startup, embedding errors fail the active request, rerank
//! errors are recovered inside the filter by falling back to threshold
//! filtering, and store errors propagate without masking.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// All failure modes surfaced by the retrieval engine.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Invalid chunking or engine configuration. Raised once at startup
    /// (or at the chunker boundary) and never recoverable.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Upstream embedding call failed, timed out, or was given empty input.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Reranker call or response parse failed. Never propagated out of the
    /// context filter: the filter degrades to threshold filtering instead.
    #[error("rerank failed: {0}")]
    Rerank(String),

    /// Knowledge store read or write failed.
    #[error("store operation failed: {0}")]
    Store(String),
}
