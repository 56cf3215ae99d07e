//! Collaborator contracts for the two external model services.
//!
//! The engine never constructs clients itself: implementations of
//! [`Embedder`] and [`TextGenerator`] are injected at construction time by
//! the surrounding service. Both calls are the engine's only suspension
//! points and are wrapped in caller-configured timeouts at the call sites.

use async_trait::async_trait;

use crate::error::Result;

/// Response from a text-generation call.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub tokens_used: u32,
}

/// Produces fixed-length embedding vectors for text.
///
/// Implementations must return `RetrievalError::Embedding` for empty
/// input, network failure, or a malformed upstream response, and must
/// produce vectors of a single fixed dimension per model.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Generates text from a prompt. Used by the reranker strategy.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Generation>;
}
