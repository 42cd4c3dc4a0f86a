//! The capabilities the context layer needs from a model backend.

use thiserror::Error;

use crate::cache::store::KvCache;
use crate::cache::tensor::TensorError;

/// Token identifier.
pub type TokenId = u32;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Cached KV state covers {actual} positions, expected {expected}")]
    CacheShape { expected: usize, actual: usize },

    #[error("KV cache rejected state: {0}")]
    Cache(#[from] TensorError),

    #[error("Generation failed: {0}")]
    Generation(String),
}

/// Text <-> token conversion.
pub trait Tokenizer {
    fn encode(&self, text: &str) -> Vec<TokenId>;

    fn decode(&self, ids: &[TokenId]) -> String;

    /// Best-effort token length. Never fails; empty text counts as 0.
    fn token_count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// Whether `encode`/`decode` give usable token ids. Backends that can
    /// only count tokens return `false`, and token-level truncation falls
    /// back to dropping whole lines.
    fn supports_token_ids(&self) -> bool {
        true
    }
}

/// An opaque text generator.
///
/// When `cache` is supplied the backend must `store` the KV state of every
/// forward pass before it asks `get` for the next one, and must treat a
/// `None` from `get` as recoverable: recompute or stop early.
pub trait Backend: Tokenizer {
    fn generate(
        &self,
        prompt: &str,
        max_new_tokens: usize,
        cache: Option<&mut dyn KvCache>,
    ) -> Result<String, BackendError>;
}
