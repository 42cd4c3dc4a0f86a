//! Deterministic reference backend.
//!
//! `EchoBackend` is not a language model. It tokenizes one token per
//! `char`, replies by echoing the last `User:` line of the prompt, and
//! produces synthetic per-layer KV state so that the cache contract is
//! driven exactly as a real decode loop would drive it: prefill, then one
//! `get` / extend-by-one-position / `store` cycle per generated token.

use tracing::{debug, warn};

use crate::cache::store::KvCache;
use crate::cache::tensor::{KvLayer, Tensor, TensorError};
use crate::config::{CacheConfig, CacheMissAction, ConfigError};
use crate::context::render::USER_PREFIX;
use crate::inference::backend::{Backend, BackendError, TokenId, Tokenizer};

/// Character-level echo model with synthetic KV state.
#[derive(Debug, Clone)]
pub struct EchoBackend {
    n_layers: usize,
    head_dim: usize,
    on_miss: CacheMissAction,
}

impl Default for EchoBackend {
    fn default() -> Self {
        Self {
            n_layers: 4,
            head_dim: 16,
            on_miss: CacheMissAction::Recompute,
        }
    }
}

impl EchoBackend {
    /// Backend with `n_layers` layers of `head_dim`-wide keys and values.
    ///
    /// A zero `head_dim` is rejected: KV rows would be empty and no cached
    /// position could ever be extended.
    pub fn new(n_layers: usize, head_dim: usize) -> Result<Self, ConfigError> {
        if head_dim == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "head_dim",
                value: head_dim,
            });
        }
        Ok(Self {
            n_layers,
            head_dim,
            on_miss: CacheMissAction::Recompute,
        })
    }

    /// Default-sized backend with cache-miss handling taken from `cache`.
    pub fn from_config(cache: &CacheConfig) -> Self {
        Self::default().with_cache_miss(cache.on_miss)
    }

    pub fn with_cache_miss(mut self, action: CacheMissAction) -> Self {
        self.on_miss = action;
        self
    }

    pub fn n_layers(&self) -> usize {
        self.n_layers
    }

    pub fn head_dim(&self) -> usize {
        self.head_dim
    }

    /// Key and value rows for one token at one position in one layer.
    fn kv_row(&self, layer: usize, position: usize, token: TokenId) -> (Vec<f32>, Vec<f32>) {
        (0..self.head_dim)
            .map(|d| {
                let phase = token as f32 * 0.013
                    + position as f32 * 0.7
                    + layer as f32 * 0.31
                    + d as f32 * 0.05;
                (phase.sin(), 0.5 * phase.cos())
            })
            .unzip()
    }

    /// Full forward pass over `tokens`, as for a prompt prefill.
    fn forward(&self, tokens: &[TokenId]) -> Result<Vec<KvLayer>, TensorError> {
        (0..self.n_layers)
            .map(|layer| {
                let mut keys = Vec::with_capacity(tokens.len() * self.head_dim);
                let mut values = Vec::with_capacity(tokens.len() * self.head_dim);
                for (position, &token) in tokens.iter().enumerate() {
                    let (k, v) = self.kv_row(layer, position, token);
                    keys.extend(k);
                    values.extend(v);
                }
                let shape = vec![tokens.len(), self.head_dim];
                Ok(KvLayer::new(
                    Tensor::new(keys, shape.clone())?,
                    Tensor::new(values, shape)?,
                ))
            })
            .collect()
    }

    /// Single-token forward pass on top of cached state.
    fn step(
        &self,
        state: &mut [KvLayer],
        position: usize,
        token: TokenId,
    ) -> Result<(), BackendError> {
        if state.len() != self.n_layers {
            return Err(BackendError::Generation(format!(
                "cached state has {} layers, model has {}",
                state.len(),
                self.n_layers
            )));
        }
        for (layer, kv) in state.iter_mut().enumerate() {
            if kv.seq_len() != position || kv.value.rows() != position {
                return Err(BackendError::CacheShape {
                    expected: position,
                    actual: kv.seq_len(),
                });
            }
            let (k, v) = self.kv_row(layer, position, token);
            kv.key.append_rows(&k)?;
            kv.value.append_rows(&v)?;
        }
        Ok(())
    }

    /// Tokens the model will emit for `prompt`: the text of its last user line.
    fn reply_script(&self, prompt: &str) -> Vec<TokenId> {
        let line = prompt
            .lines()
            .rev()
            .find_map(|l| l.strip_prefix(USER_PREFIX))
            .or_else(|| prompt.lines().rev().find(|l| !l.trim().is_empty()))
            .unwrap_or("");
        self.encode(line.trim())
    }
}

impl Tokenizer for EchoBackend {
    fn encode(&self, text: &str) -> Vec<TokenId> {
        text.chars().map(u32::from).collect()
    }

    fn decode(&self, ids: &[TokenId]) -> String {
        ids.iter().filter_map(|&id| char::from_u32(id)).collect()
    }

    fn token_count(&self, text: &str) -> usize {
        text.chars().count()
    }
}

impl Backend for EchoBackend {
    fn generate(
        &self,
        prompt: &str,
        max_new_tokens: usize,
        mut cache: Option<&mut dyn KvCache>,
    ) -> Result<String, BackendError> {
        let prompt_ids = self.encode(prompt);
        let script = self.reply_script(prompt);
        let mut generated: Vec<TokenId> = Vec::with_capacity(max_new_tokens.min(script.len()));

        let mut local = self.forward(&prompt_ids)?;
        if let Some(cache) = cache.as_deref_mut() {
            cache.store(std::mem::take(&mut local))?;
        }

        for &next in script.iter().take(max_new_tokens) {
            let mut state = match cache.as_deref_mut() {
                Some(cache) => match cache.get() {
                    Some(state) => state,
                    None => match self.on_miss {
                        CacheMissAction::Stop => {
                            warn!(generated = generated.len(), "KV cache empty, stopping early");
                            break;
                        }
                        CacheMissAction::Recompute => {
                            debug!(
                                generated = generated.len(),
                                "KV cache empty, recomputing context"
                            );
                            let context: Vec<TokenId> =
                                prompt_ids.iter().chain(&generated).copied().collect();
                            self.forward(&context)?
                        }
                    },
                },
                None => std::mem::take(&mut local),
            };

            let position = prompt_ids.len() + generated.len();
            self.step(&mut state, position, next)?;
            generated.push(next);

            match cache.as_deref_mut() {
                Some(cache) => cache.store(state)?,
                None => local = state,
            }
        }

        Ok(self.decode(&generated))
    }
}
