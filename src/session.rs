//! Per-conversation state.
//!
//! A `Session` owns everything one conversation needs: the turn ledger with
//! its eviction policy and, when KV quantization is enabled, the rolling
//! cache store. Nothing is shared between sessions; a service running many
//! conversations keeps one `Session` per conversation.

use std::time::{Duration, Instant};

use tracing::info;
use uuid::Uuid;

use crate::cache::store::{CacheStats, KvCache, QuantizedCacheStore};
use crate::config::{Config, ConfigError};
use crate::context::manager::ContextManager;
use crate::context::policy::EvictionPolicy;
use crate::inference::backend::{Backend, BackendError};

/// Outcome of one `respond` call.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub reply: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    /// Turns evicted while building the prompt and after appending the exchange.
    pub evicted_turns: usize,
    /// Whether the prompt was hard-truncated to fit.
    pub truncated: bool,
    pub latency: Duration,
}

impl TurnReport {
    pub fn tokens_per_second(&self) -> f64 {
        let secs = self.latency.as_secs_f64();
        if secs > 0.0 {
            self.completion_tokens as f64 / secs
        } else {
            0.0
        }
    }
}

/// One conversation.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    context: ContextManager,
    kv_cache: Option<QuantizedCacheStore>,
    max_new_tokens: usize,
}

impl Session {
    /// Start a conversation. Pass a cache store to keep KV state quantized
    /// between decode steps, or `None` to let the backend hold it.
    pub fn new(
        policy: EvictionPolicy,
        kv_cache: Option<QuantizedCacheStore>,
        max_new_tokens: usize,
    ) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            context: ContextManager::new(policy),
            kv_cache,
            max_new_tokens,
        };
        info!(
            session = %session.id,
            policy = session.context.policy().name(),
            quantize_kv = session.kv_cache.is_some(),
            max_new_tokens,
            "Session created"
        );
        session
    }

    /// Build a session from configuration, failing fast on invalid policy settings.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let policy = EvictionPolicy::from_config(&config.context.policy, config.context.eviction())?;
        Ok(Self::new(
            policy,
            config.cache.quantize_kv.then(QuantizedCacheStore::new),
            config.generation.max_new_tokens,
        ))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn kv_cache(&self) -> Option<&QuantizedCacheStore> {
        self.kv_cache.as_ref()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.kv_cache.as_ref().map(QuantizedCacheStore::stats)
    }

    /// Run one exchange: build the prompt, generate, record the turn.
    ///
    /// On a backend error the ledger is left as prompt building left it and
    /// the exchange is not recorded.
    pub fn respond<B>(&mut self, backend: &B, user: &str) -> Result<TurnReport, BackendError>
    where
        B: Backend + ?Sized,
    {
        let built = self.context.build_prompt(backend, user);
        let prompt_tokens = backend.token_count(&built.text);

        let start = Instant::now();
        let cache = self.kv_cache.as_mut().map(|c| c as &mut dyn KvCache);
        let reply = backend.generate(&built.text, self.max_new_tokens, cache)?;
        let latency = start.elapsed();

        let completion_tokens = backend.token_count(&reply);
        let evicted_turns = built.evicted_turns + self.context.add_turn(user, reply.clone());

        info!(
            session = %self.id,
            prompt_tokens,
            completion_tokens,
            evicted_turns,
            retained_turns = self.context.len(),
            truncated = built.truncated,
            latency_ms = latency.as_millis() as u64,
            "Turn complete"
        );

        Ok(TurnReport {
            reply,
            prompt_tokens,
            completion_tokens,
            evicted_turns,
            truncated: built.truncated,
            latency,
        })
    }

    /// Forget the conversation: clear the ledger and drop any cached KV state.
    pub fn reset(&mut self) {
        self.context.clear();
        if let Some(cache) = self.kv_cache.as_mut() {
            cache.clear();
        }
        info!(session = %self.id, "Session reset");
    }
}
