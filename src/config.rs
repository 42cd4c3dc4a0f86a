//! Runtime configuration for kv-context.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! Context-window limits, KV quantization and generation knobs live here.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Static configuration errors. These are fatal: they surface before any
/// turn is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown eviction policy: {0:?} (expected unbounded, sliding or paged)")]
    UnknownPolicy(String),

    #[error("Eviction policy {policy} requires {field}")]
    MissingLimit {
        policy: &'static str,
        field: &'static str,
    },

    #[error("Invalid value {value} for {field}")]
    InvalidLimit { field: &'static str, value: usize },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Conversation context settings.
    pub context: ContextConfig,

    /// KV cache settings.
    pub cache: CacheConfig,

    /// Generation settings.
    pub generation: GenerationConfig,
}

/// Which eviction policy to run and with what limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Policy identifier: "unbounded", "sliding" or "paged".
    pub policy: String,

    /// Token budget for the rendered prompt.
    pub max_tokens: Option<usize>,

    /// Maximum number of retained turns (paged policy).
    pub max_turns: Option<usize>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            policy: "sliding".to_string(),
            max_tokens: Some(512),
            max_turns: Some(6),
        }
    }
}

impl ContextConfig {
    /// The limits part of this section.
    pub fn eviction(&self) -> EvictionConfig {
        EvictionConfig {
            max_tokens: self.max_tokens,
            max_turns: self.max_turns,
        }
    }
}

/// Eviction limits. Which fields matter depends on the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Token budget for the rendered prompt.
    pub max_tokens: Option<usize>,

    /// Maximum number of retained turns.
    pub max_turns: Option<usize>,
}

/// What a backend does when the KV cache has nothing to give it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMissAction {
    /// Recompute the full context from scratch and continue.
    #[default]
    Recompute,
    /// Stop generating and return what has been produced so far.
    Stop,
}

/// KV cache settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Keep per-layer KV state int8-quantized between decode steps.
    pub quantize_kv: bool,

    /// Behaviour when the cache is empty mid-generation.
    pub on_miss: CacheMissAction,
}

/// Generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Tokens to generate per reply.
    pub max_new_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { max_new_tokens: 64 }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.context.policy, "sliding");
        assert_eq!(cfg.context.max_tokens, Some(512));
        assert_eq!(cfg.context.max_turns, Some(6));
        assert!(!cfg.cache.quantize_kv);
        assert_eq!(cfg.cache.on_miss, CacheMissAction::Recompute);
        assert_eq!(cfg.generation.max_new_tokens, 64);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"context": {"policy": "paged", "max_turns": 2}}"#).unwrap();
        assert_eq!(cfg.context.policy, "paged");
        assert_eq!(cfg.context.max_turns, Some(2));
        assert_eq!(cfg.context.max_tokens, Some(512));
        assert_eq!(cfg.generation.max_new_tokens, 64);
    }

    #[test]
    fn test_on_miss_lowercase() {
        let cfg: Config = serde_json::from_str(r#"{"cache": {"on_miss": "stop"}}"#).unwrap();
        assert_eq!(cfg.cache.on_miss, CacheMissAction::Stop);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(cfg.context.policy, "sliding");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"cache": {"quantize_kv": true}, "generation": {"max_new_tokens": 8}}"#,
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert!(cfg.cache.quantize_kv);
        assert_eq!(cfg.generation.max_new_tokens, 8);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
