//! kv-context: conversation context and KV-cache management for LLM inference.
//!
//! Decides, per turn, how much prior conversation to keep and how compactly
//! the model's per-layer key/value state is held between decode steps:
//!   - [`context`]: turn ledger, prompt rendering, eviction policies
//!   - [`cache`]: int8 tensor quantization and the rolling snapshot store
//!   - [`inference`]: the backend contract plus a deterministic reference backend
//!   - [`session`]: per-conversation owner tying the pieces together
//!
//! The model itself is an external collaborator reached through
//! [`inference::Backend`].

pub mod cache;
pub mod config;
pub mod context;
pub mod inference;
pub mod session;

pub use cache::store::{KvCache, QuantizedCacheStore};
pub use config::{Config, ConfigError};
pub use context::manager::ContextManager;
pub use context::policy::EvictionPolicy;
pub use session::Session;
