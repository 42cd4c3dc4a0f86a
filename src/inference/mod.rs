//! Model backend contract.
//!
//! - [`backend`]: `Tokenizer` and `Backend` traits the context layer drives
//! - [`echo`]: deterministic reference backend exercising the KV-cache contract

pub mod backend;
pub mod echo;

pub use backend::{Backend, BackendError, TokenId, Tokenizer};
pub use echo::EchoBackend;
