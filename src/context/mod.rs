//! Conversation context management.
//!
//! - [`turn`]: Turn and the head-evicted TurnLedger
//! - [`render`]: transcript rendering
//! - [`policy`]: eviction policies (unbounded, sliding window, paged)
//! - [`manager`]: ledger + policy pair owned by a session

pub mod manager;
pub mod policy;
pub mod render;
pub mod turn;

pub use manager::ContextManager;
pub use policy::{BuiltPrompt, EvictionPolicy};
pub use render::render_prompt;
pub use turn::{Turn, TurnLedger};
