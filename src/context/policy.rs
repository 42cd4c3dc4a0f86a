//! Eviction policies: decide which turns the ledger keeps and how the
//! prompt is rendered from them.
//!
//! - `Unbounded`: keep everything.
//! - `SlidingWindow`: drop oldest turns until the prompt fits a token
//!   budget, then hard-truncate tokens if the new message alone is too big.
//! - `Paged`: ring buffer of the last `max_turns` turns, with an optional
//!   token budget applied by dropping further old turns.

use tracing::{debug, warn};

use crate::config::{ConfigError, EvictionConfig};
use crate::context::render::render_prompt;
use crate::context::turn::TurnLedger;
use crate::inference::backend::Tokenizer;

/// The active eviction rule and its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    Unbounded,
    SlidingWindow {
        max_tokens: usize,
    },
    Paged {
        max_turns: usize,
        max_tokens: Option<usize>,
    },
}

/// A rendered prompt plus what it cost the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    pub text: String,
    /// Turns dropped from the ledger while building.
    pub evicted_turns: usize,
    /// Whether the lossy token-level truncation was applied.
    pub truncated: bool,
}

impl EvictionPolicy {
    /// Build a policy from its identifier and limits.
    ///
    /// Identifiers are case-insensitive: `unbounded`, `sliding`
    /// (or `sliding_window`) and `paged`.
    pub fn from_config(name: &str, limits: EvictionConfig) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "unbounded" => Ok(Self::Unbounded),
            "sliding" | "sliding_window" => {
                let max_tokens = limits.max_tokens.ok_or(ConfigError::MissingLimit {
                    policy: "sliding",
                    field: "max_tokens",
                })?;
                Ok(Self::SlidingWindow { max_tokens })
            }
            "paged" => {
                let max_turns = limits.max_turns.ok_or(ConfigError::MissingLimit {
                    policy: "paged",
                    field: "max_turns",
                })?;
                if max_turns == 0 {
                    return Err(ConfigError::InvalidLimit {
                        field: "max_turns",
                        value: 0,
                    });
                }
                Ok(Self::Paged {
                    max_turns,
                    max_tokens: limits.max_tokens,
                })
            }
            _ => Err(ConfigError::UnknownPolicy(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unbounded => "unbounded",
            Self::SlidingWindow { .. } => "sliding",
            Self::Paged { .. } => "paged",
        }
    }

    /// Rule applied right after a turn is appended. Returns turns evicted.
    pub fn on_append(&self, ledger: &mut TurnLedger) -> usize {
        match *self {
            Self::Unbounded | Self::SlidingWindow { .. } => 0,
            Self::Paged { max_turns, .. } => {
                let evicted = ledger.truncate_front(max_turns);
                if evicted > 0 {
                    debug!(evicted, max_turns, "Paged out oldest turns");
                }
                evicted
            }
        }
    }

    /// Render a prompt for `new_user`, evicting old turns as the policy requires.
    pub fn build_prompt<T>(
        &self,
        ledger: &mut TurnLedger,
        tokenizer: &T,
        new_user: &str,
    ) -> BuiltPrompt
    where
        T: Tokenizer + ?Sized,
    {
        match *self {
            Self::Unbounded => BuiltPrompt {
                text: render_prompt(&*ledger, new_user),
                evicted_turns: 0,
                truncated: false,
            },
            Self::SlidingWindow { max_tokens } => {
                let (text, evicted_turns) =
                    fit_by_dropping(ledger, tokenizer, new_user, max_tokens);
                if tokenizer.token_count(&text) <= max_tokens {
                    return BuiltPrompt {
                        text,
                        evicted_turns,
                        truncated: false,
                    };
                }
                warn!(
                    max_tokens,
                    prompt_tokens = tokenizer.token_count(&text),
                    "Prompt over budget with no turns left, truncating"
                );
                BuiltPrompt {
                    text: hard_truncate(tokenizer, &text, max_tokens),
                    evicted_turns,
                    truncated: true,
                }
            }
            Self::Paged { max_tokens, .. } => match max_tokens {
                Some(max_tokens) => {
                    let (text, evicted_turns) =
                        fit_by_dropping(ledger, tokenizer, new_user, max_tokens);
                    BuiltPrompt {
                        text,
                        evicted_turns,
                        truncated: false,
                    }
                }
                None => BuiltPrompt {
                    text: render_prompt(&*ledger, new_user),
                    evicted_turns: 0,
                    truncated: false,
                },
            },
        }
    }
}

/// Drop oldest turns until the rendered prompt fits `max_tokens` or the
/// ledger is empty.
fn fit_by_dropping<T>(
    ledger: &mut TurnLedger,
    tokenizer: &T,
    new_user: &str,
    max_tokens: usize,
) -> (String, usize)
where
    T: Tokenizer + ?Sized,
{
    let mut prompt = render_prompt(&*ledger, new_user);
    let mut evicted = 0;
    while tokenizer.token_count(&prompt) > max_tokens && ledger.pop_oldest().is_some() {
        evicted += 1;
        prompt = render_prompt(&*ledger, new_user);
    }
    if evicted > 0 {
        debug!(
            evicted,
            max_tokens,
            remaining = ledger.len(),
            "Evicted turns for token budget"
        );
    }
    (prompt, evicted)
}

/// Keep only the last `max_tokens` tokens of `prompt`.
///
/// Lossy: the result may start mid-turn or mid-word. Without token ids,
/// whole leading lines are dropped instead.
pub fn hard_truncate<T>(tokenizer: &T, prompt: &str, max_tokens: usize) -> String
where
    T: Tokenizer + ?Sized,
{
    if !tokenizer.supports_token_ids() {
        return truncate_lines(tokenizer, prompt, max_tokens);
    }
    let ids = tokenizer.encode(prompt);
    let start = ids.len().saturating_sub(max_tokens);
    tokenizer.decode(&ids[start..])
}

/// Drop leading lines until the remainder fits `max_tokens`.
fn truncate_lines<T>(tokenizer: &T, prompt: &str, max_tokens: usize) -> String
where
    T: Tokenizer + ?Sized,
{
    let lines: Vec<&str> = prompt.lines().collect();
    (0..lines.len())
        .map(|start| lines[start..].join("\n"))
        .find(|tail| tokenizer.token_count(tail) <= max_tokens)
        .unwrap_or_default()
}
