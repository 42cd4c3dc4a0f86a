//! Ledger and policy bound together for one conversation.

use crate::config::{ConfigError, ContextConfig};
use crate::context::policy::{BuiltPrompt, EvictionPolicy};
use crate::context::turn::{Turn, TurnLedger};
use crate::inference::backend::Tokenizer;

/// Owns a conversation's turns and applies its eviction policy to them.
#[derive(Debug, Clone)]
pub struct ContextManager {
    ledger: TurnLedger,
    policy: EvictionPolicy,
}

impl ContextManager {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            ledger: TurnLedger::new(),
            policy,
        }
    }

    /// Build from the `context` config section. Fails on an unknown policy
    /// or missing limits.
    pub fn from_config(config: &ContextConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(EvictionPolicy::from_config(
            &config.policy,
            config.eviction(),
        )?))
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Append a completed exchange and apply the policy's append rule.
    /// Returns how many old turns were evicted.
    pub fn add_turn(&mut self, user: impl Into<String>, assistant: impl Into<String>) -> usize {
        self.ledger.push(Turn::new(user, assistant));
        self.policy.on_append(&mut self.ledger)
    }

    /// Render the prompt for `new_user`, evicting turns if the policy needs to.
    pub fn build_prompt<T>(&mut self, tokenizer: &T, new_user: &str) -> BuiltPrompt
    where
        T: Tokenizer + ?Sized,
    {
        self.policy.build_prompt(&mut self.ledger, tokenizer, new_user)
    }

    pub fn ledger(&self) -> &TurnLedger {
        &self.ledger
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.ledger.to_vec()
    }

    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    pub fn clear(&mut self) {
        self.ledger.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::echo::EchoBackend;

    #[test]
    fn test_paged_scenario() {
        let mut ctx = ContextManager::new(EvictionPolicy::Paged {
            max_turns: 2,
            max_tokens: None,
        });
        assert_eq!(ctx.add_turn("hi", "hello"), 0);
        assert_eq!(ctx.add_turn("bye", "later"), 0);
        assert_eq!(ctx.add_turn("who", "me"), 1);
        assert_eq!(ctx.turns(), vec![Turn::new("bye", "later"), Turn::new("who", "me")]);
    }

    #[test]
    fn test_from_config_rejects_unknown_policy() {
        let config = ContextConfig {
            policy: "fifo".to_string(),
            ..Default::default()
        };
        assert_eq!(
            ContextManager::from_config(&config).unwrap_err(),
            ConfigError::UnknownPolicy("fifo".to_string())
        );
    }

    #[test]
    fn test_from_default_config_is_sliding() {
        let ctx = ContextManager::from_config(&ContextConfig::default()).unwrap();
        assert_eq!(ctx.policy(), EvictionPolicy::SlidingWindow { max_tokens: 512 });
    }

    #[test]
    fn test_build_prompt_evicts_from_owned_ledger() {
        let mut ctx = ContextManager::new(EvictionPolicy::SlidingWindow { max_tokens: 55 });
        ctx.add_turn("first question", "first answer");
        ctx.add_turn("second", "two");

        let built = ctx.build_prompt(&EchoBackend::default(), "third");
        assert_eq!(built.evicted_turns, 1);
        assert_eq!(ctx.turns(), vec![Turn::new("second", "two")]);
        assert!(built.text.chars().count() <= 55);
    }

    #[test]
    fn test_clear() {
        let mut ctx = ContextManager::new(EvictionPolicy::Unbounded);
        ctx.add_turn("a", "b");
        ctx.clear();
        assert!(ctx.is_empty());
    }
}
