//! Integration tests for the eviction policies.

use kv_context::config::{ConfigError, EvictionConfig};
use kv_context::context::{render_prompt, ContextManager, EvictionPolicy, Turn};
use kv_context::inference::{TokenId, Tokenizer};
use proptest::prelude::*;

/// One token per whitespace-separated word.
struct Words;

impl Tokenizer for Words {
    fn encode(&self, text: &str) -> Vec<TokenId> {
        text.split_whitespace().map(|w| w.len() as TokenId).collect()
    }

    fn decode(&self, ids: &[TokenId]) -> String {
        ids.iter()
            .map(|&n| "w".repeat(n as usize))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Counts content words only; role tags are free.
struct ContentWords;

impl Tokenizer for ContentWords {
    fn encode(&self, text: &str) -> Vec<TokenId> {
        text.split_whitespace()
            .filter(|w| *w != "User:" && *w != "Assistant:")
            .map(|_| 1)
            .collect()
    }

    fn decode(&self, ids: &[TokenId]) -> String {
        vec!["w"; ids.len()].join(" ")
    }
}

#[test]
fn test_paged_two_turn_scenario() {
    let mut ctx = ContextManager::new(
        EvictionPolicy::from_config(
            "paged",
            EvictionConfig {
                max_tokens: None,
                max_turns: Some(2),
            },
        )
        .unwrap(),
    );
    ctx.add_turn("hi", "hello");
    ctx.add_turn("bye", "later");
    ctx.add_turn("who", "me");

    assert_eq!(
        ctx.turns(),
        vec![Turn::new("bye", "later"), Turn::new("who", "me")]
    );
}

#[test]
fn test_sliding_five_turn_scenario() {
    let mut ctx = ContextManager::new(EvictionPolicy::SlidingWindow { max_tokens: 10 });
    for i in 0..5 {
        // Three content tokens per turn.
        ctx.add_turn(format!("question {i}"), "answer");
    }
    assert_eq!(ctx.len(), 5);

    let built = ctx.build_prompt(&ContentWords, "new message");
    assert!(ContentWords.token_count(&built.text) <= 10);
    assert!(!built.truncated);
    assert_eq!(built.evicted_turns, 3);
    assert_eq!(ctx.len(), 2);
    assert!(built.text.starts_with("User: question 3\n"));
}

#[test]
fn test_unknown_policy_is_fatal() {
    let err = EvictionPolicy::from_config("quantized", EvictionConfig::default()).unwrap_err();
    assert_eq!(err, ConfigError::UnknownPolicy("quantized".to_string()));
}

#[test]
fn test_paged_token_budget_never_exceeds_turn_cap() {
    let mut ctx = ContextManager::new(EvictionPolicy::Paged {
        max_turns: 3,
        max_tokens: Some(1000),
    });
    for i in 0..10 {
        ctx.add_turn(format!("u{i}"), format!("a{i}"));
    }
    let built = ctx.build_prompt(&Words, "next");
    assert_eq!(built.evicted_turns, 0);
    assert_eq!(ctx.len(), 3);
    assert!(built.text.starts_with("User: u7\n"));
}

#[test]
fn test_unbounded_renders_all_turns() {
    let mut ctx = ContextManager::new(EvictionPolicy::Unbounded);
    for i in 0..50 {
        ctx.add_turn(format!("u{i}"), format!("a{i}"));
    }
    let built = ctx.build_prompt(&Words, "last");
    assert_eq!(built.text, render_prompt(&ctx.turns(), "last"));
    assert_eq!(ctx.len(), 50);
}

fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn text() -> impl Strategy<Value = String> {
    prop::collection::vec(word(), 1..6).prop_map(|w| w.join(" "))
}

proptest! {
    #[test]
    fn prop_paged_keeps_most_recent(
        max_turns in 1usize..6,
        turns in prop::collection::vec((text(), text()), 0..20),
    ) {
        let mut ctx = ContextManager::new(EvictionPolicy::Paged { max_turns, max_tokens: None });
        let mut added: Vec<Turn> = Vec::new();
        for (u, a) in turns {
            ctx.add_turn(u.clone(), a.clone());
            added.push(Turn::new(u, a));

            let expected = added[added.len().saturating_sub(max_turns)..].to_vec();
            prop_assert!(ctx.len() <= max_turns);
            prop_assert_eq!(ctx.turns(), expected);
        }
    }

    #[test]
    fn prop_sliding_fits_budget_when_dropping_suffices(
        max_tokens in 0usize..60,
        turns in prop::collection::vec((text(), text()), 0..12),
        new_user in text(),
    ) {
        let mut ctx = ContextManager::new(EvictionPolicy::SlidingWindow { max_tokens });
        let mut added: Vec<Turn> = Vec::new();
        for (u, a) in turns {
            ctx.add_turn(u.clone(), a.clone());
            added.push(Turn::new(u, a));
        }

        let built = ctx.build_prompt(&Words, &new_user);
        let bare = Words.token_count(&render_prompt(&Vec::<Turn>::new(), &new_user));

        if bare <= max_tokens {
            prop_assert!(!built.truncated);
            prop_assert!(Words.token_count(&built.text) <= max_tokens);
        } else {
            prop_assert!(built.truncated);
            prop_assert!(ctx.is_empty());
        }

        // Retained turns are always the newest ones, in order.
        let kept = ctx.turns();
        prop_assert_eq!(&kept[..], &added[added.len() - kept.len()..]);
        prop_assert_eq!(built.evicted_turns, added.len() - kept.len());
    }
}
