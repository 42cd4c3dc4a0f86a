//! Conversation turns and the ordered ledger that holds them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One completed user/assistant exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Chronological record of turns: appended at the tail, evicted from the head.
#[derive(Debug, Clone, Default)]
pub struct TurnLedger {
    turns: VecDeque<Turn>,
}

impl TurnLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
    }

    /// Drop the oldest turn.
    pub fn pop_oldest(&mut self) -> Option<Turn> {
        self.turns.pop_front()
    }

    /// Drop oldest turns until at most `len` remain. Returns how many were dropped.
    pub fn truncate_front(&mut self, len: usize) -> usize {
        let excess = self.turns.len().saturating_sub(len);
        self.turns.drain(..excess);
        excess
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Copy of the retained turns, oldest first.
    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a TurnLedger {
    type Item = &'a Turn;
    type IntoIter = std::collections::vec_deque::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_order() {
        let mut ledger = TurnLedger::new();
        ledger.push(Turn::new("a", "1"));
        ledger.push(Turn::new("b", "2"));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.to_vec(), vec![Turn::new("a", "1"), Turn::new("b", "2")]);
    }

    #[test]
    fn test_pop_oldest() {
        let mut ledger = TurnLedger::new();
        assert!(ledger.pop_oldest().is_none());
        ledger.push(Turn::new("a", "1"));
        ledger.push(Turn::new("b", "2"));
        assert_eq!(ledger.pop_oldest(), Some(Turn::new("a", "1")));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_truncate_front() {
        let mut ledger = TurnLedger::new();
        for i in 0..5 {
            ledger.push(Turn::new(format!("u{i}"), format!("a{i}")));
        }
        assert_eq!(ledger.truncate_front(2), 3);
        assert_eq!(ledger.to_vec(), vec![Turn::new("u3", "a3"), Turn::new("u4", "a4")]);
        assert_eq!(ledger.truncate_front(10), 0);
    }
}
