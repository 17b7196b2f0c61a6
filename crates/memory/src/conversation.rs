//! Conversation log: the chronological record of one session.
//!
//! Append-only from the caller's point of view; once the log exceeds its
//! cap the oldest turns are evicted two at a time so whole user/assistant
//! pairs leave together.

use recallchat_core::message::{Role, Turn};
use std::collections::VecDeque;

/// Ordered turns of one session, bounded by `max_turns`.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationLog {
    /// Create an empty log holding at most `max_turns` turns
    /// (`usize::MAX` for unbounded).
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: max_turns.max(2),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Add a turn at the end. Role alternation is not enforced.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        self.evict();
    }

    /// Append a user turn immediately followed by its assistant reply.
    pub fn append_exchange(&mut self, user: Turn, assistant: Turn) {
        self.turns.push_back(user);
        self.turns.push_back(assistant);
        self.evict();
    }

    /// The last `max_pairs * 2` turns in chronological order (fewer if the
    /// log is shorter).
    pub fn recent_window(&self, max_pairs: usize) -> Vec<Turn> {
        let take = max_pairs.saturating_mul(2).min(self.turns.len());
        self.turns
            .iter()
            .skip(self.turns.len() - take)
            .cloned()
            .collect()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn evict(&mut self) {
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
            let orphan_reply = self.turns.front().map(|t| t.role) == Some(Role::Assistant);
            if self.turns.len() > self.max_turns || orphan_reply {
                self.turns.pop_front();
            }
        }
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// The newest user turn in `window`, if any.
pub fn last_user_turn(window: &[Turn]) -> Option<&Turn> {
    window.iter().rev().find(|t| t.is_user())
}

/// Text of the newest user turn in `window`, if any.
pub fn last_user_message(window: &[Turn]) -> Option<&str> {
    last_user_turn(window).map(|t| t.text.as_str())
}
