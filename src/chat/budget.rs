//! Token-budget truncation of conversation history
//!
//! Token counts are a length heuristic (one token per four characters of
//! message content), not a tokenizer. Role labels and message envelopes are
//! not counted.

use super::Message;

/// Estimated-token threshold above which history is truncated
pub const DEFAULT_TOKEN_THRESHOLD: usize = 3000;

/// Number of trailing messages kept when truncation triggers
pub const DEFAULT_KEEP_MESSAGES: usize = 3;

/// Estimate tokens for a piece of text: `floor(chars / 4)`
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Sum of [`estimate_tokens`] over every message's content
#[must_use]
pub fn count_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

/// Decides whether a history must shrink before it is sent upstream
pub trait BudgetPolicy: Send + Sync {
    /// Return the replacement history, or `None` to keep it unchanged
    ///
    /// Implementations may only drop a prefix; surviving messages keep their
    /// order and content.
    fn truncate(&self, history: &[Message]) -> Option<Vec<Message>>;
}

/// Hard cut to the last `keep` messages once the estimate exceeds `max_tokens`
///
/// The result can still be over budget when the kept messages are large.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncateToTail {
    pub max_tokens: usize,
    pub keep: usize,
}

impl Default for TruncateToTail {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_TOKEN_THRESHOLD,
            keep: DEFAULT_KEEP_MESSAGES,
        }
    }
}

impl TruncateToTail {
    #[must_use]
    pub const fn new(max_tokens: usize, keep: usize) -> Self {
        Self { max_tokens, keep }
    }

    /// Check whether a history is over budget
    #[must_use]
    pub fn needs_truncation(&self, history: &[Message]) -> bool {
        count_tokens(history) > self.max_tokens
    }
}

impl BudgetPolicy for TruncateToTail {
    fn truncate(&self, history: &[Message]) -> Option<Vec<Message>> {
        if !self.needs_truncation(history) {
            return None;
        }

        let start = history.len().saturating_sub(self.keep);
        Some(history[start..].to_vec())
    }
}
