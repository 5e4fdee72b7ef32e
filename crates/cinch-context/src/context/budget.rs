//! Token estimation and context usage.
//!
//! Reducers never count tokens exactly. They ask a [`TokenEstimator`], which
//! defaults to a character-ratio proxy: message text plus function result
//! payloads, divided by [`DEFAULT_CHARS_PER_TOKEN`]. Deployments that have a
//! real tokenizer plug it in through the same trait (closures work too)
//! without touching strategy code.

use crate::Message;

/// Default characters per token. Deliberately coarse.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 2.0;

/// Estimates the token footprint of a message sequence.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, messages: &[Message]) -> usize;
}

impl<F> TokenEstimator for F
where
    F: Fn(&[Message]) -> usize + Send + Sync,
{
    fn estimate(&self, messages: &[Message]) -> usize {
        self(messages)
    }
}

/// Character-count proxy: `(text chars + result chars) / chars_per_token`.
///
/// Function call arguments are not counted.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: f64,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: f64) -> Self {
        Self { chars_per_token }
    }

    /// Total characters the proxy counts for `messages`.
    pub fn counted_chars(messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| m.text_chars() + m.result_chars())
            .sum()
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, messages: &[Message]) -> usize {
        if self.chars_per_token <= 0.0 {
            return Self::counted_chars(messages);
        }
        (Self::counted_chars(messages) as f64 / self.chars_per_token) as usize
    }
}

/// Snapshot of context usage against a context length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextUsage {
    /// Estimated tokens consumed.
    pub estimated_tokens: usize,
    /// Context length the estimate is measured against.
    pub max_tokens: usize,
    /// Usage as a fraction (0.0 to 1.0+).
    pub usage_pct: f64,
}

impl ContextUsage {
    /// Measure `messages` against `max_tokens`. A zero budget counts as full.
    pub fn measure(estimator: &dyn TokenEstimator, messages: &[Message], max_tokens: usize) -> Self {
        let estimated_tokens = estimator.estimate(messages);
        let usage_pct = if max_tokens > 0 {
            estimated_tokens as f64 / max_tokens as f64
        } else {
            1.0
        };
        Self {
            estimated_tokens,
            max_tokens,
            usage_pct,
        }
    }

    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "context: ~{} tokens ({:.0}% of {})",
            self.estimated_tokens,
            self.usage_pct * 100.0,
            self.max_tokens,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_text_and_results() {
        let messages = vec![
            Message::user("a".repeat(10)),
            Message::tool_call("c1", "read_file", r#"{"path": "ignored.rs"}"#),
            Message::tool_result("c1", "b".repeat(30)),
        ];
        assert_eq!(CharRatioEstimator::counted_chars(&messages), 40);
        assert_eq!(CharRatioEstimator::default().estimate(&messages), 20);
    }

    #[test]
    fn empty_history_is_zero() {
        assert_eq!(CharRatioEstimator::default().estimate(&[]), 0);
    }

    #[test]
    fn custom_ratio() {
        let messages = vec![Message::user("a".repeat(40))];
        assert_eq!(CharRatioEstimator::new(4.0).estimate(&messages), 10);
    }

    #[test]
    fn closure_is_an_estimator() {
        let per_message = |messages: &[Message]| messages.len() * 100;
        let messages = vec![Message::user("x"), Message::assistant("y")];
        assert_eq!(per_message.estimate(&messages), 200);
    }

    #[test]
    fn usage_against_budget() {
        let messages = vec![Message::user("a".repeat(1_600))];
        let usage = ContextUsage::measure(&CharRatioEstimator::default(), &messages, 1_000);
        assert_eq!(usage.estimated_tokens, 800);
        assert!((usage.usage_pct - 0.8).abs() < f64::EPSILON);
        assert!(usage.to_log_string().contains("80% of 1000"));
    }

    #[test]
    fn zero_budget_counts_as_full() {
        let usage = ContextUsage::measure(&CharRatioEstimator::default(), &[], 0);
        assert!((usage.usage_pct - 1.0).abs() < f64::EPSILON);
    }
}
