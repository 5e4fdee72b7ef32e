//! Keep messages that mention critical keywords.
//!
//! Messages whose text contains a configured keyword (case-insensitive
//! substring) are never evicted. The remaining budget goes to the most
//! recent ordinary messages, and the result keeps the original order.

use super::{ChatHistoryReducer, ReduceFuture};
use crate::Message;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Keyword-protecting reducer.
#[derive(Debug, Clone)]
pub struct KeywordAwareReducer {
    threshold: usize,
    /// Lower-cased, non-empty keywords.
    keywords: Vec<String>,
}

impl KeywordAwareReducer {
    pub fn new(threshold: usize, keywords: &[String]) -> Self {
        let keywords = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            threshold,
            keywords,
        }
    }

    /// Whether `msg` mentions any configured keyword.
    pub fn is_critical(&self, msg: &Message) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let Some(text) = msg.text() else {
            return false;
        };
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// Synchronous core of [`ChatHistoryReducer::reduce`].
    pub fn apply(&self, messages: &[Message]) -> Vec<Message> {
        if messages.len() <= self.threshold {
            return messages.to_vec();
        }

        let mut keep: HashSet<usize> = HashSet::new();
        let mut normal: Vec<usize> = Vec::new();
        for (i, msg) in messages.iter().enumerate() {
            if msg.is_system() || self.is_critical(msg) {
                keep.insert(i);
            } else {
                normal.push(i);
            }
        }

        let slots = self.threshold.saturating_sub(keep.len());
        let critical = keep.len();
        keep.extend(normal.iter().rev().take(slots));

        debug!(
            "Keyword-aware: {} -> {} messages ({} protected)",
            messages.len(),
            keep.len(),
            critical,
        );

        messages
            .iter()
            .enumerate()
            .filter(|(i, _)| keep.contains(i))
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl ChatHistoryReducer for KeywordAwareReducer {
    fn name(&self) -> &'static str {
        "keyword-aware"
    }

    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        _cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a> {
        let reduced = self.apply(messages);
        Box::pin(async move { Ok(reduced) })
    }
}
