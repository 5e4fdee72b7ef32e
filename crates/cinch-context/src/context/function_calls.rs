//! Keep the neighbourhood of tool activity.
//!
//! Every message carrying a function call or result is kept together with
//! up to [`CONTEXT_RADIUS`] messages on each side, so the model still sees
//! why a tool was called and what it did with the answer. System messages
//! and the last [`RECENT_FLOOR`] messages are always kept.
//!
//! This is best-effort windowing: a call whose result falls outside every
//! window can still lose its partner. Wrap the reducer in
//! [`OrphanSanitizing`](super::sanitize::OrphanSanitizing) when pairing
//! matters.

use super::{ChatHistoryReducer, ReduceFuture};
use crate::Message;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Messages kept on each side of a tool message.
pub const CONTEXT_RADIUS: usize = 2;

/// Trailing messages kept regardless of tool activity.
pub const RECENT_FLOOR: usize = 5;

/// Tool-context-preserving reducer.
#[derive(Debug, Clone)]
pub struct FunctionCallPreservationReducer {
    threshold: usize,
}

impl FunctionCallPreservationReducer {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Indices that survive reduction.
    pub fn protected_indices(messages: &[Message]) -> HashSet<usize> {
        let len = messages.len();
        let mut keep = HashSet::new();

        for (i, msg) in messages.iter().enumerate() {
            if msg.is_system() {
                keep.insert(i);
            }
            if msg.has_function_content() {
                let start = i.saturating_sub(CONTEXT_RADIUS);
                let end = (i + CONTEXT_RADIUS).min(len.saturating_sub(1));
                keep.extend(start..=end);
            }
        }
        keep.extend(len.saturating_sub(RECENT_FLOOR)..len);
        keep
    }

    /// Synchronous core of [`ChatHistoryReducer::reduce`].
    pub fn apply(&self, messages: &[Message]) -> Vec<Message> {
        if messages.len() <= self.threshold {
            return messages.to_vec();
        }

        let keep = Self::protected_indices(messages);
        debug!(
            "Function-call preservation: {} -> {} messages",
            messages.len(),
            keep.len()
        );

        messages
            .iter()
            .enumerate()
            .filter(|(i, _)| keep.contains(i))
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl ChatHistoryReducer for FunctionCallPreservationReducer {
    fn name(&self) -> &'static str {
        "function-call-preservation"
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
