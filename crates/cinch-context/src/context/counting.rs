//! Keep the last N messages.
//!
//! System messages always survive and move to the front; the remaining
//! slots go to the most recent non-system messages.

use super::{ChatHistoryReducer, ReduceFuture, partition_system};
use crate::Message;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Count-bounded reducer.
#[derive(Debug, Clone)]
pub struct MessageCountingReducer {
    threshold: usize,
}

impl MessageCountingReducer {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Synchronous core of [`ChatHistoryReducer::reduce`].
    pub fn apply(&self, messages: &[Message]) -> Vec<Message> {
        if messages.len() <= self.threshold {
            return messages.to_vec();
        }

        let (mut system, rest) = partition_system(messages);
        let slots = self.threshold.saturating_sub(system.len());
        let skip = rest.len().saturating_sub(slots);

        debug!(
            "Message counting: {} -> {} messages ({} system, {} recent)",
            messages.len(),
            system.len() + rest.len() - skip,
            system.len(),
            rest.len() - skip,
        );

        system.extend(rest.into_iter().skip(skip));
        system
    }
}

impl ChatHistoryReducer for MessageCountingReducer {
    fn name(&self) -> &'static str {
        "message-counting"
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
