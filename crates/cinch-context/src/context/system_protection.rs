//! Decorator that shields system messages from the wrapped reducer.
//!
//! The inner reducer only ever sees the non-system messages. Its output is
//! appended after all system messages, so system messages that were
//! interleaved with the conversation end up at the front.

use super::{ChatHistoryReducer, ReduceFuture, partition_system};
use crate::Message;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Runs `inner` on the non-system messages and prepends the system ones.
#[derive(Debug, Clone)]
pub struct SystemMessageProtection<R> {
    inner: R,
}

impl<R: ChatHistoryReducer> SystemMessageProtection<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: ChatHistoryReducer> ChatHistoryReducer for SystemMessageProtection<R> {
    fn name(&self) -> &'static str {
        "system-protected"
    }

    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a> {
        Box::pin(async move {
            let (mut system, rest) = partition_system(messages);
            trace!(
                "Protecting {} system message(s), delegating {} to {}",
                system.len(),
                rest.len(),
                self.inner.name()
            );
            let reduced = self.inner.reduce(&rest, cancel).await?;
            system.extend(reduced);
            Ok(system)
        })
    }
}
