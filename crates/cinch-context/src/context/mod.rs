//! Context reduction: strategies that shorten a conversation before it is
//! sent to a model.
//!
//! Every strategy implements [`ChatHistoryReducer`]. They fall into three
//! groups:
//!
//! 1. **Deterministic.** [`counting`], [`keyword`] and [`function_calls`]
//!    drop messages by position, content or tool activity. No model call.
//!
//! 2. **Model-backed.** [`summarizing`] and [`layered`] replace old
//!    messages with a summary produced by a
//!    [`CompletionExecutor`](crate::executor::CompletionExecutor).
//!
//! 3. **Ratio-driven.** [`three_zone`] looks at estimated usage against the
//!    context length. Between 65% and 80% it only clears bulky tool results
//!    ([`eviction`]); above 80% it pins the original task, summarizes the
//!    middle and keeps a boundary-safe tail, then repairs any orphaned tool
//!    blocks ([`sanitize`]).
//!
//! [`system_protection`], [`sanitize::OrphanSanitizing`] and
//! [`monitor::MonitoredReducer`] are decorators over any other reducer.
//! [`adaptive`] picks a strategy from the current size, and [`factory`] maps
//! configuration keys to instances.

pub mod adaptive;
pub mod budget;
pub mod counting;
pub mod eviction;
pub mod factory;
pub mod function_calls;
pub mod keyword;
pub mod layered;
pub mod monitor;
pub mod sanitize;
pub mod summarizer;
pub mod summarizing;
pub mod system_protection;
pub mod three_zone;

pub use budget::{CharRatioEstimator, ContextUsage, DEFAULT_CHARS_PER_TOKEN, TokenEstimator};
pub use factory::{ReducerFactory, ReducerKind};

use crate::Message;
use crate::error::ReduceError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by [`ChatHistoryReducer::reduce`].
pub type ReduceFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Message>, ReduceError>> + Send + 'a>>;

/// A strategy that turns a message sequence into a shorter one.
///
/// Reducers borrow their input and return a newly built sequence. When the
/// strategy's trigger is not met, the result equals the input.
///
/// Uses a boxed future so that the trait is dyn-compatible and decorators
/// can wrap `Box<dyn ChatHistoryReducer>`.
pub trait ChatHistoryReducer: Send + Sync {
    /// Short, stable name for logs.
    fn name(&self) -> &'static str;

    /// Reduce `messages`. `cancel` aborts a pending summary call.
    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a>;
}

impl<R: ChatHistoryReducer + ?Sized> ChatHistoryReducer for Box<R> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a> {
        (**self).reduce(messages, cancel)
    }
}

impl<R: ChatHistoryReducer + ?Sized> ChatHistoryReducer for Arc<R> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a> {
        (**self).reduce(messages, cancel)
    }
}

/// Split into (system, non-system), each in original relative order.
pub(crate) fn partition_system(messages: &[Message]) -> (Vec<Message>, Vec<Message>) {
    messages.iter().cloned().partition(Message::is_system)
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut out = text.get(..byte_idx).unwrap_or(text).to_string();
            out.push_str("...");
            out
        }
        None => text.to_string(),
    }
}
