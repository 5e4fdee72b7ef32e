//! Orphan repair: no dangling tool references survive a reduction.
//!
//! A function call whose result was dropped (or a result whose call was
//! dropped) is rejected by most provider APIs. [`sanitize_orphans`] finds
//! call ids present on only one side and rewrites those blocks into plain
//! text that still tells the model what happened. [`sanitize_reduced`] does
//! the same but only for pairs that a reduction split.

use super::eviction::summarize_args;
use super::{ChatHistoryReducer, ReduceFuture, truncate_chars};
use crate::{ContentBlock, Message};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result text kept when an orphaned result is rewritten.
pub const ORPHAN_RESULT_CHARS: usize = 200;

/// Rewrite unmatched function call/result blocks into text blocks.
///
/// Paired blocks are untouched. Returns a new sequence of the same length.
pub fn sanitize_orphans(messages: &[Message]) -> Vec<Message> {
    rewrite_unmatched(messages, |_| true)
}

/// Repair only the pairs a reduction broke.
///
/// An id is rewritten in `reduced` when it was paired in `original` and has
/// lost its partner. Blocks that were already unmatched in `original`, such
/// as a call still waiting for its result, are left alone.
pub fn sanitize_reduced(original: &[Message], reduced: &[Message]) -> Vec<Message> {
    let calls: HashSet<&str> = original.iter().flat_map(Message::call_ids).collect();
    let paired: HashSet<&str> = original
        .iter()
        .flat_map(Message::result_ids)
        .filter(|id| calls.contains(id))
        .collect();
    rewrite_unmatched(reduced, |id| paired.contains(id))
}

fn rewrite_unmatched(messages: &[Message], eligible: impl Fn(&str) -> bool) -> Vec<Message> {
    let call_ids: HashSet<&str> = messages.iter().flat_map(Message::call_ids).collect();
    let result_ids: HashSet<&str> = messages.iter().flat_map(Message::result_ids).collect();

    if !call_ids
        .symmetric_difference(&result_ids)
        .any(|id| eligible(*id))
    {
        return messages.to_vec();
    }

    let mut rewritten = 0;
    let out = messages
        .iter()
        .map(|msg| {
            let content = msg
                .content
                .iter()
                .map(|block| match block {
                    ContentBlock::FunctionCall {
                        call_id,
                        name,
                        arguments,
                    } if !result_ids.contains(call_id.as_str()) && eligible(call_id.as_str()) => {
                        rewritten += 1;
                        ContentBlock::text(format!(
                            "[Historical tool call {call_id}: {name}({}) - result no longer in context]",
                            summarize_args(arguments, 120)
                        ))
                    }
                    ContentBlock::FunctionResult { call_id, result }
                        if !call_ids.contains(call_id.as_str()) && eligible(call_id.as_str()) =>
                    {
                        rewritten += 1;
                        ContentBlock::text(format!(
                            "[Historical tool result for {call_id}]: {}",
                            truncate_chars(result, ORPHAN_RESULT_CHARS)
                        ))
                    }
                    other => other.clone(),
                })
                .collect();
            Message {
                role: msg.role,
                content,
                author_name: msg.author_name.clone(),
            }
        })
        .collect();

    debug!("Rewrote {rewritten} orphaned tool block(s) as text");
    out
}

/// Decorator that runs [`sanitize_reduced`] on the inner reducer's output.
#[derive(Debug, Clone)]
pub struct OrphanSanitizing<R> {
    inner: R,
}

impl<R: ChatHistoryReducer> OrphanSanitizing<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: ChatHistoryReducer> ChatHistoryReducer for OrphanSanitizing<R> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a> {
        Box::pin(async move {
            let reduced = self.inner.reduce(messages, cancel).await?;
            Ok(sanitize_reduced(messages, &reduced))
        })
    }
}

/// Whether every call id has a matching result id and vice versa.
pub fn is_paired(messages: &[Message]) -> bool {
    let calls: HashSet<&str> = messages.iter().flat_map(Message::call_ids).collect();
    let results: HashSet<&str> = messages.iter().flat_map(Message::result_ids).collect();
    calls == results
}
