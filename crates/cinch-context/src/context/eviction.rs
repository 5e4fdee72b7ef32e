//! Tool result eviction: replace bulky old tool results with placeholders.
//!
//! Tool results are the single largest context consumer in any agent loop.
//! A `read_file` can inject 30KB; a `grep` can return hundreds of lines.
//! Most of it is irrelevant once the model has acted on it. Clearing old
//! payloads frees context without any model call, and the placeholder keeps
//! the call id so the call/result pairing stays intact.

use super::truncate_chars;
use crate::{ContentBlock, Message};

/// Prefix used for evicted tool result placeholders.
///
/// Both the placeholder writer and the "already evicted?" check reference
/// this constant so they can't drift out of sync.
pub const EVICTED_PREFIX: &str = "[Cleared:";

/// Results longer than this (in characters) are eligible for eviction.
pub const MAX_RESULT_CHARS: usize = 200;

/// Number of trailing messages whose results are never evicted.
pub const PROTECTED_TAIL: usize = 6;

/// Placeholder text for a cleared result of `char_count` characters.
pub fn placeholder(call_id: &str, char_count: usize) -> String {
    format!("{EVICTED_PREFIX} tool result for {call_id} ({char_count} chars) removed to save context]")
}

/// Copy `messages`, replacing every function result longer than
/// `max_chars` outside the last `protected_tail` messages with a
/// placeholder for the same call id.
///
/// Message count and order are unchanged. Returns the new messages and the
/// number of results cleared.
pub fn evict_large_results(
    messages: &[Message],
    protected_tail: usize,
    max_chars: usize,
) -> (Vec<Message>, usize) {
    let cutoff = messages.len().saturating_sub(protected_tail);
    let mut cleared = 0;

    let out = messages
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            if i >= cutoff {
                return msg.clone();
            }
            let mut msg = msg.clone();
            for block in &mut msg.content {
                if let ContentBlock::FunctionResult { call_id, result } = block {
                    let char_count = result.chars().count();
                    if char_count > max_chars && !result.starts_with(EVICTED_PREFIX) {
                        *result = placeholder(call_id, char_count);
                        cleared += 1;
                    }
                }
            }
            msg
        })
        .collect();

    (out, cleared)
}

/// Extract a short argument summary from raw JSON arguments.
///
/// Objects render as `key="value", ...` (first three keys); anything else
/// falls back to the raw string. Both are capped at `max_len` characters.
pub fn summarize_args(arguments: &str, max_len: usize) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(arguments)
        && let Some(obj) = v.as_object()
    {
        let parts: Vec<String> = obj
            .iter()
            .take(3)
            .map(|(k, v)| {
                let val = match v {
                    serde_json::Value::String(s) => format!("\"{}\"", truncate_chars(s, 40)),
                    other => truncate_chars(&other.to_string(), 40),
                };
                format!("{k}={val}")
            })
            .collect();
        return truncate_chars(&parts.join(", "), max_len);
    }

    truncate_chars(arguments.trim(), max_len)
}
