//! Three-zone compression driven by context usage.
//!
//! Usage is the estimated token count divided by the context length:
//!
//! - **Below 65%** nothing happens.
//! - **65% to 80%** is pre-compression: bulky tool results outside the last
//!   six messages are cleared ([`eviction`](super::eviction)). No model call,
//!   no message removed.
//! - **80% and above** rebuilds the history as three zones:
//!   1. **Zone A**: the original task, i.e. the first user message with real
//!      text. Pinned together with any earlier system messages, except the
//!      summaries left by earlier compressions, which fold into the next one.
//!   2. **Compressed middle**: everything between Zone A and Zone B, folded
//!      into one summary message.
//!   3. **Zone B**: the recent tail, `clamp(n / 5, 4, 10)` messages, moved
//!      back until no tool result in it has lost its call.
//!
//!   The assembled history then goes through
//!   [`sanitize_orphans`](super::sanitize::sanitize_orphans) as a backstop for
//!   whatever the boundary repair could not fix.

use super::budget::{CharRatioEstimator, ContextUsage, TokenEstimator};
use super::eviction::{MAX_RESULT_CHARS, PROTECTED_TAIL, evict_large_results, summarize_args};
use super::sanitize::sanitize_orphans;
use super::summarizer::{request_summary, summary_options};
use super::{ChatHistoryReducer, ReduceFuture, truncate_chars};
use crate::config::CompressionConfig;
use crate::error::ReduceError;
use crate::executor::CompletionExecutor;
use crate::{ContentBlock, Message, MessageRole};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Context length used when no token threshold is configured.
pub const DEFAULT_CONTEXT_LENGTH: usize = 128_000;

/// Usage at which large tool results start being cleared.
pub const PRE_COMPRESSION_RATIO: f64 = 0.65;

/// Usage at which the middle of the conversation is summarized.
pub const FULL_COMPRESSION_RATIO: f64 = 0.80;

/// Prefix of the summary message a full compression inserts.
pub const COMPRESSED_PREFIX: &str = "[Compressed ";

const MIN_PRESERVE: usize = 4;
const MAX_PRESERVE: usize = 10;
const MAX_REPAIR_ITERATIONS: usize = 10;
const REPAIR_STEP: usize = 2;
const REGION_TEXT_CHARS: usize = 800;
const REGION_RESULT_CHARS: usize = 500;

const COMPRESSION_PROMPT: &str = "\
Compress the following earlier part of a conversation into a dense summary \
that lets the assistant continue the task without it. Preserve:
- key decisions and the reasons for them
- file paths, function names and other identifiers, verbatim
- every tool call and its outcome (what was called, what it returned)
- open problems and the next steps that were planned

Only include facts stated in the messages.

";

/// What a reduction did, as decided from usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionStage {
    Untouched,
    PreCompression,
    Full,
}

/// Zone boundaries for a full compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonePlan {
    /// Index of the pinned task message, if any.
    pub zone_a: Option<usize>,
    /// First index of the preserved tail before boundary repair.
    pub naive_zone_b_start: usize,
    /// First index of the preserved tail after boundary repair.
    pub zone_b_start: usize,
    /// Number of times the boundary moved back.
    pub repair_iterations: usize,
}

/// Size of the preserved tail for a history of `total` messages.
pub fn preserve_count(total: usize) -> usize {
    (total / 5).clamp(MIN_PRESERVE, MAX_PRESERVE)
}

/// Index of the original task: the first user message that has a text
/// block and is not made solely of function results.
pub fn find_task_message(messages: &[Message]) -> Option<usize> {
    messages.iter().position(|m| {
        m.role == MessageRole::User && m.has_text_block() && !m.only_function_results()
    })
}

/// Whether `tail` holds a function result whose call is not also in `tail`.
fn has_orphaned_result(tail: &[Message]) -> bool {
    let calls: HashSet<&str> = tail.iter().flat_map(Message::call_ids).collect();
    tail.iter()
        .flat_map(Message::result_ids)
        .any(|id| !calls.contains(id))
}

/// Plan the zones for `messages`. `None` when the history is too short to
/// have a middle worth compressing.
pub fn plan_zones(messages: &[Message]) -> Option<ZonePlan> {
    let total = messages.len();
    let preserve = preserve_count(total);
    if total <= preserve + 2 {
        return None;
    }

    let naive = total - preserve;
    let zone_a = find_task_message(messages).filter(|&i| i < naive);
    let floor = zone_a.map_or(0, |i| i + 1);

    let mut start = naive.max(floor);
    let mut repair_iterations = 0;
    while repair_iterations < MAX_REPAIR_ITERATIONS && start > floor {
        if !has_orphaned_result(&messages[start..]) {
            break;
        }
        start = start.saturating_sub(REPAIR_STEP).max(floor);
        repair_iterations += 1;
    }

    if repair_iterations > 0 {
        debug!("Zone B boundary moved from {naive} to {start} after {repair_iterations} repair(s)");
    }

    Some(ZonePlan {
        zone_a,
        naive_zone_b_start: naive,
        zone_b_start: start,
        repair_iterations,
    })
}

/// Whether `msg` is the summary left by an earlier full compression.
fn is_compression_summary(msg: &Message) -> bool {
    msg.is_system()
        && msg
            .text()
            .is_some_and(|text| text.starts_with(COMPRESSED_PREFIX))
}

/// Render the compression region for the summary prompt.
fn serialize_region(region: &[Message]) -> String {
    let mut out = String::new();
    for msg in region {
        let role = msg.role;
        if let Some(text) = msg.text() {
            out.push_str(&format!("[{role}]: {}\n", truncate_chars(&text, REGION_TEXT_CHARS)));
        }
        for block in &msg.content {
            match block {
                ContentBlock::FunctionCall {
                    name, arguments, ..
                } => {
                    out.push_str(&format!(
                        "[{role}]: called {name}({})\n",
                        summarize_args(arguments, 120)
                    ));
                }
                ContentBlock::FunctionResult { call_id, result } => {
                    out.push_str(&format!(
                        "[{role}]: result of {call_id}: {}\n",
                        truncate_chars(result, REGION_RESULT_CHARS)
                    ));
                }
                ContentBlock::Text { .. } => {}
            }
        }
    }
    out
}

/// Ratio-triggered tiered compressor.
pub struct ThreeZoneReducer {
    config: Arc<CompressionConfig>,
    executor: Arc<dyn CompletionExecutor>,
    estimator: Arc<dyn TokenEstimator>,
}

impl ThreeZoneReducer {
    pub fn new(config: Arc<CompressionConfig>, executor: Arc<dyn CompletionExecutor>) -> Self {
        Self {
            config,
            executor,
            estimator: Arc::new(CharRatioEstimator::default()),
        }
    }

    /// Replace the token estimator.
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Context length usage is measured against.
    pub fn context_length(&self) -> usize {
        match self.config.token_count_threshold {
            0 => DEFAULT_CONTEXT_LENGTH,
            n => n,
        }
    }

    /// Measure usage and pick the stage.
    pub fn assess(&self, messages: &[Message]) -> (CompressionStage, ContextUsage) {
        let usage = ContextUsage::measure(self.estimator.as_ref(), messages, self.context_length());
        let stage = if usage.usage_pct >= FULL_COMPRESSION_RATIO {
            CompressionStage::Full
        } else if usage.usage_pct >= PRE_COMPRESSION_RATIO {
            CompressionStage::PreCompression
        } else {
            CompressionStage::Untouched
        };
        (stage, usage)
    }

    async fn compress(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, ReduceError> {
        let Some(plan) = plan_zones(messages) else {
            debug!("Three-zone: {} messages, too short to compress", messages.len());
            return Ok(messages.to_vec());
        };

        let (head, zone_b) = messages.split_at(plan.zone_b_start);
        let mut pinned = Vec::new();
        let mut region = Vec::new();
        for (i, msg) in head.iter().enumerate() {
            if plan.zone_a == Some(i) || (msg.is_system() && !is_compression_summary(msg)) {
                pinned.push(msg.clone());
            } else {
                region.push(msg.clone());
            }
        }
        if region.is_empty() {
            return Ok(messages.to_vec());
        }

        let prompt = format!("{COMPRESSION_PROMPT}{}", serialize_region(&region));
        let options = summary_options(&self.config);
        let summary = request_summary(self.executor.as_ref(), &prompt, &options, cancel).await?;

        info!(
            "Three-zone: compressed {} messages (pinned {}, tail {} from index {})",
            region.len(),
            pinned.len(),
            zone_b.len(),
            plan.zone_b_start
        );

        let mut assembled = pinned;
        assembled.push(Message::system(format!(
            "{COMPRESSED_PREFIX}{} earlier messages]\n{summary}",
            region.len()
        )));
        assembled.extend_from_slice(zone_b);
        Ok(sanitize_orphans(&assembled))
    }
}

impl ChatHistoryReducer for ThreeZoneReducer {
    fn name(&self) -> &'static str {
        "three-zone"
    }

    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a> {
        Box::pin(async move {
            let (stage, usage) = self.assess(messages);
            debug!("Three-zone: {} -> {:?}", usage.to_log_string(), stage);
            match stage {
                CompressionStage::Untouched => Ok(messages.to_vec()),
                CompressionStage::PreCompression => {
                    let (out, cleared) =
                        evict_large_results(messages, PROTECTED_TAIL, MAX_RESULT_CHARS);
                    debug!("Three-zone pre-compression cleared {cleared} tool result(s)");
                    Ok(out)
                }
                CompressionStage::Full => self.compress(messages, cancel).await,
            }
        })
    }
}
