//! Summarize plain chatter, keep tool activity verbatim.
//!
//! Above [`LAYERED_ACTIVATION`] messages the history is split into layers:
//! the last [`RECENT_WINDOW`] messages stay as they are, earlier system
//! messages are pinned, earlier tool-bearing messages are kept verbatim and
//! the remaining plain messages are folded into one summary.

use super::summarizer::{render_transcript, request_summary, summary_message, summary_options};
use super::{ChatHistoryReducer, ReduceFuture};
use crate::Message;
use crate::config::CompressionConfig;
use crate::executor::CompletionExecutor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Histories at or below this length are returned unchanged.
pub const LAYERED_ACTIVATION: usize = 15;

/// Trailing messages always kept verbatim.
pub const RECENT_WINDOW: usize = 5;

/// Summarization combined with function-call protection.
pub struct LayeredReducer {
    config: Arc<CompressionConfig>,
    executor: Arc<dyn CompletionExecutor>,
}

impl LayeredReducer {
    pub fn new(config: Arc<CompressionConfig>, executor: Arc<dyn CompletionExecutor>) -> Self {
        Self { config, executor }
    }
}

impl ChatHistoryReducer for LayeredReducer {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a> {
        Box::pin(async move {
            if messages.len() <= LAYERED_ACTIVATION {
                return Ok(messages.to_vec());
            }

            let (older, recent) = messages.split_at(messages.len() - RECENT_WINDOW);
            let mut system = Vec::new();
            let mut function_bearing = Vec::new();
            let mut plain = Vec::new();
            for msg in older {
                if msg.is_system() {
                    system.push(msg.clone());
                } else if msg.has_function_content() {
                    function_bearing.push(msg.clone());
                } else {
                    plain.push(msg.clone());
                }
            }

            debug!(
                "Layered: {} system, {} tool-bearing kept, {} plain to summarize, {} recent",
                system.len(),
                function_bearing.len(),
                plain.len(),
                recent.len()
            );

            let mut out = system;
            if !plain.is_empty() {
                let prompt = format!(
                    "{}{}",
                    self.config.summary_prompt_template,
                    render_transcript(&plain)
                );
                let options = summary_options(&self.config);
                let summary =
                    request_summary(self.executor.as_ref(), &prompt, &options, cancel).await?;
                out.push(summary_message(&summary));
            }
            out.extend(function_bearing);
            out.extend_from_slice(recent);
            Ok(out)
        })
    }
}
