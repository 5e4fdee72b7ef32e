//! Summary calls shared by the model-backed reducers.
//!
//! Renders a span of messages into a transcript, sends it to the
//! [`CompletionExecutor`] with compression disabled, and turns the reply (or
//! the failure) into text. A failed call never aborts the reduction: it
//! becomes a visible `[Summary unavailable: ...]` note instead. Only
//! cancellation is surfaced as an error.

use crate::Message;
use crate::config::CompressionConfig;
use crate::error::ReduceError;
use crate::executor::{CompletionExecutor, ExecutionOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Prefix of the synthesized summary message.
pub const SUMMARY_PREFIX: &str = "[Conversation Summary]: ";

/// Render messages as `"{role}: {text}"` lines.
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for msg in messages {
        let text = msg.text().unwrap_or_default();
        out.push_str(&format!("{}: {text}\n", msg.role));
    }
    out
}

/// Text that stands in for a summary when the executor fails.
pub fn failure_text(error: &str) -> String {
    format!("[Summary unavailable: {error}]")
}

/// The system message that carries a summary into the reduced history.
pub fn summary_message(summary: &str) -> Message {
    Message::system(format!("{SUMMARY_PREFIX}{summary}"))
}

/// Options for a summary call under `config`.
pub fn summary_options(config: &CompressionConfig) -> ExecutionOptions {
    ExecutionOptions::summary(config.summary_model.clone(), config.summary_max_tokens)
}

/// Send `prompt` to the executor and return the summary text.
///
/// Executor failures are folded into [`failure_text`]. Returns
/// [`ReduceError::Cancelled`] if `cancel` fires before the call resolves, or
/// if the call fails after cancellation was requested.
pub async fn request_summary(
    executor: &dyn CompletionExecutor,
    prompt: &str,
    options: &ExecutionOptions,
    cancel: &CancellationToken,
) -> Result<String, ReduceError> {
    if cancel.is_cancelled() {
        return Err(ReduceError::Cancelled);
    }

    debug!(
        "Requesting summary: {} chars, skip_compression={}",
        prompt.len(),
        options.skip_compression
    );

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ReduceError::Cancelled),
        outcome = executor.execute(prompt, options, cancel) => outcome,
    };

    match outcome {
        Ok(summary) => Ok(summary.trim().to_string()),
        Err(_) if cancel.is_cancelled() => Err(ReduceError::Cancelled),
        Err(e) => {
            warn!("Summarization failed: {e}. Continuing with placeholder summary.");
            Ok(failure_text(&e))
        }
    }
}
