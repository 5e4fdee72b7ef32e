//! Replace older messages with a model-written summary.
//!
//! Once the history reaches the message threshold, everything except the
//! system messages and the most recent `max(2, threshold / 3)` messages is
//! summarized in one call. The summary comes back as a single system message
//! placed right after the original system messages.

use super::summarizer::{render_transcript, request_summary, summary_message, summary_options};
use super::{ChatHistoryReducer, ReduceFuture, partition_system};
use crate::Message;
use crate::config::CompressionConfig;
use crate::executor::CompletionExecutor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Minimum number of recent messages kept verbatim.
const MIN_KEEP_RECENT: usize = 2;

/// Summary-based reducer.
pub struct SummarizingReducer {
    config: Arc<CompressionConfig>,
    executor: Arc<dyn CompletionExecutor>,
}

impl SummarizingReducer {
    pub fn new(config: Arc<CompressionConfig>, executor: Arc<dyn CompletionExecutor>) -> Self {
        Self { config, executor }
    }

    /// Number of trailing non-system messages kept verbatim.
    pub fn keep_recent(&self) -> usize {
        (self.config.message_count_threshold / 3).max(MIN_KEEP_RECENT)
    }
}

impl ChatHistoryReducer for SummarizingReducer {
    fn name(&self) -> &'static str {
        "summarizing"
    }

    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a> {
        Box::pin(async move {
            if messages.len() < self.config.message_count_threshold {
                return Ok(messages.to_vec());
            }

            let (mut system, mut rest) = partition_system(messages);
            let split = rest.len().saturating_sub(self.keep_recent());
            if split == 0 {
                return Ok(messages.to_vec());
            }
            let to_keep = rest.split_off(split);

            debug!(
                "Summarizing {} message(s), keeping {} recent",
                rest.len(),
                to_keep.len()
            );

            let prompt = format!(
                "{}{}",
                self.config.summary_prompt_template,
                render_transcript(&rest)
            );
            let options = summary_options(&self.config);
            let summary = request_summary(self.executor.as_ref(), &prompt, &options, cancel).await?;

            system.push(summary_message(&summary));
            system.extend(to_keep);
            Ok(system)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{HangingExecutor, ScriptedExecutor, conversation, texts};
    use crate::error::ReduceError;

    fn reducer(threshold: usize, executor: Arc<dyn CompletionExecutor>) -> SummarizingReducer {
        let config = CompressionConfig::default()
            .with_message_threshold(threshold)
            .with_summary_prompt("SUMMARIZE:\n");
        SummarizingReducer::new(Arc::new(config), executor)
    }

    #[tokio::test]
    async fn below_threshold_is_identity_without_call() {
        let executor = Arc::new(ScriptedExecutor::replying("unused"));
        let messages = conversation(9);
        let reduced = reducer(10, executor.clone())
            .reduce(&messages, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reduced, messages);
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn summarizes_all_but_recent() {
        let executor = Arc::new(ScriptedExecutor::replying("talked about numbers"));
        let mut messages = vec![Message::system("sys")];
        messages.extend(conversation(12));

        let reduced = reducer(12, executor.clone())
            .reduce(&messages, &CancellationToken::new())
            .await
            .unwrap();

        // keep_recent = max(2, 12 / 3) = 4
        assert_eq!(
            texts(&reduced),
            vec![
                "sys",
                "[Conversation Summary]: talked about numbers",
                "message 8",
                "message 9",
                "message 10",
                "message 11"
            ]
        );

        let prompt = executor.last_prompt();
        assert!(prompt.starts_with("SUMMARIZE:\nuser: message 0\nassistant: message 1\n"));
        assert!(prompt.contains("assistant: message 7\n"));
        assert!(!prompt.contains("message 8"));
        assert!(!prompt.contains("sys"));
        assert!(executor.calls.lock().unwrap()[0].1.skip_compression);
    }

    #[tokio::test]
    async fn small_threshold_keeps_at_least_two() {
        let executor = Arc::new(ScriptedExecutor::replying("s"));
        let reduced = reducer(3, executor)
            .reduce(&conversation(6), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(texts(&reduced), vec!["[Conversation Summary]: s", "message 4", "message 5"]);
    }

    #[tokio::test]
    async fn executor_failure_yields_placeholder() {
        let executor = Arc::new(ScriptedExecutor::failing("503 Service Unavailable"));
        let reduced = reducer(6, executor)
            .reduce(&conversation(8), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reduced.len(), 3);
        assert!(
            reduced[0]
                .text()
                .unwrap()
                .contains("Summary unavailable: 503 Service Unavailable")
        );
    }

    #[tokio::test]
    async fn only_system_messages_to_summarize_is_identity() {
        let executor = Arc::new(ScriptedExecutor::replying("unused"));
        let mut messages: Vec<Message> = (0..6).map(|i| Message::system(format!("s{i}"))).collect();
        messages.extend(conversation(2));

        let reduced = reducer(6, executor.clone())
            .reduce(&messages, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reduced, messages);
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_surfaces_as_error() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = reducer(4, Arc::new(HangingExecutor))
            .reduce(&conversation(10), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, ReduceError::Cancelled);
    }
}
