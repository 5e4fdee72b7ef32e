//! Pick a strategy from the current size of the history.
//!
//! Message count and estimated tokens are each compared against their
//! configured threshold:
//!
//! | Tier | Condition | Strategy |
//! |------|-----------|----------|
//! | `None` | neither metric exceeds its threshold | unchanged |
//! | `Heavy` | either metric exceeds 2x its threshold | [`SummarizingReducer`] |
//! | `Medium` | either metric exceeds its threshold | [`SummarizingReducer`] |
//! | `Light` | anything else that triggered | [`MessageCountingReducer`] |
//!
//! The trigger and the `Medium` condition coincide, so with the built-in
//! comparisons a triggered run is always `Medium` or `Heavy`. `Light` stays
//! as the fallback tier.

use super::budget::{CharRatioEstimator, TokenEstimator};
use super::counting::MessageCountingReducer;
use super::summarizing::SummarizingReducer;
use super::{ChatHistoryReducer, ReduceFuture};
use crate::Message;
use crate::config::CompressionConfig;
use crate::executor::CompletionExecutor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How aggressively to compress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompressionTier {
    None,
    Light,
    Medium,
    Heavy,
}

/// Dispatches to counting or summarization depending on size.
pub struct AdaptiveReducer {
    config: Arc<CompressionConfig>,
    estimator: Arc<dyn TokenEstimator>,
    light: MessageCountingReducer,
    summarizing: SummarizingReducer,
}

impl AdaptiveReducer {
    pub fn new(config: Arc<CompressionConfig>, executor: Arc<dyn CompletionExecutor>) -> Self {
        Self {
            light: MessageCountingReducer::new(config.message_count_threshold),
            summarizing: SummarizingReducer::new(config.clone(), executor),
            estimator: Arc::new(CharRatioEstimator::default()),
            config,
        }
    }

    /// Replace the token estimator.
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Decide the tier for `messages`.
    pub fn assess(&self, messages: &[Message]) -> CompressionTier {
        let count = messages.len();
        let tokens = self.estimator.estimate(messages);
        let count_limit = self.config.message_count_threshold;
        let token_limit = self.config.token_count_threshold;

        if count <= count_limit && tokens <= token_limit {
            return CompressionTier::None;
        }
        if count > count_limit.saturating_mul(2) || tokens > token_limit.saturating_mul(2) {
            CompressionTier::Heavy
        } else if count > count_limit || tokens > token_limit {
            CompressionTier::Medium
        } else {
            CompressionTier::Light
        }
    }
}

impl ChatHistoryReducer for AdaptiveReducer {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a> {
        Box::pin(async move {
            let tier = self.assess(messages);
            debug!("Adaptive: {} messages -> tier {:?}", messages.len(), tier);
            match tier {
                CompressionTier::None => Ok(messages.to_vec()),
                CompressionTier::Light => self.light.reduce(messages, cancel).await,
                CompressionTier::Medium | CompressionTier::Heavy => {
                    self.summarizing.reduce(messages, cancel).await
                }
            }
        })
    }
}
