//! Effectiveness monitoring for reducers.
//!
//! [`MonitoredReducer`] wraps any reducer, measures the history before and
//! after each run and logs a [`CompressionReport`]. Cumulative counters are
//! atomics, so a single monitored reducer can serve many conversations at
//! once.

use super::budget::{CharRatioEstimator, TokenEstimator};
use super::{ChatHistoryReducer, ReduceFuture};
use crate::Message;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Before/after measurements of one reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionReport {
    pub strategy: &'static str,
    pub messages_before: usize,
    pub messages_after: usize,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub elapsed: Duration,
}

impl CompressionReport {
    /// Tokens after divided by tokens before (1.0 when nothing changed,
    /// lower is better).
    pub fn compression_ratio(&self) -> f64 {
        if self.tokens_before == 0 {
            return 1.0;
        }
        self.tokens_after as f64 / self.tokens_before as f64
    }

    pub fn tokens_saved(&self) -> usize {
        self.tokens_before.saturating_sub(self.tokens_after)
    }

    pub fn changed(&self) -> bool {
        self.messages_before != self.messages_after || self.tokens_before != self.tokens_after
    }

    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "{}: {} -> {} messages, ~{} -> ~{} tokens (ratio {:.2}) in {:.1}ms",
            self.strategy,
            self.messages_before,
            self.messages_after,
            self.tokens_before,
            self.tokens_after,
            self.compression_ratio(),
            self.elapsed.as_secs_f64() * 1000.0,
        )
    }
}

/// Cumulative totals across all runs of a monitored reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorStats {
    pub runs: u64,
    pub messages_removed: u64,
    pub tokens_saved: u64,
}

/// Decorator that measures and logs every reduction.
pub struct MonitoredReducer<R> {
    inner: R,
    estimator: Arc<dyn TokenEstimator>,
    runs: AtomicU64,
    messages_removed: AtomicU64,
    tokens_saved: AtomicU64,
}

impl<R: ChatHistoryReducer> MonitoredReducer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            estimator: Arc::new(CharRatioEstimator::default()),
            runs: AtomicU64::new(0),
            messages_removed: AtomicU64::new(0),
            tokens_saved: AtomicU64::new(0),
        }
    }

    /// Replace the token estimator used for the report.
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            runs: self.runs.load(Ordering::Relaxed),
            messages_removed: self.messages_removed.load(Ordering::Relaxed),
            tokens_saved: self.tokens_saved.load(Ordering::Relaxed),
        }
    }

    fn record(&self, report: &CompressionReport) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        let removed = report.messages_before.saturating_sub(report.messages_after);
        self.messages_removed
            .fetch_add(removed as u64, Ordering::Relaxed);
        self.tokens_saved
            .fetch_add(report.tokens_saved() as u64, Ordering::Relaxed);

        if report.changed() {
            info!("Context reduced: {}", report.to_log_string());
        } else {
            debug!("Context unchanged: {}", report.to_log_string());
        }
    }
}

impl<R: ChatHistoryReducer> ChatHistoryReducer for MonitoredReducer<R> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn reduce<'a>(
        &'a self,
        messages: &'a [Message],
        cancel: &'a CancellationToken,
    ) -> ReduceFuture<'a> {
        Box::pin(async move {
            let start = Instant::now();
            let tokens_before = self.estimator.estimate(messages);
            let reduced = self.inner.reduce(messages, cancel).await?;
            let report = CompressionReport {
                strategy: self.inner.name(),
                messages_before: messages.len(),
                messages_after: reduced.len(),
                tokens_before,
                tokens_after: self.estimator.estimate(&reduced),
                elapsed: start.elapsed(),
            };
            self.record(&report);
            Ok(reduced)
        })
    }
}
