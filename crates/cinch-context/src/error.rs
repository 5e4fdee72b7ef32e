//! Error types.
//!
//! Reductions fail only when cancelled; everything else degrades to a
//! (possibly lossy) history. Configuration problems are reported separately
//! because they happen once, at startup.

use std::path::PathBuf;

/// Error returned by [`ChatHistoryReducer::reduce`](crate::context::ChatHistoryReducer::reduce).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReduceError {
    /// The cancellation token fired while a summary call was pending.
    #[error("context reduction cancelled")]
    Cancelled,
}

/// Error produced while loading or interpreting a [`CompressionConfig`](crate::config::CompressionConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unknown reduction strategy '{0}'")]
    UnknownStrategy(String),
}
