//! Convenience re-exports for common `cinch-context` types.
//!
//! Meant to be glob-imported by code that reduces histories:
//!
//! ```ignore
//! use cinch_context::prelude::*;
//! ```
//!
//! Helpers such as zone planning, eviction and transcript rendering are
//! left out. Import those from their modules when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::config::CompressionConfig;
pub use crate::error::{ConfigError, ReduceError};
pub use crate::{ContentBlock, Message, MessageRole};

// ── Completion executor ─────────────────────────────────────────────
pub use crate::executor::{CompletionExecutor, ExecutionOptions, FnExecutor};

// ── Reducers ────────────────────────────────────────────────────────
pub use crate::context::adaptive::{AdaptiveReducer, CompressionTier};
pub use crate::context::counting::MessageCountingReducer;
pub use crate::context::function_calls::FunctionCallPreservationReducer;
pub use crate::context::keyword::KeywordAwareReducer;
pub use crate::context::layered::LayeredReducer;
pub use crate::context::monitor::{CompressionReport, MonitoredReducer};
pub use crate::context::sanitize::OrphanSanitizing;
pub use crate::context::summarizing::SummarizingReducer;
pub use crate::context::system_protection::SystemMessageProtection;
pub use crate::context::three_zone::{CompressionStage, ThreeZoneReducer};
pub use crate::context::{ChatHistoryReducer, ReducerFactory, ReducerKind};

// ── Budget ──────────────────────────────────────────────────────────
pub use crate::context::{CharRatioEstimator, ContextUsage, TokenEstimator};

pub use tokio_util::sync::CancellationToken;
