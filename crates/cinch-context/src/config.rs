//! Compression configuration shared by every reducer.
//!
//! A [`CompressionConfig`] is loaded once by the surrounding application and
//! then shared read-only (usually behind an `Arc`). All fields have defaults,
//! so a partial JSON document is enough:
//!
//! ```ignore
//! let config = CompressionConfig::from_json_str(r#"{
//!     "message_count_threshold": 30,
//!     "critical_keywords": ["order", "invoice"],
//!     "strategy": "keyword-aware"
//! }"#)?;
//! ```

use crate::context::factory::ReducerKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default message-count threshold.
pub const DEFAULT_MESSAGE_THRESHOLD: usize = 20;

/// Default token threshold; doubles as the Three-Zone context length.
pub const DEFAULT_TOKEN_THRESHOLD: usize = 128_000;

/// The prompt prefix used for summarization. The rendered conversation is
/// appended directly after it.
pub const DEFAULT_SUMMARY_PROMPT: &str = "\
Summarize the following conversation messages concisely. Focus on:
- What the user asked for and what was accomplished
- Key findings and decisions made
- File paths, identifiers and numbers mentioned
- What remains to be done

Only include facts explicitly stated in the messages. Preserve names and \
identifiers verbatim.

";

/// Thresholds and keyword lists consumed by the reducers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Message count above which count-driven strategies activate.
    pub message_count_threshold: usize,
    /// Estimated token count above which token-driven strategies activate.
    /// Three-Zone uses it as the context length (0 means 128,000).
    pub token_count_threshold: usize,
    /// Substrings (case-insensitive) that exempt a message from eviction.
    pub critical_keywords: Vec<String>,
    /// Prompt prefix for summary calls.
    pub summary_prompt_template: String,
    /// Model override for summary calls. `None` lets the executor decide.
    pub summary_model: Option<String>,
    /// Response token cap for summary calls.
    pub summary_max_tokens: Option<u32>,
    /// Rewrite unmatched call/result blocks to text after every reduction
    /// built by the factory.
    pub sanitize_orphans: bool,
    /// Strategy built by [`ReducerFactory::build_default`](crate::context::factory::ReducerFactory::build_default).
    pub strategy: ReducerKind,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            message_count_threshold: DEFAULT_MESSAGE_THRESHOLD,
            token_count_threshold: DEFAULT_TOKEN_THRESHOLD,
            critical_keywords: Vec::new(),
            summary_prompt_template: DEFAULT_SUMMARY_PROMPT.to_string(),
            summary_model: None,
            summary_max_tokens: None,
            sanitize_orphans: true,
            strategy: ReducerKind::ThreeZone,
        }
    }
}

impl CompressionConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Reject configurations no strategy can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.message_count_threshold == 0 {
            return Err(ConfigError::Invalid(
                "message_count_threshold must be greater than zero".into(),
            ));
        }
        if self.summary_prompt_template.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "summary_prompt_template must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Set the message-count threshold.
    pub fn with_message_threshold(mut self, threshold: usize) -> Self {
        self.message_count_threshold = threshold;
        self
    }

    /// Set the token threshold (and Three-Zone context length).
    pub fn with_token_threshold(mut self, threshold: usize) -> Self {
        self.token_count_threshold = threshold;
        self
    }

    /// Add a critical keyword.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.critical_keywords.push(keyword.into());
        self
    }

    /// Replace the summary prompt prefix.
    pub fn with_summary_prompt(mut self, template: impl Into<String>) -> Self {
        self.summary_prompt_template = template.into();
        self
    }

    /// Set the model used for summary calls.
    pub fn with_summary_model(mut self, model: impl Into<String>) -> Self {
        self.summary_model = Some(model.into());
        self
    }

    /// Set the default strategy.
    pub fn with_strategy(mut self, kind: ReducerKind) -> Self {
        self.strategy = kind;
        self
    }

    /// Enable or disable the orphan sanitizing wrapper.
    pub fn with_sanitize_orphans(mut self, enabled: bool) -> Self {
        self.sanitize_orphans = enabled;
        self
    }
}
