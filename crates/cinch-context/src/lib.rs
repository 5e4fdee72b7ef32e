//! Context-reduction strategies for LLM chat histories.
//!
//! `cinch-context` takes a growing conversation and returns a shorter,
//! budget-compliant one before it is sent to a model. Every strategy
//! implements the same [`ChatHistoryReducer`](context::ChatHistoryReducer)
//! contract, so callers pick exactly one and swap it freely:
//!
//! ```ignore
//! use cinch_context::prelude::*;
//! use std::sync::Arc;
//!
//! let config = Arc::new(CompressionConfig::default().with_message_threshold(30));
//! let executor: Arc<dyn CompletionExecutor> = Arc::new(my_executor);
//!
//! let reducer = ReducerFactory::new(config, executor).build(ReducerKind::ThreeZone);
//! let reduced = reducer.reduce(&messages, &CancellationToken::new()).await?;
//! ```
//!
//! # Where to find things
//!
//! - **The contract:** [`ChatHistoryReducer`](context::ChatHistoryReducer) in
//!   [`context`].
//! - **Deterministic strategies:** [`context::counting`],
//!   [`context::keyword`], [`context::function_calls`] and the
//!   [`context::system_protection`] decorator.
//! - **Model-backed strategies:** [`context::summarizing`],
//!   [`context::layered`] and the ratio-driven [`context::three_zone`]
//!   compressor. They call out through
//!   [`CompletionExecutor`](executor::CompletionExecutor).
//! - **Choosing a strategy:** [`context::adaptive`] picks one from the
//!   current size; [`context::factory`] maps a config key to an instance.
//! - **Measuring:** [`context::budget`] holds the shared token estimator and
//!   [`context::monitor`] logs how much each run saved.
//!
//! # Design principles
//!
//! 1. **Inputs are borrowed, outputs are new.** Reducers take `&[Message]`
//!    and build a fresh `Vec`; the caller's history is never touched.
//!
//! 2. **Degrade, don't fail.** A failed summary call becomes visible
//!    placeholder text. The only error a reduction surfaces is cancellation.
//!
//! 3. **Tool calls travel in pairs.** Call and result blocks are correlated by
//!    id. Anything left without its partner is rewritten to plain text.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod prelude;

use serde::{Deserialize, Serialize};

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A unit of message content.
///
/// Function calls and their results are correlated by `call_id` only; there
/// is no structural nesting between the two.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        /// Raw JSON arguments as produced by the model.
        arguments: String,
    },
    FunctionResult {
        call_id: String,
        result: String,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn function_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        ContentBlock::FunctionCall {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn function_result(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        ContentBlock::FunctionResult {
            call_id: call_id.into(),
            result: result.into(),
        }
    }

    /// Whether this block is a function call or a function result.
    pub fn is_function(&self) -> bool {
        matches!(
            self,
            ContentBlock::FunctionCall { .. } | ContentBlock::FunctionResult { .. }
        )
    }
}

/// A message in the conversation.
///
/// The message's text is not stored separately: it is the concatenation of
/// its [`ContentBlock::Text`] blocks (see [`Message::text`]).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

impl Message {
    /// Create a message with the given role and blocks.
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content,
            author_name: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![ContentBlock::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, vec![ContentBlock::text(text)])
    }

    /// An assistant message carrying a single function call.
    pub fn tool_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::new(
            MessageRole::Assistant,
            vec![ContentBlock::function_call(call_id, name, arguments)],
        )
    }

    /// A tool message carrying the result for `call_id`.
    pub fn tool_result(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self::new(
            MessageRole::Tool,
            vec![ContentBlock::function_result(call_id, result)],
        )
    }

    /// Set the author name (builder pattern).
    pub fn with_author(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }

    /// Append a content block (builder pattern).
    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.content.push(block);
        self
    }

    pub fn is_system(&self) -> bool {
        self.role == MessageRole::System
    }

    /// The message text: all text blocks joined by newlines, or `None` when
    /// the message has no text blocks.
    pub fn text(&self) -> Option<String> {
        let mut texts = self.content.iter().filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        });
        let first = texts.next()?;
        let mut joined = first.to_string();
        for t in texts {
            joined.push('\n');
            joined.push_str(t);
        }
        Some(joined)
    }

    /// Character count of the message text. Missing text counts as zero.
    pub fn text_chars(&self) -> usize {
        self.content
            .iter()
            .map(|b| match b {
                ContentBlock::Text { text } => text.chars().count(),
                _ => 0,
            })
            .sum()
    }

    /// Character count of all function result payloads in the message.
    pub fn result_chars(&self) -> usize {
        self.content
            .iter()
            .map(|b| match b {
                ContentBlock::FunctionResult { result, .. } => result.chars().count(),
                _ => 0,
            })
            .sum()
    }

    pub fn has_text_block(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::Text { .. }))
    }

    /// Whether the message carries any function call or function result.
    pub fn has_function_content(&self) -> bool {
        self.content.iter().any(ContentBlock::is_function)
    }

    /// Whether every block in the message is a function result.
    pub fn only_function_results(&self) -> bool {
        !self.content.is_empty()
            && self
                .content
                .iter()
                .all(|b| matches!(b, ContentBlock::FunctionResult { .. }))
    }

    /// Ids of the function calls issued in this message.
    pub fn call_ids(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|b| match b {
            ContentBlock::FunctionCall { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        })
    }

    /// Ids referenced by the function results in this message.
    pub fn result_ids(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|b| match b {
            ContentBlock::FunctionResult { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        })
    }
}
