//! The completion executor port.
//!
//! Model-backed reducers never talk to a provider directly. They hand a
//! prompt to a [`CompletionExecutor`] supplied by the application and get
//! generated text back. The executor may run its own request pipeline, which
//! may itself reduce context; [`ExecutionOptions::skip_compression`] tells it
//! not to, so a summary call can never trigger another summary call.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by [`CompletionExecutor::execute`].
///
/// Errors are plain strings; reducers only ever log them and fold them into
/// placeholder text.
pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// Per-call options for a completion request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOptions {
    /// Do not apply context reduction to this request.
    pub skip_compression: bool,
    /// Model override. `None` lets the executor pick.
    pub model: Option<String>,
    /// Maximum tokens for the response.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl ExecutionOptions {
    /// Options for a summary request: compression is always skipped.
    pub fn summary(model: Option<String>, max_tokens: Option<u32>) -> Self {
        Self {
            skip_compression: true,
            model,
            max_tokens,
            temperature: Some(0.3),
        }
    }
}

/// Turns a prompt into generated text.
///
/// Implementations should observe `cancel` and return early when it fires;
/// reducers also race the call against the token, so a slow executor never
/// blocks cancellation.
pub trait CompletionExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a ExecutionOptions,
        cancel: &'a CancellationToken,
    ) -> CompletionFuture<'a>;
}

impl<E: CompletionExecutor + ?Sized> CompletionExecutor for Arc<E> {
    fn execute<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a ExecutionOptions,
        cancel: &'a CancellationToken,
    ) -> CompletionFuture<'a> {
        (**self).execute(prompt, options, cancel)
    }
}

/// Type-erased async handler for [`FnExecutor`].
type ErasedHandler = Box<
    dyn Fn(String, ExecutionOptions) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send>>
        + Send
        + Sync,
>;

/// A closure-based [`CompletionExecutor`].
///
/// ```ignore
/// let executor = FnExecutor::new(|prompt, _opts| async move {
///     client.complete(&prompt).await.map_err(|e| e.to_string())
/// });
/// ```
pub struct FnExecutor {
    handler: ErasedHandler,
}

impl FnExecutor {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(String, ExecutionOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        let erased = move |prompt: String, options: ExecutionOptions| -> Pin<
            Box<dyn Future<Output = Result<String, String>> + Send>,
        > { Box::pin(handler(prompt, options)) };
        Self {
            handler: Box::new(erased),
        }
    }
}

impl CompletionExecutor for FnExecutor {
    fn execute<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a ExecutionOptions,
        _cancel: &'a CancellationToken,
    ) -> CompletionFuture<'a> {
        (self.handler)(prompt.to_string(), options.clone())
    }
}

impl fmt::Debug for FnExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnExecutor").finish_non_exhaustive()
    }
}
