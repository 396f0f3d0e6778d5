//! ChatProvider trait definition.
//!
//! This is the uniform contract every model vendor adapter implements.
//! Uses RPITIT for `call_once` and `open_stream`; the stream itself is a
//! `Pin<Box<dyn Stream>>` so it can cross the `BoxChatProvider` boundary and
//! be moved into a spawned pump task.

use std::pin::Pin;

use futures_util::Stream;

use colloquy_types::llm::{Message, ModelParams, ProviderError, StreamEvent};

/// A stream of cumulative events ending in a tagged terminal event.
pub type ProviderStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send + 'static>>;

/// Trait for model vendor adapters (OpenAI-compatible, echo, ...).
///
/// Implementations live in colloquy-infra.
pub trait ChatProvider: Send + Sync {
    /// Registry id of the vendor, e.g. "openai".
    fn name(&self) -> &str;

    /// Vendor model names this adapter accepts.
    fn supported_models(&self) -> &[String];

    fn supports(&self, model: &str) -> bool {
        self.supported_models().iter().any(|m| m == model)
    }

    /// Send the conversation and wait for the whole answer.
    ///
    /// Returns an assistant message. Fails with `ModelNotSupported` before
    /// any network call when `model` is unknown to this adapter.
    fn call_once(
        &self,
        model: &str,
        messages: &[Message],
        params: &ModelParams,
    ) -> impl std::future::Future<Output = Result<Message, ProviderError>> + Send;

    /// Open a streaming call.
    ///
    /// Errors that happen before the first byte of the answer (unknown
    /// model, rejected credential, connection refused) are returned here.
    /// Once the stream is handed out, every item carries the cumulative
    /// content and the last item is `Completed` or `Truncated`.
    fn open_stream(
        &self,
        model: &str,
        messages: Vec<Message>,
        params: ModelParams,
    ) -> impl std::future::Future<Output = Result<ProviderStream, ProviderError>> + Send;
}
