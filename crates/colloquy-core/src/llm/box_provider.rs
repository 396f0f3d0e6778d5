//! BoxChatProvider -- object-safe dynamic dispatch wrapper for ChatProvider.
//!
//! 1. Define an object-safe `ChatProviderDyn` trait with boxed futures
//! 2. Blanket-impl `ChatProviderDyn` for all `T: ChatProvider`
//! 3. `BoxChatProvider` wraps `Box<dyn ChatProviderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use colloquy_types::llm::{Message, ModelParams, ProviderError};

use super::provider::{ChatProvider, ProviderStream};

/// Object-safe version of [`ChatProvider`] with boxed futures.
pub trait ChatProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn supported_models(&self) -> &[String];

    fn call_once_boxed<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [Message],
        params: &'a ModelParams,
    ) -> Pin<Box<dyn Future<Output = Result<Message, ProviderError>> + Send + 'a>>;

    fn open_stream_boxed<'a>(
        &'a self,
        model: &'a str,
        messages: Vec<Message>,
        params: ModelParams,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderStream, ProviderError>> + Send + 'a>>;
}

impl<T: ChatProvider> ChatProviderDyn for T {
    fn name(&self) -> &str {
        ChatProvider::name(self)
    }

    fn supported_models(&self) -> &[String] {
        ChatProvider::supported_models(self)
    }

    fn call_once_boxed<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [Message],
        params: &'a ModelParams,
    ) -> Pin<Box<dyn Future<Output = Result<Message, ProviderError>> + Send + 'a>> {
        Box::pin(self.call_once(model, messages, params))
    }

    fn open_stream_boxed<'a>(
        &'a self,
        model: &'a str,
        messages: Vec<Message>,
        params: ModelParams,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderStream, ProviderError>> + Send + 'a>> {
        Box::pin(self.open_stream(model, messages, params))
    }
}

/// Type-erased chat provider for runtime vendor selection.
///
/// `ChatProvider` uses RPITIT and cannot be a trait object directly, so the
/// registry stores these instead.
pub struct BoxChatProvider {
    inner: Box<dyn ChatProviderDyn + Send + Sync>,
}

impl BoxChatProvider {
    pub fn new<T: ChatProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn supported_models(&self) -> &[String] {
        self.inner.supported_models()
    }

    pub async fn call_once(
        &self,
        model: &str,
        messages: &[Message],
        params: &ModelParams,
    ) -> Result<Message, ProviderError> {
        self.inner.call_once_boxed(model, messages, params).await
    }

    pub async fn open_stream(
        &self,
        model: &str,
        messages: Vec<Message>,
        params: ModelParams,
    ) -> Result<ProviderStream, ProviderError> {
        self.inner.open_stream_boxed(model, messages, params).await
    }
}

impl std::fmt::Debug for BoxChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxChatProvider")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
