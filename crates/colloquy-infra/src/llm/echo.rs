//! Deterministic local provider that answers with the last user message.
//!
//! Needs no network. Useful for local development and end-to-end tests of
//! the streaming path: the answer is replayed word by word so clients see
//! several cumulative updates.

use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use colloquy_core::llm::cumulative::accumulate;
use colloquy_core::llm::provider::{ChatProvider, ProviderStream};
use colloquy_types::llm::{Message, MessageRole, ModelParams, ProviderError};

/// Registry id of the echo adapter.
pub const ECHO_PROVIDER_ID: &str = "echo";

/// The one model the echo adapter serves.
pub const ECHO_MODEL: &str = "echo-1";

pub struct EchoProvider {
    models: Vec<String>,
    word_delay: Duration,
}

impl EchoProvider {
    /// Any non-blank key is accepted.
    pub fn new(api_key: &SecretString) -> Result<Self, ProviderError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ProviderError::AuthenticationFailed);
        }
        Ok(Self {
            models: vec![ECHO_MODEL.to_string()],
            word_delay: Duration::ZERO,
        })
    }

    /// Pause between streamed words.
    pub fn with_word_delay(mut self, delay: Duration) -> Self {
        self.word_delay = delay;
        self
    }

    fn ensure_supported(&self, model: &str) -> Result<(), ProviderError> {
        if self.supports(model) {
            Ok(())
        } else {
            Err(ProviderError::ModelNotSupported(model.to_string()))
        }
    }
}

fn last_user_content(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

impl ChatProvider for EchoProvider {
    fn name(&self) -> &str {
        ECHO_PROVIDER_ID
    }

    fn supported_models(&self) -> &[String] {
        &self.models
    }

    async fn call_once(
        &self,
        model: &str,
        messages: &[Message],
        _params: &ModelParams,
    ) -> Result<Message, ProviderError> {
        self.ensure_supported(model)?;
        let answer = last_user_content(messages);
        if answer.is_empty() {
            return Err(ProviderError::EmptyUpstreamResponse);
        }
        Ok(Message::assistant(answer))
    }

    async fn open_stream(
        &self,
        model: &str,
        messages: Vec<Message>,
        _params: ModelParams,
    ) -> Result<ProviderStream, ProviderError> {
        self.ensure_supported(model)?;

        // Keep the separators so the concatenated deltas equal the input.
        let words: Vec<String> = last_user_content(&messages)
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();
        let delay = self.word_delay;

        let deltas = futures_util::stream::iter(words).then(move |word| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, ProviderError>(word)
        });

        Ok(accumulate(deltas))
    }
}
