//! OpenAI-compatible chat provider implementation.
//!
//! Uses [`async_openai`] for type-safe request/response handling and
//! built-in SSE streaming. Any endpoint speaking the chat completions
//! protocol can be served by pointing `base_url` at it.

pub mod config;
pub mod streaming;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use async_openai::Client;
use secrecy::ExposeSecret;
use tracing::debug;

use colloquy_core::llm::provider::{ChatProvider, ProviderStream};
use colloquy_types::llm::{Message, MessageRole, ModelParams, ProviderError};

use self::config::OpenAiCompatConfig;
use self::streaming::{map_openai_stream, open_cumulative};

/// Adapter for any OpenAI-compatible chat completions API.
///
/// Does NOT derive Debug: the `async_openai::Client` holds the API key.
pub struct OpenAiChatProvider {
    client: Client<OpenAIConfig>,
    provider_name: String,
    models: Vec<String>,
}

impl OpenAiChatProvider {
    /// Create a provider from a configuration.
    ///
    /// An empty API key is rejected here, before any request is made.
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, ProviderError> {
        if config.api_key.expose_secret().trim().is_empty() {
            return Err(ProviderError::AuthenticationFailed);
        }

        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.expose_secret())
            .with_api_base(&config.base_url);

        Ok(Self {
            client: Client::with_config(openai_config),
            provider_name: config.provider_name,
            models: config.models,
        })
    }

    fn ensure_supported(&self, model: &str) -> Result<(), ProviderError> {
        if self.supports(model) {
            Ok(())
        } else {
            Err(ProviderError::ModelNotSupported(model.to_string()))
        }
    }
}

/// Build a [`CreateChatCompletionRequest`] from the conversation and parameters.
///
/// Only parameters that are set are sent; the vendor applies its own
/// defaults for the rest.
fn build_request(
    model: &str,
    messages: &[Message],
    params: &ModelParams,
    stream: bool,
) -> CreateChatCompletionRequest {
    let messages = messages.iter().map(to_openai_message).collect();

    CreateChatCompletionRequest {
        model: model.to_string(),
        messages,
        temperature: params.temperature,
        top_p: params.top_p,
        max_completion_tokens: params.max_tokens,
        presence_penalty: params.presence_penalty,
        frequency_penalty: params.frequency_penalty,
        stream: stream.then_some(true),
        ..Default::default()
    }
}

fn to_openai_message(msg: &Message) -> ChatCompletionRequestMessage {
    match msg.role {
        MessageRole::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                name: None,
            })
        }
        MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
            name: None,
        }),
        MessageRole::Assistant => {
            #[allow(deprecated)]
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                    msg.content.clone(),
                )),
                refusal: None,
                name: None,
                audio: None,
                tool_calls: None,
                function_call: None,
            })
        }
    }
}

impl ChatProvider for OpenAiChatProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn supported_models(&self) -> &[String] {
        &self.models
    }

    fn supports(&self, model: &str) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| m == model)
    }

    async fn call_once(
        &self,
        model: &str,
        messages: &[Message],
        params: &ModelParams,
    ) -> Result<Message, ProviderError> {
        self.ensure_supported(model)?;
        let request = build_request(model, messages, params, false);

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyUpstreamResponse)?;

        debug!(
            provider = %self.provider_name,
            model,
            finish_reason = ?choice.finish_reason,
            "completion received"
        );

        Ok(Message::assistant(choice.message.content.unwrap_or_default()))
    }

    async fn open_stream(
        &self,
        model: &str,
        messages: Vec<Message>,
        params: ModelParams,
    ) -> Result<ProviderStream, ProviderError> {
        self.ensure_supported(model)?;
        let request = build_request(model, &messages, &params, true);

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(map_openai_error)?;

        open_cumulative(map_openai_stream(stream)).await
    }
}

/// Map an `async_openai::error::OpenAIError` to a [`ProviderError`].
///
/// Rejected credentials become `AuthenticationFailed`; everything else is
/// an upstream failure carrying the vendor's message.
pub(crate) fn map_openai_error(err: async_openai::error::OpenAIError) -> ProviderError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "invalid_api_key"
                || code == "authentication_error"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
                || api_err.message.contains("Invalid API key")
            {
                ProviderError::AuthenticationFailed
            } else {
                ProviderError::UpstreamCallFailed(api_err.message.clone())
            }
        }
        OpenAIError::Reqwest(reqwest_err)
            if reqwest_err.status().is_some_and(|s| s.as_u16() == 401) =>
        {
            ProviderError::AuthenticationFailed
        }
        OpenAIError::JSONDeserialize(_, content) => {
            ProviderError::UpstreamCallFailed(format!("failed to parse response: {content}"))
        }
        _ => ProviderError::UpstreamCallFailed(err.to_string()),
    }
}
