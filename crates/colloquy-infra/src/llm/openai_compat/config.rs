//! Configuration and defaults for the OpenAI-compatible adapter.

use secrecy::SecretString;

use colloquy_types::config::ProvidersConfig;

/// Registry id of the OpenAI adapter.
pub const OPENAI_PROVIDER_ID: &str = "openai";

/// Public OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Vendor models the public OpenAI endpoint accepts.
pub const OPENAI_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-4",
    "gpt-4-turbo",
    "gpt-4o",
    "gpt-4o-mini",
];

/// Configuration for an OpenAI-compatible adapter.
///
/// Used to construct an [`super::OpenAiChatProvider`].
pub struct OpenAiCompatConfig {
    /// Registry id reported by the adapter.
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    pub base_url: String,
    pub api_key: SecretString,
    /// Vendor model names this endpoint serves. Empty accepts any model.
    pub models: Vec<String>,
}

/// OpenAI default configuration.
pub fn openai_defaults(api_key: SecretString) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: OPENAI_PROVIDER_ID.into(),
        base_url: OPENAI_BASE_URL.into(),
        api_key,
        models: OPENAI_MODELS.iter().map(|m| m.to_string()).collect(),
    }
}

/// OpenAI adapter configuration under the `[providers]` section.
///
/// An explicit `openai_models` list always wins. Otherwise the public
/// endpoint keeps [`OPENAI_MODELS`] and a custom `openai_base_url` accepts
/// whatever model the gateway serves.
pub fn openai_config(api_key: SecretString, providers: &ProvidersConfig) -> OpenAiCompatConfig {
    let mut config = openai_defaults(api_key);
    if let Some(url) = &providers.openai_base_url {
        config.base_url = url.clone();
        config.models = Vec::new();
    }
    if let Some(models) = &providers.openai_models {
        config.models = models.clone();
    }
    config
}
