//! Chat provider implementations.
//!
//! Contains the concrete implementations of the [`ChatProvider`] trait
//! defined in `colloquy-core` plus the factories the
//! [`ProviderRegistry`] builds them with.
//!
//! [`ChatProvider`]: colloquy_core::llm::provider::ChatProvider

pub mod echo;
pub mod openai_compat;

use secrecy::{ExposeSecret, SecretString};

use colloquy_core::llm::box_provider::BoxChatProvider;
use colloquy_core::llm::registry::{ProviderFactory, ProviderRegistry};
use colloquy_types::config::ProvidersConfig;
use colloquy_types::llm::ProviderError;

use self::echo::{ECHO_PROVIDER_ID, EchoProvider};
use self::openai_compat::OpenAiChatProvider;
use self::openai_compat::config::{OPENAI_PROVIDER_ID, openai_config};

/// Factory for the OpenAI adapter, configured by the `[providers]` section.
pub fn openai_factory(providers: ProvidersConfig) -> impl ProviderFactory + 'static {
    move |api_key: &SecretString| -> Result<BoxChatProvider, ProviderError> {
        let key = SecretString::from(api_key.expose_secret().to_string());
        let config = openai_config(key, &providers);
        Ok(BoxChatProvider::new(OpenAiChatProvider::new(config)?))
    }
}

/// Factory for the echo adapter.
pub fn echo_factory() -> impl ProviderFactory + 'static {
    |api_key: &SecretString| -> Result<BoxChatProvider, ProviderError> {
        Ok(BoxChatProvider::new(EchoProvider::new(api_key)?))
    }
}

/// Registry with every built-in adapter registered.
pub fn default_registry(providers: &ProvidersConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register_factory(OPENAI_PROVIDER_ID, openai_factory(providers.clone()));
    registry.register_factory(ECHO_PROVIDER_ID, echo_factory());
    registry
}
