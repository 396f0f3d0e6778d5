//! Configuration types for Colloquy.
//!
//! `AppConfig` represents the top-level `config.toml`. Every section and
//! field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Top-level configuration for the Colloquy service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full SQLite URL. When unset, `{data_dir}/colloquy.db` is used.
    #[serde(default)]
    pub url: Option<String>,
}

/// Token signing and lifetime settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Access token lifetime in hours.
    #[serde(default = "default_access_ttl_hours")]
    pub access_ttl_hours: i64,
    /// Refresh token and session lifetime in hours.
    #[serde(default = "default_refresh_ttl_hours")]
    pub refresh_ttl_hours: i64,
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_access_ttl_hours() -> i64 {
    24
}

fn default_refresh_ttl_hours() -> i64 {
    168
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            access_ttl_hours: default_access_ttl_hours(),
            refresh_ttl_hours: default_refresh_ttl_hours(),
        }
    }
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == default_jwt_secret()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("access_ttl_hours", &self.access_ttl_hours)
            .field("refresh_ttl_hours", &self.refresh_ttl_hours)
            .finish()
    }
}

/// Provider adapter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Alternate endpoint for the `openai` adapter, e.g. a compatible proxy.
    #[serde(default)]
    pub openai_base_url: Option<String>,
    /// Vendor models the `openai` adapter accepts. When unset, the public
    /// endpoint uses its built-in list and a custom `openai_base_url`
    /// accepts any model. An empty list also accepts any model.
    #[serde(default)]
    pub openai_models: Option<Vec<String>>,
}

/// Where refresh sessions are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// The `session_kv` table; sessions survive restarts.
    #[default]
    Sqlite,
    /// Process memory; every session is lost on restart.
    Memory,
}

impl std::str::FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(SessionBackend::Sqlite),
            "memory" => Ok(SessionBackend::Memory),
            other => Err(format!("invalid session backend: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,
}

/// Chat pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model record used when neither the request nor the canvas names one.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Maximum number of prior messages assembled into a turn's context.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    /// Capacity of the per-stream event channel.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
    /// Content of the system message written when a canvas is created.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
}

fn default_model() -> String {
    "default".to_string()
}

fn default_context_window() -> usize {
    10
}

fn default_stream_buffer() -> usize {
    32
}

fn default_welcome_message() -> String {
    "Welcome! How can I help you today?".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            context_window: default_context_window(),
            stream_buffer: default_stream_buffer(),
            welcome_message: default_welcome_message(),
        }
    }
}
