//! Configuration loader for Colloquy.
//!
//! Reads `config.toml` from the data directory (`~/.colloquy/` by default)
//! and deserializes it into [`AppConfig`], then applies environment variable
//! overrides. Falls back to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use colloquy_types::config::AppConfig;

use crate::sqlite::pool::database_url_for;

pub const ENV_DATA_DIR: &str = "COLLOQUY_DATA_DIR";
pub const ENV_DATABASE_URL: &str = "COLLOQUY_DATABASE_URL";
pub const ENV_PORT: &str = "COLLOQUY_PORT";
pub const ENV_HOST: &str = "COLLOQUY_HOST";
pub const ENV_JWT_SECRET: &str = "JWT_SECRET";
pub const ENV_JWT_EXPIRATION: &str = "JWT_EXPIRATION";
pub const ENV_JWT_REFRESH_EXPIRATION: &str = "JWT_REFRESH_EXPIRATION";
pub const ENV_DEFAULT_MODEL: &str = "COLLOQUY_DEFAULT_MODEL";
pub const ENV_SESSION_BACKEND: &str = "COLLOQUY_SESSION_BACKEND";

/// `$COLLOQUY_DATA_DIR`, else `~/.colloquy`, else `./.colloquy`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".colloquy")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`AppConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Apply environment overrides from the process environment.
pub fn apply_env_overrides(config: &mut AppConfig) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply overrides from `lookup`. Unparsable numeric values are ignored
/// with a warning.
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(url) = lookup(ENV_DATABASE_URL) {
        config.database.url = Some(url);
    }
    if let Some(host) = lookup(ENV_HOST) {
        config.server.host = host;
    }
    if let Some(port) = lookup(ENV_PORT) {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => tracing::warn!(var = ENV_PORT, value = %port, "ignoring invalid port"),
        }
    }
    if let Some(secret) = lookup(ENV_JWT_SECRET) {
        config.auth.jwt_secret = secret;
    }
    if let Some(hours) = lookup(ENV_JWT_EXPIRATION) {
        match hours.parse::<i64>() {
            Ok(h) if h > 0 => config.auth.access_ttl_hours = h,
            _ => tracing::warn!(var = ENV_JWT_EXPIRATION, value = %hours, "ignoring invalid lifetime"),
        }
    }
    if let Some(hours) = lookup(ENV_JWT_REFRESH_EXPIRATION) {
        match hours.parse::<i64>() {
            Ok(h) if h > 0 => config.auth.refresh_ttl_hours = h,
            _ => tracing::warn!(
                var = ENV_JWT_REFRESH_EXPIRATION,
                value = %hours,
                "ignoring invalid lifetime"
            ),
        }
    }
    if let Some(model) = lookup(ENV_DEFAULT_MODEL) {
        config.chat.default_model = model;
    }
    if let Some(backend) = lookup(ENV_SESSION_BACKEND) {
        match backend.parse() {
            Ok(b) => config.session.backend = b,
            Err(_) => tracing::warn!(
                var = ENV_SESSION_BACKEND,
                value = %backend,
                "ignoring invalid session backend"
            ),
        }
    }
}

/// Database URL from the config, else the file under `data_dir`.
pub fn resolve_database_url(config: &AppConfig, data_dir: &Path) -> String {
    config
        .database
        .url
        .clone()
        .unwrap_or_else(|| database_url_for(data_dir))
}
