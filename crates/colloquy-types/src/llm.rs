//! Provider call types for Colloquy.
//!
//! These types model the uniform call/stream contract every model vendor is
//! normalized into: role/content messages, sampling parameters, cumulative
//! stream events, and the provider error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single role/content message, the only shape providers ever see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

/// Optional sampling parameters.
///
/// Absent fields fall back to the vendor default. Unknown keys in the
/// serialized form are ignored rather than rejected, so a model record can
/// carry vendor-specific extras without breaking other adapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
}

impl ModelParams {
    /// Overlay `overrides` on top of `self`; fields set in `overrides` win.
    pub fn merged_with(&self, overrides: &ModelParams) -> ModelParams {
        ModelParams {
            temperature: overrides.temperature.or(self.temperature),
            top_p: overrides.top_p.or(self.top_p),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            presence_penalty: overrides.presence_penalty.or(self.presence_penalty),
            frequency_penalty: overrides.frequency_penalty.or(self.frequency_penalty),
        }
    }

    /// Parse a loosely-typed JSON document into params, dropping anything
    /// that is not a recognized option or has the wrong type.
    pub fn from_json_lenient(value: &serde_json::Value) -> ModelParams {
        let get_f32 = |key: &str| value.get(key).and_then(|v| v.as_f64()).map(|v| v as f32);
        ModelParams {
            temperature: get_f32("temperature"),
            top_p: get_f32("top_p"),
            max_tokens: value
                .get("max_tokens")
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok()),
            presence_penalty: get_f32("presence_penalty"),
            frequency_penalty: get_f32("frequency_penalty"),
        }
    }
}

/// Events emitted by a provider's streaming call.
///
/// `Partial` always carries the cumulative answer so far, never a raw delta.
/// Exactly one of `Completed` or `Truncated` terminates a well-behaved stream;
/// a stream that simply ends without either must be treated as truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Partial { content: String },
    Completed { content: String },
    Truncated { content: String, reason: String },
}

impl StreamEvent {
    pub fn content(&self) -> &str {
        match self {
            StreamEvent::Partial { content }
            | StreamEvent::Completed { content }
            | StreamEvent::Truncated { content, .. } => content,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Partial { .. })
    }
}

/// Errors from provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("model not supported: {0}")]
    ModelNotSupported(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("upstream call failed: {0}")]
    UpstreamCallFailed(String),

    #[error("empty upstream response")]
    EmptyUpstreamResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            let s = role.to_string();
            let parsed: MessageRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_message_role_serde() {
        let role = MessageRole::Assistant;
        let json = serde_json::to_string(&role).unwrap();
        assert_eq!(json, "\"assistant\"");
        let parsed: MessageRole = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, MessageRole::Assistant);
    }

    #[test]
    fn test_message_role_rejects_unknown() {
        assert!("tool".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_model_params_ignores_unknown_keys() {
        let json = r#"{"temperature":0.2,"seed":42,"logit_bias":{}}"#;
        let params: ModelParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.temperature, Some(0.2));
        assert!(params.max_tokens.is_none());
    }

    #[test]
    fn test_model_params_lenient_drops_wrong_types() {
        let value = serde_json::json!({
            "temperature": "hot",
            "top_p": 0.9,
            "max_tokens": 256,
            "frequency_penalty": null
        });
        let params = ModelParams::from_json_lenient(&value);
        assert!(params.temperature.is_none());
        assert_eq!(params.top_p, Some(0.9));
        assert_eq!(params.max_tokens, Some(256));
        assert!(params.frequency_penalty.is_none());
    }

    #[test]
    fn test_model_params_merge_prefers_overrides() {
        let defaults = ModelParams {
            temperature: Some(0.7),
            max_tokens: Some(1024),
            ..Default::default()
        };
        let request = ModelParams {
            temperature: Some(0.1),
            ..Default::default()
        };
        let merged = defaults.merged_with(&request);
        assert_eq!(merged.temperature, Some(0.1));
        assert_eq!(merged.max_tokens, Some(1024));
    }

    #[test]
    fn test_stream_event_terminal() {
        assert!(!StreamEvent::Partial { content: "a".into() }.is_terminal());
        assert!(StreamEvent::Completed { content: "ab".into() }.is_terminal());
        let truncated = StreamEvent::Truncated {
            content: "a".into(),
            reason: "reset".into(),
        };
        assert!(truncated.is_terminal());
        assert_eq!(truncated.content(), "a");
    }

    #[test]
    fn test_stream_event_serde_tag() {
        let event = StreamEvent::Completed { content: "done".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"completed","content":"done"}"#);
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::ModelNotSupported("gpt-9".to_string());
        assert_eq!(err.to_string(), "model not supported: gpt-9");
    }
}
