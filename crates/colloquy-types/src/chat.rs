//! Canvas, message, and chat-turn types for Colloquy.
//!
//! A canvas is a conversation thread. Messages inside a canvas form a tree
//! through `parent_id` back-references; a chat turn appends a user message
//! and, when the model answers, one assistant message beneath it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

pub use crate::llm::MessageRole;

/// Lifecycle status of a canvas.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('active', 'archived'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanvasStatus {
    #[default]
    Active,
    Archived,
}

impl fmt::Display for CanvasStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanvasStatus::Active => write!(f, "active"),
            CanvasStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for CanvasStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(CanvasStatus::Active),
            "archived" => Ok(CanvasStatus::Archived),
            other => Err(format!("invalid canvas status: '{other}'")),
        }
    }
}

/// What a canvas is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanvasKind {
    #[default]
    Chat,
    Code,
}

impl fmt::Display for CanvasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanvasKind::Chat => write!(f, "chat"),
            CanvasKind::Code => write!(f, "code"),
        }
    }
}

impl FromStr for CanvasKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(CanvasKind::Chat),
            "code" => Ok(CanvasKind::Code),
            other => Err(format!("invalid canvas kind: '{other}'")),
        }
    }
}

/// A conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Canvas {
    pub id: Uuid,
    /// Owning tenant; canvases are invisible outside it.
    pub tenant_id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub kind: CanvasKind,
    pub status: CanvasStatus,
    /// Model record to use when a turn does not name one explicitly.
    pub model_id: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted message within a canvas.
///
/// Content is immutable once stored. `metadata` is an opaque JSON document
/// and is `{}` when nothing was supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub canvas_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub role: MessageRole,
    pub content: String,
    pub metadata: serde_json::Value,
    pub token_count: Option<u32>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a new, not yet persisted message with a fresh time-ordered id.
    pub fn new(
        canvas_id: Uuid,
        parent_id: Option<Uuid>,
        role: MessageRole,
        content: impl Into<String>,
        created_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            canvas_id,
            parent_id,
            role,
            content: content.into(),
            metadata: empty_metadata(),
            token_count: None,
            created_by,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata.unwrap_or_else(empty_metadata);
        self
    }
}

/// The default metadata document.
pub fn empty_metadata() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Request body for creating a canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCanvasRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub workspace_id: Uuid,
    #[serde(default)]
    pub kind: CanvasKind,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Request body for updating a canvas. Absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCanvasRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<CanvasStatus>,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Filter for listing the canvases of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasFilter {
    pub tenant_id: Uuid,
    pub workspace_id: Uuid,
    pub kind: Option<CanvasKind>,
}

/// An inbound chat turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Explicit model record override for this turn only.
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub params: Option<crate::llm::ModelParams>,
}

/// Result of a non-streaming chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
}

/// One event of a streamed chat turn as delivered to the client.
///
/// Serialized as `{"type":"user","id":..,"content":..}` and friends; `done`
/// carries no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    User { id: Uuid, content: String },
    Assistant { id: Uuid, content: String },
    Error { content: String },
    Done,
}

/// A page of results plus the total row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}
