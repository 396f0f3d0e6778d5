//! Query parameter extractors for list endpoints.

use serde::Deserialize;
use uuid::Uuid;

use colloquy_types::chat::CanvasKind;

/// Pagination for message listing. Both fields are optional; the service
/// applies its defaults and bounds.
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Query parameters for GET /api/v1/canvases.
#[derive(Debug, Deserialize)]
pub struct CanvasListQuery {
    pub workspace_id: Uuid,
    /// Filter by kind (chat, code).
    #[serde(rename = "type", default)]
    pub kind: Option<CanvasKind>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

