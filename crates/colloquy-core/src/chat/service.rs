//! Canvas service: canvas lifecycle and paginated history.
//!
//! Chat turns themselves go through `ChatOrchestrator`; this service covers
//! the surrounding CRUD operations. Every lookup is scoped to the caller's
//! tenant, and a canvas of another tenant is reported as not found.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use colloquy_types::auth::Identity;
use colloquy_types::chat::{
    Canvas, CanvasFilter, CanvasKind, CanvasStatus, ChatMessage, CreateCanvasRequest,
    MessageRole, Page, UpdateCanvasRequest,
};
use colloquy_types::error::{ChatError, RepositoryError};

use crate::chat::repository::ChatStore;

/// Page size used when the caller does not pass one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Upper bound on a requested page size.
pub const MAX_PAGE_SIZE: u32 = 200;
/// Page size for canvas listings when the caller does not pass one.
pub const DEFAULT_CANVAS_PAGE_SIZE: u32 = 20;

/// Fetch a canvas if it exists and belongs to `tenant_id`.
pub(crate) async fn owned_canvas<S: ChatStore>(
    store: &S,
    tenant_id: &Uuid,
    canvas_id: &Uuid,
) -> Result<Canvas, ChatError> {
    store
        .get_canvas(canvas_id)
        .await
        .map_err(|e| ChatError::Storage(e.to_string()))?
        .filter(|c| c.tenant_id == *tenant_id)
        .ok_or(ChatError::CanvasNotFound)
}

fn page_window(page: Option<u32>, page_size: Option<u32>, default_size: u32) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE);
    let offset = u64::from(page - 1) * u64::from(page_size);
    (page, page_size, offset)
}

pub struct CanvasService<S: ChatStore> {
    store: Arc<S>,
    welcome_message: String,
}

impl<S: ChatStore> CanvasService<S> {
    pub fn new(store: Arc<S>, welcome_message: impl Into<String>) -> Self {
        Self {
            store,
            welcome_message: welcome_message.into(),
        }
    }

    // --- Canvas lifecycle ---

    /// Create a canvas owned by `identity`.
    ///
    /// A system welcome message is written afterwards when one is configured.
    /// Failing to write it does not fail the creation.
    pub async fn create_canvas(
        &self,
        identity: &Identity,
        request: CreateCanvasRequest,
    ) -> Result<Canvas, ChatError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(ChatError::Validation("title must not be empty".to_string()));
        }

        let now = Utc::now();
        let canvas = Canvas {
            id: Uuid::now_v7(),
            tenant_id: identity.tenant_id,
            workspace_id: request.workspace_id,
            title: title.to_string(),
            description: request.description,
            kind: request.kind,
            status: CanvasStatus::Active,
            model_id: request.model_id,
            created_by: identity.user_id,
            created_at: now,
            updated_at: now,
        };

        self.store
            .create_canvas(&canvas)
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))?;
        info!(canvas_id = %canvas.id, user_id = %identity.user_id, "canvas created");

        if !self.welcome_message.is_empty() {
            let welcome = ChatMessage::new(
                canvas.id,
                None,
                MessageRole::System,
                self.welcome_message.clone(),
                identity.user_id,
            );
            if let Err(err) = self.store.create_message(&welcome).await {
                warn!(canvas_id = %canvas.id, error = %err, "failed to write welcome message");
            }
        }

        Ok(canvas)
    }

    pub async fn get_canvas(&self, identity: &Identity, canvas_id: &Uuid) -> Result<Canvas, ChatError> {
        owned_canvas(self.store.as_ref(), &identity.tenant_id, canvas_id).await
    }

    /// Canvases of one workspace, most recently updated first.
    pub async fn list_canvases(
        &self,
        identity: &Identity,
        workspace_id: Uuid,
        kind: Option<CanvasKind>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<Canvas>, ChatError> {
        let (page, page_size, offset) = page_window(page, page_size, DEFAULT_CANVAS_PAGE_SIZE);
        let filter = CanvasFilter {
            tenant_id: identity.tenant_id,
            workspace_id,
            kind,
        };
        let (items, total) = self
            .store
            .list_canvases(&filter, offset, u64::from(page_size))
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))?;

        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Apply the fields present in `request`. An empty `model_id` clears it.
    pub async fn update_canvas(
        &self,
        identity: &Identity,
        canvas_id: &Uuid,
        request: UpdateCanvasRequest,
    ) -> Result<Canvas, ChatError> {
        let mut canvas = self.get_canvas(identity, canvas_id).await?;

        if let Some(title) = request.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(ChatError::Validation("title must not be empty".to_string()));
            }
            canvas.title = title.to_string();
        }
        if let Some(description) = request.description {
            canvas.description = Some(description);
        }
        if let Some(status) = request.status {
            canvas.status = status;
        }
        if let Some(model_id) = request.model_id {
            canvas.model_id = Some(model_id).filter(|m| !m.trim().is_empty());
        }
        canvas.updated_at = Utc::now();

        self.store.update_canvas(&canvas).await.map_err(|e| match e {
            RepositoryError::NotFound => ChatError::CanvasNotFound,
            other => ChatError::Storage(other.to_string()),
        })?;
        info!(canvas_id = %canvas.id, status = %canvas.status, "canvas updated");

        Ok(canvas)
    }

    /// Delete a canvas together with its messages.
    pub async fn delete_canvas(&self, identity: &Identity, canvas_id: &Uuid) -> Result<(), ChatError> {
        self.get_canvas(identity, canvas_id).await?;

        let deleted = self
            .store
            .delete_canvas(canvas_id)
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))?;
        if !deleted {
            return Err(ChatError::CanvasNotFound);
        }
        info!(canvas_id = %canvas_id, user_id = %identity.user_id, "canvas deleted");

        Ok(())
    }

    // --- History ---

    /// One page of a canvas's messages, oldest first. `page` is 1-based.
    pub async fn list_messages(
        &self,
        identity: &Identity,
        canvas_id: &Uuid,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<ChatMessage>, ChatError> {
        let (page, page_size, offset) = page_window(page, page_size, DEFAULT_PAGE_SIZE);

        // 404 for an unknown canvas rather than an empty page.
        self.get_canvas(identity, canvas_id).await?;

        let (items, total) = self
            .store
            .list_messages(canvas_id, offset, u64::from(page_size))
            .await
            .map_err(|e| ChatError::Storage(e.to_string()))?;

        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }
}
