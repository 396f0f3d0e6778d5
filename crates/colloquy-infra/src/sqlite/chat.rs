//! SQLite chat store implementation.
//!
//! Implements `ChatStore` from `colloquy-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, writes on the writer.

use colloquy_core::chat::repository::ChatStore;
use colloquy_types::chat::{
    Canvas, CanvasFilter, CanvasKind, CanvasStatus, ChatMessage, MessageRole,
};
use colloquy_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, map_write_error, parse_datetime, parse_uuid};

/// SQLite-backed implementation of `ChatStore`.
pub struct SqliteChatStore {
    pool: DatabasePool,
}

impl SqliteChatStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct CanvasRow {
    id: String,
    tenant_id: String,
    workspace_id: String,
    title: String,
    description: Option<String>,
    kind: String,
    status: String,
    model_id: Option<String>,
    created_by: String,
    created_at: String,
    updated_at: String,
}

impl CanvasRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            workspace_id: row.try_get("workspace_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            kind: row.try_get("kind")?,
            status: row.try_get("status")?,
            model_id: row.try_get("model_id")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_canvas(self) -> Result<Canvas, RepositoryError> {
        let kind: CanvasKind = self.kind.parse().map_err(RepositoryError::Query)?;
        let status: CanvasStatus = self.status.parse().map_err(RepositoryError::Query)?;

        Ok(Canvas {
            id: parse_uuid(&self.id, "canvas id")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant_id")?,
            workspace_id: parse_uuid(&self.workspace_id, "workspace_id")?,
            title: self.title,
            description: self.description,
            kind,
            status,
            model_id: self.model_id,
            created_by: parse_uuid(&self.created_by, "created_by")?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    canvas_id: String,
    parent_id: Option<String>,
    role: String,
    content: String,
    metadata: String,
    token_count: Option<i64>,
    created_by: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            canvas_id: row.try_get("canvas_id")?,
            parent_id: row.try_get("parent_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            metadata: row.try_get("metadata")?,
            token_count: row.try_get("token_count")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let role: MessageRole = self.role.parse().map_err(RepositoryError::Query)?;
        let metadata: serde_json::Value = serde_json::from_str(&self.metadata)
            .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?;
        let parent_id = self
            .parent_id
            .as_deref()
            .map(|p| parse_uuid(p, "parent_id"))
            .transpose()?;

        Ok(ChatMessage {
            id: parse_uuid(&self.id, "message id")?,
            canvas_id: parse_uuid(&self.canvas_id, "canvas_id")?,
            parent_id,
            role,
            content: self.content,
            metadata,
            token_count: self.token_count.map(|t| t as u32),
            created_by: parse_uuid(&self.created_by, "created_by")?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ChatStore implementation
// ---------------------------------------------------------------------------

impl ChatStore for SqliteChatStore {
    async fn create_canvas(&self, canvas: &Canvas) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO canvases (id, tenant_id, workspace_id, title, description, kind, status, model_id, created_by, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(canvas.id.to_string())
        .bind(canvas.tenant_id.to_string())
        .bind(canvas.workspace_id.to_string())
        .bind(&canvas.title)
        .bind(&canvas.description)
        .bind(canvas.kind.to_string())
        .bind(canvas.status.to_string())
        .bind(&canvas.model_id)
        .bind(canvas.created_by.to_string())
        .bind(format_datetime(&canvas.created_at))
        .bind(format_datetime(&canvas.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_canvas(&self, id: &Uuid) -> Result<Option<Canvas>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM canvases WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let canvas_row =
                    CanvasRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(canvas_row.into_canvas()?))
            }
            None => Ok(None),
        }
    }

    async fn list_canvases(
        &self,
        filter: &CanvasFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Canvas>, u64), RepositoryError> {
        let kind = filter.kind.map(|k| k.to_string());

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM canvases
               WHERE tenant_id = ?1 AND workspace_id = ?2 AND (?3 IS NULL OR kind = ?3)"#,
        )
        .bind(filter.tenant_id.to_string())
        .bind(filter.workspace_id.to_string())
        .bind(&kind)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let rows = sqlx::query(
            r#"SELECT * FROM canvases
               WHERE tenant_id = ?1 AND workspace_id = ?2 AND (?3 IS NULL OR kind = ?3)
               ORDER BY updated_at DESC, id DESC
               LIMIT ?4 OFFSET ?5"#,
        )
        .bind(filter.tenant_id.to_string())
        .bind(filter.workspace_id.to_string())
        .bind(&kind)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut canvases = Vec::with_capacity(rows.len());
        for row in &rows {
            let canvas_row =
                CanvasRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            canvases.push(canvas_row.into_canvas()?);
        }

        Ok((canvases, total as u64))
    }

    async fn update_canvas(&self, canvas: &Canvas) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE canvases
               SET title = ?, description = ?, status = ?, model_id = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&canvas.title)
        .bind(&canvas.description)
        .bind(canvas.status.to_string())
        .bind(&canvas.model_id)
        .bind(format_datetime(&canvas.updated_at))
        .bind(canvas.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_canvas(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        // Messages go with the canvas through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM canvases WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(map_write_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        let metadata = serde_json::to_string(&message.metadata)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize metadata: {e}")))?;
        let parent_id = message.parent_id.map(|p| p.to_string());

        // The parent check and the insert are one statement, so a parent
        // from another canvas can never slip in between.
        let result = sqlx::query(
            r#"INSERT INTO messages (id, canvas_id, parent_id, role, content, metadata, token_count, created_by, created_at)
               SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
               WHERE ?3 IS NULL
                  OR EXISTS (SELECT 1 FROM messages WHERE id = ?3 AND canvas_id = ?2)"#,
        )
        .bind(message.id.to_string())
        .bind(message.canvas_id.to_string())
        .bind(&parent_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(&metadata)
        .bind(message.token_count.map(i64::from))
        .bind(message.created_by.to_string())
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "parent message {} is not in canvas {}",
                parent_id.unwrap_or_default(),
                message.canvas_id
            )));
        }

        Ok(())
    }

    async fn get_message(&self, id: &Uuid) -> Result<Option<ChatMessage>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let msg_row =
                    MessageRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(msg_row.into_message()?))
            }
            None => Ok(None),
        }
    }

    async fn list_messages(
        &self,
        canvas_id: &Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<ChatMessage>, u64), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE canvas_id = ?")
            .bind(canvas_id.to_string())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let rows = sqlx::query(
            "SELECT * FROM messages WHERE canvas_id = ? ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(canvas_id.to_string())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(msg_row.into_message()?);
        }

        Ok((messages, total as u64))
    }
}
