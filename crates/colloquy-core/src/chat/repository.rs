//! ChatStore trait definition.
//!
//! Durable storage of canvases and their messages. Every call is a
//! standalone operation; nothing here spans a transaction across calls.

use colloquy_types::chat::{Canvas, CanvasFilter, ChatMessage};
use colloquy_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for canvas and message persistence.
///
/// Implementations live in colloquy-infra (e.g., `SqliteChatStore`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatStore: Send + Sync {
    fn create_canvas(
        &self,
        canvas: &Canvas,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_canvas(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Canvas>, RepositoryError>> + Send;

    /// Canvases matching the filter, most recently updated first, plus the
    /// total count.
    fn list_canvases(
        &self,
        filter: &CanvasFilter,
        offset: u64,
        limit: u64,
    ) -> impl std::future::Future<Output = Result<(Vec<Canvas>, u64), RepositoryError>> + Send;

    /// Overwrite the mutable fields of an existing canvas. Fails with
    /// `RepositoryError::NotFound` when the canvas is gone.
    fn update_canvas(
        &self,
        canvas: &Canvas,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a canvas and all of its messages. Returns whether it existed.
    fn delete_canvas(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Persist a new message.
    ///
    /// Must fail with `RepositoryError::Conflict` when `parent_id` is set but
    /// does not name a message of the same canvas.
    fn create_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_message(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;

    /// Messages of a canvas ordered by `created_at` ASC, plus the total count.
    fn list_messages(
        &self,
        canvas_id: &Uuid,
        offset: u64,
        limit: u64,
    ) -> impl std::future::Future<Output = Result<(Vec<ChatMessage>, u64), RepositoryError>> + Send;
}
