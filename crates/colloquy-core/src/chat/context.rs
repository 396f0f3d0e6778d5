//! Conversation context assembly.
//!
//! Walks `parent_id` back-references from a message toward the root of its
//! canvas and returns the nearest ancestors oldest-first. The walk is
//! iterative with an explicit depth counter, so chain length never
//! translates into stack depth.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use colloquy_types::chat::ChatMessage;
use colloquy_types::error::RepositoryError;

use crate::chat::repository::ChatStore;

/// Default number of messages in an assembled context window.
pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

/// Reconstructs the context window for a chat turn.
pub struct ConversationAssembler<S: ChatStore> {
    store: Arc<S>,
    window: usize,
}

impl<S: ChatStore> ConversationAssembler<S> {
    pub fn new(store: Arc<S>, window: usize) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Context for a turn whose parent is `parent_id`.
    ///
    /// Returns the chain ending at `parent_id` (inclusive), oldest first,
    /// holding at most `window` messages. No parent means no prior context.
    /// Any lookup failure yields an empty context instead of an error.
    pub async fn assemble(&self, canvas_id: &Uuid, parent_id: Option<&Uuid>) -> Vec<ChatMessage> {
        let Some(parent_id) = parent_id else {
            return Vec::new();
        };

        match self.ancestor_chain(canvas_id, parent_id).await {
            Ok(chain) => {
                debug!(
                    canvas_id = %canvas_id,
                    parent_id = %parent_id,
                    messages = chain.len(),
                    "context assembled"
                );
                chain
            }
            Err(err) => {
                warn!(
                    canvas_id = %canvas_id,
                    parent_id = %parent_id,
                    error = %err,
                    "context assembly failed, continuing without history"
                );
                Vec::new()
            }
        }
    }

    async fn ancestor_chain(
        &self,
        canvas_id: &Uuid,
        start: &Uuid,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut collected: Vec<(usize, ChatMessage)> = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(*start);
        let mut depth = 0usize;

        while let Some(id) = next {
            if collected.len() >= self.window {
                break;
            }
            if !visited.insert(id) {
                warn!(canvas_id = %canvas_id, message_id = %id, "cycle in message chain");
                break;
            }

            let message = self
                .store
                .get_message(&id)
                .await?
                .ok_or(RepositoryError::NotFound)?;

            if message.canvas_id != *canvas_id {
                if depth == 0 {
                    return Err(RepositoryError::Conflict(format!(
                        "message {id} does not belong to canvas {canvas_id}"
                    )));
                }
                // A parent in another canvas ends the chain.
                break;
            }

            next = message.parent_id;
            collected.push((depth, message));
            depth += 1;
        }

        // Stable: equal-depth nodes keep chronological order.
        collected.sort_by(|(depth_a, a), (depth_b, b)| {
            depth_b
                .cmp(depth_a)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        Ok(collected.into_iter().map(|(_, message)| message).collect())
    }
}
