//! Canvases, messages and the chat turn pipeline.
//!
//! - `ChatStore`: persistence port for canvases and messages
//! - `ConversationAssembler`: ancestor-chain context windows
//! - `ChatOrchestrator`: one turn, streamed or not
//! - `CanvasService`: canvas CRUD and paginated history

pub mod context;
pub mod orchestrator;
pub mod repository;
pub mod service;
pub mod turn;
