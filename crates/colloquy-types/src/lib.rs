//! Shared domain types for Colloquy.
//!
//! This crate contains the domain types used across the Colloquy workspace:
//! canvases and messages, provider call shapes, the model catalog, users and
//! sessions, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod model;
