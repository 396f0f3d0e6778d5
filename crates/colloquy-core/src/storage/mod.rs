//! Storage abstractions for Colloquy.
//!
//! Defines the expiring key-value store that backs refresh sessions.
//! Implementations live in colloquy-infra.

pub mod session_store;
