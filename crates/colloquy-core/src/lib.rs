//! Business logic and port traits for Colloquy.
//!
//! This crate defines the traits (stores, providers, credentials) that the
//! infrastructure layer implements, plus the chat pipeline and session
//! manager built on top of them. It depends only on `colloquy-types`, never
//! on `colloquy-infra` or any database/IO crate.

pub mod auth;
pub mod chat;
pub mod llm;
pub mod storage;

#[cfg(test)]
mod test_support;
