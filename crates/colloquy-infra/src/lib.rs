//! Infrastructure layer for Colloquy.
//!
//! Contains implementations of the traits defined in `colloquy-core`:
//! SQLite storage, the in-memory session store, chat provider adapters,
//! token signing and password hashing, plus the configuration loader.

pub mod config;
pub mod crypto;
pub mod llm;
pub mod session;
pub mod sqlite;
