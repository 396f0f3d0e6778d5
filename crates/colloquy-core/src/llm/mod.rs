//! Model provider abstractions for Colloquy.
//!
//! - `ChatProvider`: RPITIT trait implemented by vendor adapters
//! - `BoxChatProvider`: object-safe wrapper for dynamic dispatch
//! - `ProviderRegistry`: credential-aware adapter cache
//! - `ModelCatalog`: model record and API key lookup

pub mod box_provider;
pub mod catalog;
pub mod cumulative;
pub mod provider;
pub mod registry;
