//! Expiring key-value store trait.
//!
//! Values are opaque strings with a per-key time to live. Expired keys must
//! be invisible to every read, whether or not they have been purged yet.

use std::time::Duration;

use colloquy_types::error::RepositoryError;

/// Trait for the session key-value store.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in colloquy-infra.
pub trait SessionStore: Send + Sync {
    /// Set a value with a time to live (upsert; the TTL restarts).
    fn put(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a live value.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Atomically remove a live key and return its value.
    ///
    /// Of any number of concurrent `take` calls on one key, exactly one
    /// observes `Some`.
    fn take(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Delete a key. No-op if it does not exist.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All live `(key, value)` pairs whose key starts with `prefix`.
    fn scan_prefix(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<(String, String)>, RepositoryError>> + Send;

    /// Physically remove expired keys. Returns how many were removed.
    fn purge_expired(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
