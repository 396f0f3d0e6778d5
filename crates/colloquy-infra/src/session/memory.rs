//! In-memory `SessionStore` on a `DashMap`.
//!
//! Entry-level locking makes `take` atomic: `DashMap::remove` hands the
//! value to exactly one caller.

use std::time::{Duration, Instant};

use colloquy_core::storage::session_store::SessionStore;
use colloquy_types::error::RepositoryError;
use dashmap::DashMap;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Expiring key-value map. Contents are lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, Entry>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RepositoryError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| RepositoryError::Query("ttl out of range".to_string()))?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .filter(|(_, e)| e.is_live(now))
            .map(|(_, e)| e.value))
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, RepositoryError> {
        let now = Instant::now();
        let mut found: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().is_live(now))
            .map(|e| (e.key().clone(), e.value().value.clone()))
            .collect();
        found.sort();
        Ok(found)
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}
