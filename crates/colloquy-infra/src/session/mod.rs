//! Session store selection.
//!
//! `[session] backend` picks between the durable `session_kv` table and a
//! process-local map for single-instance deployments and tests.

pub mod memory;

use std::time::Duration;

use colloquy_core::storage::session_store::SessionStore;
use colloquy_types::config::SessionBackend;
use colloquy_types::error::RepositoryError;

use self::memory::MemorySessionStore;
use crate::sqlite::pool::DatabasePool;
use crate::sqlite::session::SqliteSessionStore;

/// The session store chosen by configuration.
pub enum AnySessionStore {
    Sqlite(SqliteSessionStore),
    Memory(MemorySessionStore),
}

impl AnySessionStore {
    pub fn for_backend(backend: SessionBackend, pool: DatabasePool) -> Self {
        match backend {
            SessionBackend::Sqlite => AnySessionStore::Sqlite(SqliteSessionStore::new(pool)),
            SessionBackend::Memory => AnySessionStore::Memory(MemorySessionStore::new()),
        }
    }

    pub fn backend(&self) -> SessionBackend {
        match self {
            AnySessionStore::Sqlite(_) => SessionBackend::Sqlite,
            AnySessionStore::Memory(_) => SessionBackend::Memory,
        }
    }
}

impl SessionStore for AnySessionStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RepositoryError> {
        match self {
            AnySessionStore::Sqlite(s) => s.put(key, value, ttl).await,
            AnySessionStore::Memory(s) => s.put(key, value, ttl).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        match self {
            AnySessionStore::Sqlite(s) => s.get(key).await,
            AnySessionStore::Memory(s) => s.get(key).await,
        }
    }

    async fn take(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        match self {
            AnySessionStore::Sqlite(s) => s.take(key).await,
            AnySessionStore::Memory(s) => s.take(key).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        match self {
            AnySessionStore::Sqlite(s) => s.delete(key).await,
            AnySessionStore::Memory(s) => s.delete(key).await,
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, RepositoryError> {
        match self {
            AnySessionStore::Sqlite(s) => s.scan_prefix(prefix).await,
            AnySessionStore::Memory(s) => s.scan_prefix(prefix).await,
        }
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        match self {
            AnySessionStore::Sqlite(s) => s.purge_expired().await,
            AnySessionStore::Memory(s) => s.purge_expired().await,
        }
    }
}
