//! SQLite session store implementation.
//!
//! Implements `SessionStore` from `colloquy-core` on the `session_kv` table.
//! Expiry is stored as unix milliseconds; expired rows are filtered on every
//! read and removed by `purge_expired`.

use std::time::Duration;

use chrono::Utc;
use colloquy_core::storage::session_store::SessionStore;
use colloquy_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry_millis(ttl: Duration) -> i64 {
    now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

impl SessionStore for SqliteSessionStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO session_kv (key, value, expires_at) VALUES (?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_millis(ttl))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        sqlx::query_scalar("SELECT value FROM session_kv WHERE key = ? AND expires_at > ?")
            .bind(key)
            .bind(now_millis())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        // One statement on the single writer connection: of two concurrent
        // takes, only one sees the row.
        let row = sqlx::query("DELETE FROM session_kv WHERE key = ? RETURNING value, expires_at")
            .bind(key)
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let expires_at: i64 = row
            .try_get("expires_at")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        if expires_at <= now_millis() {
            return Ok(None);
        }
        let value: String = row
            .try_get("value")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(Some(value))
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM session_kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, RepositoryError> {
        // substr avoids LIKE wildcard escaping in user-controlled prefixes.
        let rows = sqlx::query(
            r#"SELECT key, value FROM session_kv
               WHERE substr(key, 1, ?1) = ?2 AND expires_at > ?3
               ORDER BY key"#,
        )
        .bind(prefix.chars().count() as i64)
        .bind(prefix)
        .bind(now_millis())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let key: String = row.try_get("key").map_err(|e| RepositoryError::Query(e.to_string()))?;
            let value: String = row
                .try_get("value")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM session_kv WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn test_store() -> SqliteSessionStore {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        SqliteSessionStore::new(DatabasePool::new(&url).await.unwrap())
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = test_store().await;
        store.put("refresh_token:abc", "user-1", HOUR).await.unwrap();
        assert_eq!(store.get("refresh_token:abc").await.unwrap().as_deref(), Some("user-1"));

        store.put("refresh_token:abc", "user-2", HOUR).await.unwrap();
        assert_eq!(store.get("refresh_token:abc").await.unwrap().as_deref(), Some("user-2"));

        store.delete("refresh_token:abc").await.unwrap();
        store.delete("refresh_token:abc").await.unwrap();
        assert!(store.get("refresh_token:abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = test_store().await;
        store.put("k", "v", HOUR).await.unwrap();
        assert_eq!(store.take("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.take("k").await.unwrap().is_none());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_take_has_one_winner() {
        let store = Arc::new(test_store().await);
        store.put("contended", "v", HOUR).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move { store.take("contended").await.unwrap() }));
        }
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_invisible_then_purged() {
        let store = test_store().await;
        store.put("session:old", "{}", Duration::ZERO).await.unwrap();
        store.put("session:new", "{}", HOUR).await.unwrap();

        assert!(store.get("session:old").await.unwrap().is_none());
        assert!(store.take("session:old").await.unwrap().is_none());

        store.put("session:stale", "{}", Duration::ZERO).await.unwrap();
        let live = store.scan_prefix("session:").await.unwrap();
        assert_eq!(live, vec![("session:new".to_string(), "{}".to_string())]);

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scan_prefix_treats_wildcards_literally() {
        let store = test_store().await;
        store.put("a%b:1", "x", HOUR).await.unwrap();
        store.put("axb:2", "y", HOUR).await.unwrap();

        let found = store.scan_prefix("a%b:").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "a%b:1");
    }
}
