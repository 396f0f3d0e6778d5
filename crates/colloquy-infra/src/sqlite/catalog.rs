//! SQLite model catalog: model records and provider API keys.
//!
//! Implements `ModelCatalog` from `colloquy-core` for the read side, plus
//! the write operations the CLI uses to seed the catalog.

use chrono::Utc;
use colloquy_core::llm::catalog::ModelCatalog;
use colloquy_types::error::RepositoryError;
use colloquy_types::llm::ModelParams;
use colloquy_types::model::{ApiKeyRecord, CatalogStatus, ModelRecord};
use secrecy::{ExposeSecret, SecretString};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, map_write_error, parse_datetime, parse_uuid};

/// SQLite-backed implementation of `ModelCatalog`.
pub struct SqliteModelCatalog {
    pool: DatabasePool,
}

impl SqliteModelCatalog {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a model record by id.
    pub async fn upsert_model(&self, model: &ModelRecord) -> Result<(), RepositoryError> {
        let params = serde_json::to_string(&model.params)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize params: {e}")))?;

        sqlx::query(
            r#"INSERT INTO models (id, provider_id, vendor_model, name, params, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (id) DO UPDATE SET
                   provider_id = excluded.provider_id,
                   vendor_model = excluded.vendor_model,
                   name = excluded.name,
                   params = excluded.params,
                   status = excluded.status,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&model.id)
        .bind(&model.provider_id)
        .bind(&model.vendor_model)
        .bind(&model.name)
        .bind(&params)
        .bind(model.status.to_string())
        .bind(format_datetime(&model.created_at))
        .bind(format_datetime(&model.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        info!(model_id = %model.id, provider = %model.provider_id, "model record saved");
        Ok(())
    }

    /// Store a new active API key for a provider.
    pub async fn add_api_key(
        &self,
        provider_id: &str,
        name: &str,
        secret: &SecretString,
    ) -> Result<ApiKeyRecord, RepositoryError> {
        let record = ApiKeyRecord {
            id: Uuid::now_v7(),
            provider_id: provider_id.to_string(),
            name: name.to_string(),
            status: CatalogStatus::Active,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"INSERT INTO provider_api_keys (id, provider_id, name, secret, status, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.provider_id)
        .bind(&record.name)
        .bind(secret.expose_secret())
        .bind(record.status.to_string())
        .bind(format_datetime(&record.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        info!(key_id = %record.id, provider = %record.provider_id, "API key stored");
        Ok(record)
    }

    /// Mark a key inactive. Returns `NotFound` for an unknown id.
    pub async fn deactivate_api_key(&self, id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE provider_api_keys SET status = 'inactive' WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// All model records ordered by id.
    pub async fn list_models(&self) -> Result<Vec<ModelRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM models ORDER BY id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut models = Vec::with_capacity(rows.len());
        for row in &rows {
            let model_row =
                ModelRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            models.push(model_row.into_model()?);
        }
        Ok(models)
    }

    /// Metadata of every key of a provider, newest first. Secrets excluded.
    pub async fn list_api_keys(&self, provider_id: &str) -> Result<Vec<ApiKeyRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, provider_id, name, status, created_at FROM provider_api_keys WHERE provider_id = ? ORDER BY created_at DESC",
        )
        .bind(provider_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(|e| RepositoryError::Query(e.to_string()))?;
            let provider_id: String = row
                .try_get("provider_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let name: String = row.try_get("name").map_err(|e| RepositoryError::Query(e.to_string()))?;
            let status: String = row
                .try_get("status")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let created_at: String = row
                .try_get("created_at")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            keys.push(ApiKeyRecord {
                id: parse_uuid(&id, "key id")?,
                provider_id,
                name,
                status: status.parse().map_err(RepositoryError::Query)?,
                created_at: parse_datetime(&created_at)?,
            });
        }
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ModelRow {
    id: String,
    provider_id: String,
    vendor_model: String,
    name: String,
    params: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl ModelRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            provider_id: row.try_get("provider_id")?,
            vendor_model: row.try_get("vendor_model")?,
            name: row.try_get("name")?,
            params: row.try_get("params")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_model(self) -> Result<ModelRecord, RepositoryError> {
        // Unknown or mistyped options in stored params are dropped.
        let params = serde_json::from_str::<serde_json::Value>(&self.params)
            .map(|v| ModelParams::from_json_lenient(&v))
            .unwrap_or_default();

        Ok(ModelRecord {
            id: self.id,
            provider_id: self.provider_id,
            vendor_model: self.vendor_model,
            name: self.name,
            params,
            status: self.status.parse().map_err(RepositoryError::Query)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ModelCatalog implementation
// ---------------------------------------------------------------------------

impl ModelCatalog for SqliteModelCatalog {
    async fn get_model(&self, id: &str) -> Result<Option<ModelRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM models WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let model_row =
                    ModelRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(model_row.into_model()?))
            }
            None => Ok(None),
        }
    }

    async fn active_api_key(&self, provider_id: &str) -> Result<Option<SecretString>, RepositoryError> {
        let secret: Option<String> = sqlx::query_scalar(
            r#"SELECT secret FROM provider_api_keys
               WHERE provider_id = ? AND status = 'active'
               ORDER BY created_at DESC, id DESC
               LIMIT 1"#,
        )
        .bind(provider_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(secret.map(SecretString::from))
    }
}
