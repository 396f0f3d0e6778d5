//! SQLite user repository implementation.

use colloquy_core::auth::repository::UserRepository;
use colloquy_types::auth::{User, UserStatus};
use colloquy_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, map_write_error, parse_datetime, parse_uuid};

/// SQLite-backed implementation of `UserRepository`.
pub struct SqliteUserRepository {
    pool: DatabasePool,
}

impl SqliteUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub async fn set_status(&self, id: &Uuid, status: UserStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(format_datetime(&chrono::Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

struct UserRow {
    id: String,
    tenant_id: String,
    email: String,
    password_hash: String,
    name: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            name: row.try_get("name")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_user(self) -> Result<User, RepositoryError> {
        Ok(User {
            id: parse_uuid(&self.id, "user id")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant_id")?,
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            status: self.status.parse().map_err(RepositoryError::Query)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl SqliteUserRepository {
    async fn fetch_one_user<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<Option<User>, RepositoryError> {
        let row = query
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let user_row =
                    UserRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(user_row.into_user()?))
            }
            None => Ok(None),
        }
    }
}

impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO users (id, tenant_id, email, password_hash, name, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(user.tenant_id.to_string())
        .bind(user.email.to_lowercase())
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.status.to_string())
        .bind(format_datetime(&user.created_at))
        .bind(format_datetime(&user.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_user(&self, id: &Uuid) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_user(sqlx::query("SELECT * FROM users WHERE id = ?").bind(id.to_string()))
            .await
    }

    async fn get_user_by_email(
        &self,
        tenant_id: &Uuid,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_user(
            sqlx::query("SELECT * FROM users WHERE tenant_id = ? AND email = ?")
                .bind(tenant_id.to_string())
                .bind(email.to_lowercase()),
        )
        .await
    }
}
