//! UserRepository trait definition.

use colloquy_types::auth::User;
use colloquy_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for user accounts.
///
/// Implementations live in colloquy-infra (e.g., `SqliteUserRepository`).
pub trait UserRepository: Send + Sync {
    /// Create a user. Fails with `RepositoryError::Conflict` when the email
    /// is already taken within the tenant.
    fn create_user(
        &self,
        user: &User,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_user(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Look up a user by email within one tenant. Emails are matched
    /// case-insensitively.
    fn get_user_by_email(
        &self,
        tenant_id: &Uuid,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;
}
