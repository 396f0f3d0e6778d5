//! ModelCatalog trait: read side of the model and API key tables.

use secrecy::SecretString;

use colloquy_types::error::RepositoryError;
use colloquy_types::model::ModelRecord;

/// Lookup of model records and provider credentials.
///
/// Implementations live in colloquy-infra (e.g., `SqliteModelCatalog`).
pub trait ModelCatalog: Send + Sync {
    /// Get a model record by its record id. Inactive records are returned
    /// too; callers decide what to do with them.
    fn get_model(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ModelRecord>, RepositoryError>> + Send;

    /// The newest active API key of a provider, if any.
    fn active_api_key(
        &self,
        provider_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<SecretString>, RepositoryError>> + Send;
}
