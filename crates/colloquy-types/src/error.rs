use thiserror::Error;

use crate::llm::ProviderError;

/// Errors from repository operations (used by trait definitions in colloquy-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Caller-visible failures of a chat turn.
///
/// Internal causes are carried as strings for logging; handlers render only
/// the variant's class to the client.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("canvas not found")]
    CanvasNotFound,

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("failed to persist user message: {0}")]
    PersistFailed(String),

    #[error("model resolution failed: {0}")]
    ModelResolution(String),

    #[error("upstream provider failed: {0}")]
    Upstream(#[from] ProviderError),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Failures at the authentication boundary.
///
/// `InvalidCredentials`, `InvalidRefreshToken` and `Unauthorized` are the
/// only classes a client ever learns about; which check failed stays in logs.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("unauthorized")]
    Unauthorized,

    #[error("email '{0}' is already registered")]
    EmailTaken(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("token error: {0}")]
    Token(String),

    #[error("password hashing error: {0}")]
    Hashing(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        AuthError::Storage(err.to_string())
    }
}
