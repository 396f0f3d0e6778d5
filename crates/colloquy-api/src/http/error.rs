//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use colloquy_types::error::{AuthError, ChatError};

use crate::http::response::ApiResponse;

/// Client-facing messages for server-side failures. Causes go to the logs only.
const UPSTREAM_MESSAGE: &str = "The model provider failed to answer";
const STORAGE_MESSAGE: &str = "Storage is temporarily unavailable";

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Canvas and chat turn errors.
    Chat(ChatError),
    /// Login, registration and token errors.
    Auth(AuthError),
    /// Malformed request input outside the services (path ids, headers).
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(ChatError::CanvasNotFound) => {
                (StatusCode::NOT_FOUND, "CANVAS_NOT_FOUND", "Canvas not found".to_string())
            }
            AppError::Chat(ChatError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(ChatError::ModelResolution(msg)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "MODEL_RESOLUTION_FAILED",
                msg.clone(),
            ),
            AppError::Chat(ChatError::Upstream(_)) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", UPSTREAM_MESSAGE.to_string())
            }
            AppError::Chat(ChatError::PersistFailed(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSIST_FAILED",
                "The message could not be stored".to_string(),
            ),
            AppError::Chat(ChatError::Storage(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                STORAGE_MESSAGE.to_string(),
            ),
            AppError::Auth(
                AuthError::InvalidCredentials
                | AuthError::InvalidRefreshToken
                | AuthError::Unauthorized,
            ) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                auth_message(self).to_string(),
            ),
            AppError::Auth(AuthError::EmailTaken(email)) => (
                StatusCode::CONFLICT,
                "EMAIL_TAKEN",
                format!("Email '{email}' is already registered"),
            ),
            AppError::Auth(AuthError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Auth(AuthError::Token(_) | AuthError::Hashing(_) | AuthError::Storage(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_ERROR",
                "Authentication is temporarily unavailable".to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }

    /// The full internal cause, for logs only.
    fn cause(&self) -> String {
        match self {
            AppError::Chat(e) => e.to_string(),
            AppError::Auth(e) => e.to_string(),
            AppError::Validation(msg) | AppError::Internal(msg) => msg.clone(),
        }
    }
}

fn auth_message(err: &AppError) -> &'static str {
    match err {
        AppError::Auth(AuthError::InvalidCredentials) => "Invalid email or password",
        AppError::Auth(AuthError::InvalidRefreshToken) => "Invalid or expired refresh token",
        _ => "Missing, invalid or expired access token",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        match &self {
            AppError::Chat(ChatError::Upstream(e)) => {
                warn!(error = %e, "upstream provider error");
            }
            _ if status.is_server_error() => error!(code, error = %self.cause(), "request failed"),
            _ => {}
        }

        ApiResponse::error(status, code, &message).into_response()
    }
}
