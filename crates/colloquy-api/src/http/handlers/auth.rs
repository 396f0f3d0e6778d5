//! Authentication HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/auth/register - Create an account and log it in
//! - POST /api/v1/auth/login    - Exchange credentials for a token pair
//! - POST /api/v1/auth/refresh  - Rotate a refresh token
//! - POST /api/v1/auth/logout   - Revoke a refresh token
//! - GET  /api/v1/auth/sessions - List the caller's live sessions

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use colloquy_types::auth::{
    LoginRequest, RefreshRequest, RegisterRequest, SessionRecord, TokenPair,
};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthenticatedUser;
use crate::http::extractors::client::Client;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Client(client): Client,
    Json(body): Json<RegisterRequest>,
) -> Result<ApiResponse<TokenPair>, AppError> {
    let start = Instant::now();
    let pair = state.sessions.register(&body, &client).await?;
    Ok(ApiResponse::created(pair, start))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Client(client): Client,
    Json(body): Json<LoginRequest>,
) -> Result<ApiResponse<TokenPair>, AppError> {
    let start = Instant::now();
    let pair = state.sessions.login(&body, &client).await?;
    Ok(ApiResponse::success(pair, start))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<ApiResponse<TokenPair>, AppError> {
    let start = Instant::now();
    let pair = state.sessions.refresh(&body.refresh_token).await?;
    Ok(ApiResponse::success(pair, start))
}

/// POST /api/v1/auth/logout
///
/// Idempotent: an unknown or already revoked token still succeeds.
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<ApiResponse<LogoutResponse>, AppError> {
    let start = Instant::now();
    state.sessions.logout(&body.refresh_token).await?;
    Ok(ApiResponse::success(LogoutResponse { logged_out: true }, start))
}

/// GET /api/v1/auth/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<ApiResponse<Vec<SessionRecord>>, AppError> {
    let start = Instant::now();
    let sessions = state.sessions.list_sessions(&identity.user_id).await?;
    Ok(ApiResponse::success(sessions, start))
}
