//! Bearer access token authentication extractor.
//!
//! Extracts the token from `Authorization: Bearer <token>` and verifies it
//! statelessly through the session manager. Any failure is the same 401.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use colloquy_types::auth::Identity;
use colloquy_types::error::AuthError;

use crate::http::error::AppError;
use crate::state::AppState;

/// The caller behind a valid access token.
pub struct AuthenticatedUser(pub Identity);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Auth(AuthError::Unauthorized))?;
        let identity = state.sessions.verify_access(token)?;
        Ok(AuthenticatedUser(identity))
    }
}

/// The token of an `Authorization: Bearer <token>` header, if present.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
