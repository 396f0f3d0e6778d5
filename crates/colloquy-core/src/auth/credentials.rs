//! Token signing and password hashing seams.
//!
//! Defined in colloquy-core so the session manager can issue and verify
//! credentials without coupling to a JWT library or hash algorithm. The
//! `JwtTokenIssuer` and `Argon2PasswordHasher` adapters live in colloquy-infra.

use std::time::Duration;

use chrono::{DateTime, Utc};

use colloquy_types::auth::{AccessClaims, RefreshClaims, User};
use colloquy_types::error::AuthError;

/// A freshly signed token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies signed access and refresh tokens.
pub trait TokenIssuer: Send + Sync {
    fn issue_access(&self, user: &User) -> Result<IssuedToken, AuthError>;

    fn issue_refresh(&self, user: &User) -> Result<IssuedToken, AuthError>;

    /// Check signature and expiry of an access token.
    fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError>;

    /// Check signature, expiry and `type == "refresh"` of a refresh token.
    fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError>;

    fn access_ttl(&self) -> Duration;

    fn refresh_ttl(&self) -> Duration;
}

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// `false` for a wrong password and for an unparsable hash alike.
    fn verify(&self, password: &str, hash: &str) -> bool;
}
