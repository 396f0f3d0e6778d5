//! HS256 JSON Web Tokens for access and refresh credentials.
//!
//! Implements the `TokenIssuer` trait from `colloquy-core` using the
//! `jsonwebtoken` crate. Access and refresh tokens share one signing secret;
//! their claim shapes differ so neither can be verified as the other.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use colloquy_core::auth::credentials::{IssuedToken, TokenIssuer};
use colloquy_types::auth::{AccessClaims, RefreshClaims, User};
use colloquy_types::error::AuthError;

/// `jsonwebtoken` implementation of `TokenIssuer`.
///
/// Does NOT derive Debug: it holds the signing keys.
pub struct JwtTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtTokenIssuer {
    pub fn new(secret: &SecretString, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Token(e.to_string()))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, jsonwebtoken::errors::Error> {
        decode::<T>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

fn expiry(ttl: Duration) -> Result<chrono::DateTime<Utc>, AuthError> {
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| AuthError::Token(e.to_string()))?;
    Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Token("token lifetime out of range".to_string()))
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue_access(&self, user: &User) -> Result<IssuedToken, AuthError> {
        let expires_at = expiry(self.access_ttl)?;
        let claims = AccessClaims {
            user_id: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
        };
        Ok(IssuedToken {
            token: self.sign(&claims)?,
            expires_at,
        })
    }

    fn issue_refresh(&self, user: &User) -> Result<IssuedToken, AuthError> {
        let expires_at = expiry(self.refresh_ttl)?;
        let claims = RefreshClaims {
            user_id: user.id,
            tenant_id: user.tenant_id,
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            jti: Uuid::now_v7(),
            kind: RefreshClaims::KIND.to_string(),
        };
        Ok(IssuedToken {
            token: self.sign(&claims)?,
            expires_at,
        })
    }

    fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.verify(token).map_err(|_| AuthError::Unauthorized)
    }

    fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let claims: RefreshClaims = self
            .verify(token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        if claims.kind != RefreshClaims::KIND {
            return Err(AuthError::InvalidRefreshToken);
        }
        Ok(claims)
    }

    fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}
