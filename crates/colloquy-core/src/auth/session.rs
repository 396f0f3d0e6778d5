//! Login, refresh rotation, logout and access verification.
//!
//! Two keys per live session, both with the refresh lifetime:
//! `refresh_token:<token>` maps to the user id and decides whether a refresh
//! token is still usable; `session:<token>` holds the display record.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use colloquy_types::auth::{
    ClientInfo, Identity, LoginRequest, RegisterRequest, SessionRecord, TokenPair, User,
    UserStatus,
};
use colloquy_types::error::{AuthError, RepositoryError};

use crate::auth::credentials::{PasswordHasher, TokenIssuer};
use crate::auth::repository::UserRepository;
use crate::storage::session_store::SessionStore;

const REFRESH_PREFIX: &str = "refresh_token:";
const SESSION_PREFIX: &str = "session:";

/// Minimum accepted password length at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hashed once at startup; unknown emails are verified against it so that
/// they cost as much as a wrong password.
const DUMMY_PASSWORD: &str = "colloquy-unknown-account";

fn refresh_key(token: &str) -> String {
    format!("{REFRESH_PREFIX}{token}")
}

fn session_key(token: &str) -> String {
    format!("{SESSION_PREFIX}{token}")
}

/// Owns the session store. Nothing else reads or writes session keys.
pub struct SessionManager<S: SessionStore, U: UserRepository> {
    store: Arc<S>,
    users: Arc<U>,
    tokens: Arc<dyn TokenIssuer>,
    passwords: Arc<dyn PasswordHasher>,
    dummy_hash: String,
}

impl<S: SessionStore, U: UserRepository> SessionManager<S, U> {
    pub fn new(
        store: Arc<S>,
        users: Arc<U>,
        tokens: Arc<dyn TokenIssuer>,
        passwords: Arc<dyn PasswordHasher>,
    ) -> Self {
        let dummy_hash = passwords.hash(DUMMY_PASSWORD).unwrap_or_else(|e| {
            warn!(error = %e, "failed to precompute dummy password hash");
            String::new()
        });
        Self {
            store,
            users,
            tokens,
            passwords,
            dummy_hash,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // --- Login / registration ---

    /// Authenticate with email and password.
    ///
    /// Unknown email, inactive account and wrong password all yield
    /// `InvalidCredentials`, and each runs one password verification.
    pub async fn login(
        &self,
        request: &LoginRequest,
        client: &ClientInfo,
    ) -> Result<TokenPair, AuthError> {
        let user = self
            .users
            .get_user_by_email(&request.tenant_id, request.email.trim())
            .await?;

        let hash = user.as_ref().map_or(self.dummy_hash.as_str(), |u| u.password_hash.as_str());
        let password_ok = self.passwords.verify(&request.password, hash);

        let Some(user) = user else {
            debug!(tenant_id = %request.tenant_id, "login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if user.status != UserStatus::Active {
            debug!(user_id = %user.id, status = %user.status, "login for non-active user");
            return Err(AuthError::InvalidCredentials);
        }
        if !password_ok {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let record = SessionRecord {
            user_id: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
            name: user.name.clone(),
            ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            login_at: now,
            last_activity: now,
        };
        let pair = self.open_session(&user, &record).await?;
        info!(user_id = %user.id, tenant_id = %user.tenant_id, "user logged in");
        Ok(pair)
    }

    /// Create an active account and log it in.
    pub async fn register(
        &self,
        request: &RegisterRequest,
        client: &ClientInfo,
    ) -> Result<TokenPair, AuthError> {
        let email = request.email.trim().to_lowercase();
        if !is_plausible_email(&email) {
            return Err(AuthError::Validation("invalid email address".to_string()));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("name must not be empty".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            tenant_id: request.tenant_id,
            email: email.clone(),
            password_hash: self.passwords.hash(&request.password)?,
            name: name.to_string(),
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };

        match self.users.create_user(&user).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => return Err(AuthError::EmailTaken(email)),
            Err(other) => return Err(other.into()),
        }
        info!(user_id = %user.id, tenant_id = %user.tenant_id, "user registered");

        let login = LoginRequest {
            tenant_id: request.tenant_id,
            email,
            password: request.password.clone(),
        };
        self.login(&login, client).await
    }

    // --- Refresh rotation ---

    /// Exchange a refresh token for a new pair. The old token stops working.
    ///
    /// Taking the `refresh_token:` mapping is the linearization point: of
    /// two concurrent refreshes of one token, exactly one finds the mapping.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let mapped = self
            .store
            .take(&refresh_key(refresh_token))
            .await?
            .ok_or_else(|| {
                debug!(user_id = %claims.user_id, "refresh token has no live mapping");
                AuthError::InvalidRefreshToken
            })?;

        if mapped != claims.user_id.to_string() {
            warn!(user_id = %claims.user_id, "refresh mapping names a different user");
            return Err(AuthError::InvalidRefreshToken);
        }

        let user = self
            .users
            .get_user(&claims.user_id)
            .await?
            .filter(|u| u.status == UserStatus::Active)
            .ok_or(AuthError::InvalidRefreshToken)?;

        // Rotate the record, keeping where and when the session started.
        let now = Utc::now();
        let previous = self.take_session_record(refresh_token).await;
        let record = match previous {
            Some(old) => SessionRecord {
                email: user.email.clone(),
                name: user.name.clone(),
                last_activity: now,
                ..old
            },
            None => SessionRecord {
                user_id: user.id,
                tenant_id: user.tenant_id,
                email: user.email.clone(),
                name: user.name.clone(),
                ip: String::new(),
                user_agent: String::new(),
                login_at: now,
                last_activity: now,
            },
        };

        let pair = self.open_session(&user, &record).await?;
        info!(user_id = %user.id, "refresh token rotated");
        Ok(pair)
    }

    /// Revoke a refresh token. Unknown or already revoked tokens are fine.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.store.delete(&refresh_key(refresh_token)).await?;
        self.store.delete(&session_key(refresh_token)).await?;
        debug!("session revoked");
        Ok(())
    }

    // --- Request boundary ---

    /// Stateless check of an access token.
    pub fn verify_access(&self, access_token: &str) -> Result<Identity, AuthError> {
        let claims = self
            .tokens
            .verify_access(access_token)
            .map_err(|_| AuthError::Unauthorized)?;
        Ok(Identity {
            user_id: claims.user_id,
            tenant_id: claims.tenant_id,
            email: claims.email,
        })
    }

    /// Live sessions of a user, most recently active first.
    ///
    /// Best effort: records that fail to parse are skipped.
    pub async fn list_sessions(&self, user_id: &Uuid) -> Result<Vec<SessionRecord>, AuthError> {
        let entries = self.store.scan_prefix(SESSION_PREFIX).await?;
        let mut sessions: Vec<SessionRecord> = entries
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_str::<SessionRecord>(&value) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(key_len = key.len(), error = %err, "skipping unreadable session record");
                    None
                }
            })
            .filter(|record| record.user_id == *user_id)
            .collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(sessions)
    }

    /// Drop expired session keys. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let purged = self.store.purge_expired().await?;
        if purged > 0 {
            info!(purged, "expired session keys purged");
        }
        Ok(purged)
    }

    // --- Internals ---

    /// Issue a pair and write both session keys.
    ///
    /// The mapping write is what makes the refresh token usable, so its
    /// failure fails the call. The record is display data only.
    async fn open_session(&self, user: &User, record: &SessionRecord) -> Result<TokenPair, AuthError> {
        let access = self.tokens.issue_access(user)?;
        let refresh = self.tokens.issue_refresh(user)?;
        let ttl = self.tokens.refresh_ttl();

        self.store
            .put(&refresh_key(&refresh.token), &user.id.to_string(), ttl)
            .await
            .map_err(|err| {
                error!(user_id = %user.id, error = %err, "failed to store refresh mapping");
                AuthError::from(err)
            })?;

        match serde_json::to_string(record) {
            Ok(json) => {
                if let Err(err) = self.store.put(&session_key(&refresh.token), &json, ttl).await {
                    warn!(user_id = %user.id, error = %err, "failed to store session record");
                }
            }
            Err(err) => warn!(user_id = %user.id, error = %err, "failed to encode session record"),
        }

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: self.tokens.access_ttl().as_secs() as i64,
            token_type: "Bearer".to_string(),
            user: user.clone(),
        })
    }

    async fn take_session_record(&self, refresh_token: &str) -> Option<SessionRecord> {
        match self.store.take(&session_key(refresh_token)).await {
            Ok(Some(json)) => serde_json::from_str(&json)
                .inspect_err(|err| warn!(error = %err, "unreadable session record during refresh"))
                .ok(),
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "failed to read session record during refresh");
                None
            }
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}
