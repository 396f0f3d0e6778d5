//! In-memory fakes shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::StreamExt;
use secrecy::SecretString;
use uuid::Uuid;

use colloquy_types::auth::{AccessClaims, RefreshClaims, User, UserStatus};
use colloquy_types::chat::{
    Canvas, CanvasFilter, CanvasKind, CanvasStatus, ChatMessage, MessageRole,
};
use colloquy_types::error::{AuthError, RepositoryError};
use colloquy_types::llm::{Message, ModelParams, ProviderError, StreamEvent};
use colloquy_types::model::{CatalogStatus, ModelRecord};

use crate::auth::credentials::{IssuedToken, PasswordHasher, TokenIssuer};
use crate::auth::repository::UserRepository;
use crate::chat::repository::ChatStore;
use crate::llm::box_provider::BoxChatProvider;
use crate::llm::catalog::ModelCatalog;
use crate::llm::provider::{ChatProvider, ProviderStream};
use crate::storage::session_store::SessionStore;

// --- Chat store ---

/// Tenant that seeded canvases and test identities share.
pub const TEST_TENANT: Uuid = Uuid::from_u128(0x7e57);

#[derive(Default)]
pub struct InMemoryChatStore {
    canvases: Mutex<HashMap<Uuid, Canvas>>,
    messages: Mutex<Vec<ChatMessage>>,
    failing_roles: Mutex<HashSet<MessageRole>>,
    failing_reads: AtomicBool,
}

impl InMemoryChatStore {
    pub fn fail_writes_for(&self, role: MessageRole) {
        self.failing_roles.lock().unwrap().insert(role);
    }

    pub fn fail_reads(&self) {
        self.failing_reads.store(true, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count_role(&self, role: MessageRole) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.role == role)
            .count()
    }

    /// Insert a message directly, bypassing parent validation.
    pub fn seed_message(&self, message: ChatMessage) {
        self.messages.lock().unwrap().push(message);
    }

    pub fn seed_canvas(&self, model_id: Option<&str>) -> Canvas {
        self.seed_canvas_in(TEST_TENANT, model_id)
    }

    pub fn seed_canvas_in(&self, tenant_id: Uuid, model_id: Option<&str>) -> Canvas {
        let now = Utc::now();
        let canvas = Canvas {
            id: Uuid::now_v7(),
            tenant_id,
            workspace_id: Uuid::now_v7(),
            title: "test canvas".to_string(),
            description: None,
            kind: CanvasKind::Chat,
            status: CanvasStatus::Active,
            model_id: model_id.map(str::to_string),
            created_by: Uuid::now_v7(),
            created_at: now,
            updated_at: now,
        };
        self.canvases
            .lock()
            .unwrap()
            .insert(canvas.id, canvas.clone());
        canvas
    }
}

impl ChatStore for InMemoryChatStore {
    fn create_canvas(
        &self,
        canvas: &Canvas,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        self.canvases
            .lock()
            .unwrap()
            .insert(canvas.id, canvas.clone());
        async { Ok(()) }
    }

    fn get_canvas(
        &self,
        id: &Uuid,
    ) -> impl Future<Output = Result<Option<Canvas>, RepositoryError>> + Send {
        let found = self.canvases.lock().unwrap().get(id).cloned();
        async move { Ok(found) }
    }

    fn list_canvases(
        &self,
        filter: &CanvasFilter,
        offset: u64,
        limit: u64,
    ) -> impl Future<Output = Result<(Vec<Canvas>, u64), RepositoryError>> + Send {
        let mut all: Vec<Canvas> = self
            .canvases
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.tenant_id == filter.tenant_id && c.workspace_id == filter.workspace_id)
            .filter(|c| filter.kind.is_none_or(|k| c.kind == k))
            .cloned()
            .collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        let total = all.len() as u64;
        let page = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        async move { Ok((page, total)) }
    }

    fn update_canvas(
        &self,
        canvas: &Canvas,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let result = match self.canvases.lock().unwrap().get_mut(&canvas.id) {
            Some(existing) => {
                *existing = canvas.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        };
        async move { result }
    }

    fn delete_canvas(&self, id: &Uuid) -> impl Future<Output = Result<bool, RepositoryError>> + Send {
        let existed = self.canvases.lock().unwrap().remove(id).is_some();
        if existed {
            self.messages.lock().unwrap().retain(|m| m.canvas_id != *id);
        }
        async move { Ok(existed) }
    }

    fn create_message(
        &self,
        message: &ChatMessage,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let result = if self.failing_roles.lock().unwrap().contains(&message.role) {
            Err(RepositoryError::Query("injected write failure".to_string()))
        } else {
            let mut messages = self.messages.lock().unwrap();
            let parent_ok = message.parent_id.is_none_or(|pid| {
                messages
                    .iter()
                    .any(|m| m.id == pid && m.canvas_id == message.canvas_id)
            });
            if parent_ok {
                messages.push(message.clone());
                Ok(())
            } else {
                Err(RepositoryError::Conflict(
                    "parent message not in canvas".to_string(),
                ))
            }
        };
        async move { result }
    }

    fn get_message(
        &self,
        id: &Uuid,
    ) -> impl Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send {
        let result = if self.failing_reads.load(Ordering::SeqCst) {
            Err(RepositoryError::Connection)
        } else {
            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .find(|m| m.id == *id)
                .cloned())
        };
        async move { result }
    }

    fn list_messages(
        &self,
        canvas_id: &Uuid,
        offset: u64,
        limit: u64,
    ) -> impl Future<Output = Result<(Vec<ChatMessage>, u64), RepositoryError>> + Send {
        let all: Vec<ChatMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.canvas_id == *canvas_id)
            .cloned()
            .collect();
        let total = all.len() as u64;
        let page = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        async move { Ok((page, total)) }
    }
}

// --- Model catalog ---

#[derive(Default)]
pub struct InMemoryCatalog {
    models: Mutex<HashMap<String, ModelRecord>>,
    keys: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl InMemoryCatalog {
    /// Every lookup fails as if the database were down.
    pub fn unavailable(self) -> Self {
        self.unavailable.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_model(self, id: &str, provider_id: &str, vendor_model: &str) -> Self {
        let now = Utc::now();
        self.models.lock().unwrap().insert(
            id.to_string(),
            ModelRecord {
                id: id.to_string(),
                provider_id: provider_id.to_string(),
                vendor_model: vendor_model.to_string(),
                name: id.to_string(),
                params: ModelParams::default(),
                status: CatalogStatus::Active,
                created_at: now,
                updated_at: now,
            },
        );
        self
    }

    pub fn with_key(self, provider_id: &str, key: &str) -> Self {
        self.keys
            .lock()
            .unwrap()
            .insert(provider_id.to_string(), key.to_string());
        self
    }

    pub fn deactivate(&self, id: &str) {
        if let Some(model) = self.models.lock().unwrap().get_mut(id) {
            model.status = CatalogStatus::Inactive;
        }
    }
}

impl ModelCatalog for InMemoryCatalog {
    fn get_model(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ModelRecord>, RepositoryError>> + Send {
        let result = if self.unavailable.load(Ordering::SeqCst) {
            Err(RepositoryError::Query("disk I/O error".to_string()))
        } else {
            Ok(self.models.lock().unwrap().get(id).cloned())
        };
        async move { result }
    }

    fn active_api_key(
        &self,
        provider_id: &str,
    ) -> impl Future<Output = Result<Option<SecretString>, RepositoryError>> + Send {
        let found = self
            .keys
            .lock()
            .unwrap()
            .get(provider_id)
            .map(|k| SecretString::from(k.clone()));
        async move { Ok(found) }
    }
}

// --- Scripted provider ---

/// How a scripted stream ends after its deltas.
#[derive(Clone)]
pub enum Ending {
    Complete,
    /// Completes with this tail appended beyond the last partial.
    CompleteWithTail(String),
    Truncate(String),
    /// Never ends; used to exercise cancellation.
    Hang,
}

/// Provider that replays a fixed list of deltas.
pub struct ScriptedProvider {
    models: Vec<String>,
    deltas: Vec<String>,
    ending: Ending,
    open_error: bool,
    pub received: Arc<Mutex<Vec<Vec<Message>>>>,
    pub released: Arc<AtomicBool>,
    pub opened: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(deltas: &[&str], ending: Ending) -> Self {
        Self {
            models: vec!["scripted-1".to_string()],
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            ending,
            open_error: false,
            received: Arc::new(Mutex::new(Vec::new())),
            released: Arc::new(AtomicBool::new(false)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_to_open() -> Self {
        Self {
            open_error: true,
            ..Self::new(&[], Ending::Complete)
        }
    }
}

struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supported_models(&self) -> &[String] {
        &self.models
    }

    fn call_once(
        &self,
        model: &str,
        messages: &[Message],
        _params: &ModelParams,
    ) -> impl Future<Output = Result<Message, ProviderError>> + Send {
        let supported = self.supports(model);
        let model = model.to_string();
        self.received.lock().unwrap().push(messages.to_vec());
        let answer = self.deltas.concat();
        let open_error = self.open_error;
        async move {
            if !supported {
                return Err(ProviderError::ModelNotSupported(model));
            }
            if open_error {
                return Err(ProviderError::UpstreamCallFailed("vendor down".into()));
            }
            if answer.is_empty() {
                return Err(ProviderError::EmptyUpstreamResponse);
            }
            Ok(Message::assistant(answer))
        }
    }

    fn open_stream(
        &self,
        model: &str,
        messages: Vec<Message>,
        _params: ModelParams,
    ) -> impl Future<Output = Result<ProviderStream, ProviderError>> + Send {
        let supported = self.supports(model);
        let model = model.to_string();
        self.received.lock().unwrap().push(messages);
        self.opened.fetch_add(1, Ordering::SeqCst);
        let deltas = self.deltas.clone();
        let ending = self.ending.clone();
        let open_error = self.open_error;
        let guard = ReleaseGuard(Arc::clone(&self.released));
        async move {
            if !supported {
                return Err(ProviderError::ModelNotSupported(model));
            }
            if open_error {
                return Err(ProviderError::UpstreamCallFailed("vendor down".into()));
            }
            let stream = async_stream::stream! {
                let _guard = guard;
                let mut content = String::new();
                for delta in deltas {
                    content.push_str(&delta);
                    yield StreamEvent::Partial { content: content.clone() };
                }
                match ending {
                    Ending::Complete => {
                        yield StreamEvent::Completed { content };
                    }
                    Ending::CompleteWithTail(tail) => {
                        content.push_str(&tail);
                        yield StreamEvent::Completed { content };
                    }
                    Ending::Truncate(reason) => {
                        yield StreamEvent::Truncated { content, reason };
                    }
                    Ending::Hang => {
                        futures_util::stream::pending::<()>().next().await;
                    }
                }
            };
            Ok(Box::pin(stream) as ProviderStream)
        }
    }
}

pub fn boxed(provider: ScriptedProvider) -> BoxChatProvider {
    BoxChatProvider::new(provider)
}

// --- Session store ---

#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    failing_prefixes: Mutex<Vec<String>>,
}

impl InMemorySessionStore {
    pub fn fail_puts_with_prefix(&self, prefix: &str) {
        self.failing_prefixes
            .lock()
            .unwrap()
            .push(prefix.to_string());
    }

    pub fn raw_get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .filter(|(_, exp)| *exp > Instant::now())
            .map(|(v, _)| v.clone())
    }
}

impl SessionStore for InMemorySessionStore {
    fn put(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let failing = self
            .failing_prefixes
            .lock()
            .unwrap()
            .iter()
            .any(|p| key.starts_with(p.as_str()));
        let result = if failing {
            Err(RepositoryError::Connection)
        } else {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
            Ok(())
        };
        async move { result }
    }

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send {
        let found = self.raw_get(key);
        async move { Ok(found) }
    }

    fn take(&self, key: &str) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send {
        let taken = self
            .entries
            .lock()
            .unwrap()
            .remove(key)
            .filter(|(_, exp)| *exp > Instant::now())
            .map(|(v, _)| v);
        async move { Ok(taken) }
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        self.entries.lock().unwrap().remove(key);
        async { Ok(()) }
    }

    fn scan_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<(String, String)>, RepositoryError>> + Send {
        let now = Instant::now();
        let found: Vec<(String, String)> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, (_, exp))| k.starts_with(prefix) && *exp > now)
            .map(|(k, (v, _))| (k.clone(), v.clone()))
            .collect();
        async move { Ok(found) }
    }

    fn purge_expired(&self) -> impl Future<Output = Result<u64, RepositoryError>> + Send {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, (_, exp)| *exp > now);
        let purged = (before - entries.len()) as u64;
        async move { Ok(purged) }
    }
}

// --- Users and credentials ---

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<Vec<User>>,
}

impl InMemoryUsers {
    pub fn insert(&self, tenant_id: Uuid, email: &str, password: &str, status: UserStatus) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            tenant_id,
            email: email.to_string(),
            password_hash: PlainHasher.hash(password).unwrap(),
            name: "Test User".to_string(),
            status,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn set_status(&self, id: &Uuid, status: UserStatus) {
        if let Some(user) = self.users.lock().unwrap().iter_mut().find(|u| u.id == *id) {
            user.status = status;
        }
    }
}

impl UserRepository for InMemoryUsers {
    fn create_user(&self, user: &User) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let mut users = self.users.lock().unwrap();
        let result = if users
            .iter()
            .any(|u| u.tenant_id == user.tenant_id && u.email.eq_ignore_ascii_case(&user.email))
        {
            Err(RepositoryError::Conflict("email taken".to_string()))
        } else {
            users.push(user.clone());
            Ok(())
        };
        async move { result }
    }

    fn get_user(&self, id: &Uuid) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send {
        let found = self.users.lock().unwrap().iter().find(|u| u.id == *id).cloned();
        async move { Ok(found) }
    }

    fn get_user_by_email(
        &self,
        tenant_id: &Uuid,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send {
        let found = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.tenant_id == *tenant_id && u.email.eq_ignore_ascii_case(email))
            .cloned();
        async move { Ok(found) }
    }
}

/// Hashes by prefixing; only for tests.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        hash.strip_prefix("plain:") == Some(password)
    }
}

/// `PlainHasher` that counts `verify` calls.
#[derive(Default)]
pub struct CountingHasher {
    verified: AtomicUsize,
}

impl CountingHasher {
    pub fn verifications(&self) -> usize {
        self.verified.load(Ordering::SeqCst)
    }
}

impl PasswordHasher for CountingHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        PlainHasher.hash(password)
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        self.verified.fetch_add(1, Ordering::SeqCst);
        PlainHasher.verify(password, hash)
    }
}

/// Opaque-token issuer that remembers what it issued.
#[derive(Default)]
pub struct FakeTokens {
    access: Mutex<HashMap<String, AccessClaims>>,
    refresh: Mutex<HashMap<String, RefreshClaims>>,
}

impl TokenIssuer for FakeTokens {
    fn issue_access(&self, user: &User) -> Result<IssuedToken, AuthError> {
        let token = format!("access-{}", Uuid::now_v7());
        let expires_at = Utc::now() + chrono::Duration::hours(1);
        self.access.lock().unwrap().insert(
            token.clone(),
            AccessClaims {
                user_id: user.id,
                tenant_id: user.tenant_id,
                email: user.email.clone(),
                exp: expires_at.timestamp(),
                iat: Utc::now().timestamp(),
            },
        );
        Ok(IssuedToken { token, expires_at })
    }

    fn issue_refresh(&self, user: &User) -> Result<IssuedToken, AuthError> {
        let jti = Uuid::now_v7();
        let token = format!("refresh-{jti}");
        let expires_at = Utc::now() + chrono::Duration::days(7);
        self.refresh.lock().unwrap().insert(
            token.clone(),
            RefreshClaims {
                user_id: user.id,
                tenant_id: user.tenant_id,
                exp: expires_at.timestamp(),
                iat: Utc::now().timestamp(),
                jti,
                kind: RefreshClaims::KIND.to_string(),
            },
        );
        Ok(IssuedToken { token, expires_at })
    }

    fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.access
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }

    fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        self.refresh
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }

    fn access_ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }

    fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(7 * 24 * 3600)
    }
}
