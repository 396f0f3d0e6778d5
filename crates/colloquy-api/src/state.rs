//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over store and catalog traits, but AppState pins them
//! to the SQLite implementations, except for sessions, whose store follows
//! `[session] backend`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tracing::{info, warn};

use colloquy_core::auth::session::SessionManager;
use colloquy_core::chat::orchestrator::ChatOrchestrator;
use colloquy_core::chat::service::CanvasService;
use colloquy_core::llm::registry::ProviderRegistry;
use colloquy_infra::config::resolve_database_url;
use colloquy_infra::crypto::jwt::JwtTokenIssuer;
use colloquy_infra::crypto::password::Argon2PasswordHasher;
use colloquy_infra::llm::default_registry;
use colloquy_infra::session::AnySessionStore;
use colloquy_infra::sqlite::catalog::SqliteModelCatalog;
use colloquy_infra::sqlite::chat::SqliteChatStore;
use colloquy_infra::sqlite::pool::DatabasePool;
use colloquy_infra::sqlite::user::SqliteUserRepository;
use colloquy_types::config::AppConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteOrchestrator = ChatOrchestrator<SqliteChatStore, SqliteModelCatalog>;

pub type ConcreteCanvasService = CanvasService<SqliteChatStore>;

pub type ConcreteSessionManager = SessionManager<AnySessionStore, SqliteUserRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub canvases: Arc<ConcreteCanvasService>,
    pub sessions: Arc<ConcreteSessionManager>,
    pub catalog: Arc<SqliteModelCatalog>,
    pub registry: Arc<ProviderRegistry>,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

fn hours(h: i64) -> Duration {
    Duration::from_secs(u64::try_from(h.max(1)).unwrap_or(1) * 3600)
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init(data_dir: PathBuf, config: AppConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = resolve_database_url(&config, &data_dir);
        let db_pool = DatabasePool::new(&db_url).await?;

        if config.auth.uses_default_secret() {
            warn!("JWT_SECRET is not set; tokens are signed with the built-in development secret");
        }

        Ok(Self::build(db_pool, config, data_dir, token_lifetimes))
    }

    /// Wire services over an open pool.
    ///
    /// `ttls` maps the auth config to (access, refresh) lifetimes; tests use
    /// it to get second-scale expiry.
    pub fn build(
        db_pool: DatabasePool,
        config: AppConfig,
        data_dir: PathBuf,
        ttls: fn(&AppConfig) -> (Duration, Duration),
    ) -> Self {
        let (access_ttl, refresh_ttl) = ttls(&config);
        let chat_store = Arc::new(SqliteChatStore::new(db_pool.clone()));
        let catalog = Arc::new(SqliteModelCatalog::new(db_pool.clone()));
        let registry = Arc::new(default_registry(&config.providers));

        let orchestrator = ChatOrchestrator::new(
            Arc::clone(&chat_store),
            Arc::clone(&catalog),
            Arc::clone(&registry),
            &config.chat,
        );
        let canvases = CanvasService::new(chat_store, config.chat.welcome_message.clone());

        let signing_key = SecretString::from(config.auth.jwt_secret.clone());
        let session_store = AnySessionStore::for_backend(config.session.backend, db_pool.clone());
        info!(backend = ?session_store.backend(), "session store selected");
        let sessions = SessionManager::new(
            Arc::new(session_store),
            Arc::new(SqliteUserRepository::new(db_pool.clone())),
            Arc::new(JwtTokenIssuer::new(&signing_key, access_ttl, refresh_ttl)),
            Arc::new(Argon2PasswordHasher::new()),
        );

        Self {
            orchestrator: Arc::new(orchestrator),
            canvases: Arc::new(canvases),
            sessions: Arc::new(sessions),
            catalog,
            registry,
            config: Arc::new(config),
            data_dir,
            db_pool,
        }
    }
}

/// Token lifetimes from the `[auth]` section, in hours.
pub fn token_lifetimes(config: &AppConfig) -> (Duration, Duration) {
    (
        hours(config.auth.access_ttl_hours),
        hours(config.auth.refresh_ttl_hours),
    )
}
