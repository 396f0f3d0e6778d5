//! Axum router configuration with middleware.
//!
//! All API routes are under `/api/v1/`. Middleware: CORS, request tracing.

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::error::AppError;
use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Auth
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/sessions", get(handlers::auth::list_sessions))
        // Canvases
        .route(
            "/canvases",
            get(handlers::canvas::list_canvases).post(handlers::canvas::create_canvas),
        )
        .route(
            "/canvases/{id}",
            get(handlers::canvas::get_canvas)
                .put(handlers::canvas::update_canvas)
                .delete(handlers::canvas::delete_canvas),
        )
        // Messages
        .route(
            "/canvases/{id}/messages",
            get(handlers::message::list_messages).post(handlers::message::send_message),
        )
        .route(
            "/canvases/{id}/messages/stream",
            post(handlers::message::stream_message),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - database liveness plus the provider ids the registry can build.
async fn health_check(
    State(state): State<AppState>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    state
        .db_pool
        .ping()
        .await
        .map_err(|e| AppError::Internal(format!("database unavailable: {e}")))?;

    Ok(axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": state.registry.supported_providers(),
    })))
}
