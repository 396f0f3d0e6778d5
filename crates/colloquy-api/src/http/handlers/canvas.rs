//! Canvas HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/v1/canvases?workspace_id=..&type=.. - List a workspace's canvases
//! - POST   /api/v1/canvases      - Create a canvas
//! - GET    /api/v1/canvases/{id} - Get a canvas
//! - PUT    /api/v1/canvases/{id} - Update title, description, status or model
//! - DELETE /api/v1/canvases/{id} - Delete a canvas and its messages

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use colloquy_types::chat::{Canvas, CreateCanvasRequest, Page, UpdateCanvasRequest};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthenticatedUser;
use crate::http::extractors::query::CanvasListQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

/// GET /api/v1/canvases
pub async fn list_canvases(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Query(query): Query<CanvasListQuery>,
) -> Result<ApiResponse<Page<Canvas>>, AppError> {
    let start = Instant::now();
    let page = state
        .canvases
        .list_canvases(
            &identity,
            query.workspace_id,
            query.kind,
            query.page,
            query.page_size,
        )
        .await?;
    Ok(ApiResponse::success(page, start))
}

/// POST /api/v1/canvases
pub async fn create_canvas(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Json(body): Json<CreateCanvasRequest>,
) -> Result<ApiResponse<Canvas>, AppError> {
    let start = Instant::now();
    let canvas = state.canvases.create_canvas(&identity, body).await?;
    let href = format!("/api/v1/canvases/{}", canvas.id);
    let messages = format!("{href}/messages");
    Ok(ApiResponse::created(canvas, start)
        .with_link("self", &href)
        .with_link("messages", &messages))
}

/// GET /api/v1/canvases/{id}
pub async fn get_canvas(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Canvas>, AppError> {
    let start = Instant::now();
    let canvas_id = parse_uuid(&id)?;
    let canvas = state.canvases.get_canvas(&identity, &canvas_id).await?;
    Ok(ApiResponse::success(canvas, start))
}

/// PUT /api/v1/canvases/{id}
pub async fn update_canvas(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateCanvasRequest>,
) -> Result<ApiResponse<Canvas>, AppError> {
    let start = Instant::now();
    let canvas_id = parse_uuid(&id)?;
    let canvas = state
        .canvases
        .update_canvas(&identity, &canvas_id, body)
        .await?;
    Ok(ApiResponse::success(canvas, start))
}

/// DELETE /api/v1/canvases/{id}
pub async fn delete_canvas(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let start = Instant::now();
    let canvas_id = parse_uuid(&id)?;
    state.canvases.delete_canvas(&identity, &canvas_id).await?;
    Ok(ApiResponse::success(
        serde_json::json!({ "deleted": true, "canvas_id": canvas_id }),
        start,
    ))
}
