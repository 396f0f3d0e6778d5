//! Chat message HTTP handlers.
//!
//! GET  /api/v1/canvases/{id}/messages        - paginated history
//! POST /api/v1/canvases/{id}/messages        - run a turn, wait for the answer
//! POST /api/v1/canvases/{id}/messages/stream - run a turn over SSE
//!
//! Every SSE frame carries one JSON-encoded chat event in `data`:
//! - `user`      - echo of the stored user message: `{id, content}`
//! - `assistant` - the full answer so far: `{id, content}`
//! - `error`     - the turn failed after streaming started: `{content}`
//! - `done`      - terminal frame

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use colloquy_types::chat::{ChatEvent, ChatMessage, ChatTurn, Page, SendMessageRequest};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthenticatedUser;
use crate::http::extractors::query::PageQuery;
use crate::http::handlers::canvas::parse_uuid;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/canvases/{id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Page<ChatMessage>>, AppError> {
    let start = Instant::now();
    let canvas_id = parse_uuid(&id)?;
    let page = state
        .canvases
        .list_messages(&identity, &canvas_id, query.page, query.page_size)
        .await?;
    Ok(ApiResponse::success(page, start))
}

/// POST /api/v1/canvases/{id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<ApiResponse<ChatTurn>, AppError> {
    let start = Instant::now();
    let canvas_id = parse_uuid(&id)?;
    let turn = state.orchestrator.invoke(&identity, &canvas_id, body).await?;
    Ok(ApiResponse::created(turn, start))
}

/// POST /api/v1/canvases/{id}/messages/stream
///
/// Failures before the first event (unknown canvas, empty content, model
/// resolution, a provider that refuses to open) are plain JSON errors.
/// When the client disconnects the SSE body is dropped, which cancels the
/// turn and leaves no assistant message behind.
pub async fn stream_message(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let canvas_id = parse_uuid(&id)?;
    let cancel = CancellationToken::new();

    let chat = state
        .orchestrator
        .stream(&identity, &canvas_id, body, cancel.clone())
        .await?;
    let assistant_id = chat.assistant_id;
    let mut events = chat.events;

    let sse_stream = async_stream::stream! {
        // Dropped together with the response body.
        let _guard = cancel.drop_guard();

        while let Some(event) = events.recv().await {
            let terminal = matches!(event, ChatEvent::Done);
            yield Ok::<_, Infallible>(sse_event(&event));
            if terminal {
                break;
            }
        }
        debug!(canvas_id = %canvas_id, assistant_id = %assistant_id, "SSE stream closed");
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn sse_event(event: &ChatEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| {
        r#"{"type":"error","content":"failed to encode event"}"#.to_string()
    });
    Event::default().data(data)
}
