use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

use super::server::AppState;
use crate::types::ChatEvent;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    /// Omitted on the first turn; the reply carries the id to reuse.
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
}

fn session_id(requested: Option<String>) -> String {
    requested
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Single-shot chat: the full pipeline runs synchronously and the complete
/// assistant text comes back as JSON.
pub async fn respond(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let session_id = session_id(request.session_id);
    let reply = state.engine.respond(&session_id, &request.query).await;
    Json(ChatResponse { session_id, reply })
}

/// Streaming chat: text chunks arrive as SSE `text` events, failures as one
/// `error` event, and a `done` sentinel terminates the stream. Clients may
/// abandon the stream at any point.
pub async fn respond_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = session_id(request.session_id);
    let rx = state.engine.respond_stream(&session_id, &request.query);

    let stream = ReceiverStream::new(rx).map(|event| {
        let sse_event = match event {
            ChatEvent::Text(data) => Event::default().event("text").data(data),
            ChatEvent::Error(data) => Event::default().event("error").data(data),
            ChatEvent::Done => Event::default().event("done").data(""),
        };
        Ok(sse_event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
