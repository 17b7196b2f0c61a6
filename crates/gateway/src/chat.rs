//! `POST /chat` — one selective-context turn per request.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use recallchat_agent::{ChatError, EMPTY_MESSAGE_REPLY};
use recallchat_memory::DEFAULT_SESSION;

use crate::SharedState;

/// Request header selecting the conversation log.
pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let session = session_id(&headers);
    info!(session = %session, message_len = payload.message.len(), "Chat request");

    // Blank input must not create or touch a session.
    if payload.message.trim().is_empty() {
        return Ok(Json(ChatResponse {
            reply: EMPTY_MESSAGE_REPLY.into(),
        }));
    }

    let log = state.sessions.get_or_create(session).await;

    match state.orchestrator.handle(&log, &payload.message).await {
        Ok(reply) => Ok(Json(ChatResponse { reply: reply.reply })),
        Err(e) => {
            error!(session = %session, error = %e, "Chat turn failed");
            Err((
                status_for(&e),
                Json(ErrorResponse {
                    error: public_message(&e).into(),
                }),
            ))
        }
    }
}

/// Session key from the request, falling back to the shared default.
fn session_id(headers: &HeaderMap) -> &str {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SESSION)
}

pub fn status_for(err: &ChatError) -> StatusCode {
    match err {
        ChatError::Retrieval(_) | ChatError::Generation(_) => StatusCode::BAD_GATEWAY,
        ChatError::GenerationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ChatError::Composition(_) => StatusCode::PAYLOAD_TOO_LARGE,
    }
}

// Backend bodies stay in the logs.
fn public_message(err: &ChatError) -> &'static str {
    match err {
        ChatError::Retrieval(_) => "Passage retrieval failed",
        ChatError::Generation(_) => "Generation backend failed",
        ChatError::GenerationTimeout { .. } => "Generation backend timed out",
        ChatError::Composition(_) => "Message too long",
    }
}
