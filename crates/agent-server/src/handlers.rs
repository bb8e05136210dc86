//! HTTP Handlers

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use agent_core::{AgentError, Message, SessionId};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tools: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub session_id: String,
    pub response_id: String,
    pub round_trips: usize,
    pub bound_reached: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn agent_error(err: &AgentError) -> ApiError {
    let status = match err {
        AgentError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        AgentError::Service(_)
        | AgentError::ServiceUnavailable(_)
        | AgentError::Auth(_)
        | AgentError::Json(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, err.user_message(), "AGENT_ERROR")
}

// ============================================================================
// Handlers
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions/{id}/history", get(history_handler))
        .route("/api/sessions/{id}", axum::routing::delete(reset_handler))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        tools: state.engine.tools().len(),
    })
}

/// Send one message through the engine
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Message must not be empty", "EMPTY_MESSAGE"));
    }

    let session_id = payload
        .session_id
        .filter(|id| !id.is_empty())
        .map(SessionId::from)
        .unwrap_or_default();

    let _guard = state.locks.acquire(&session_id).await;
    let reply = state
        .engine
        .send(&payload.message, &session_id)
        .await
        .map_err(|e| {
            tracing::error!(session = %session_id, error = %e, "Agent error");
            agent_error(&e)
        })?;

    if reply.bound_reached {
        tracing::warn!(session = %session_id, "Reply truncated at the round-trip bound");
    }

    Ok(Json(ChatResponse {
        message: reply.turn.output_text,
        session_id: session_id.to_string(),
        response_id: reply.turn.id,
        round_trips: reply.round_trips,
        bound_reached: reply.bound_reached,
    }))
}

/// Conversation history of a session
pub async fn history_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<Message>> {
    Json(state.engine.history(&SessionId::from(id)))
}

/// Drop a session
pub async fn reset_handler(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    let session_id = SessionId::from(id);
    let _guard = state.locks.acquire(&session_id).await;
    state.engine.reset(&session_id);
    StatusCode::NO_CONTENT
}
