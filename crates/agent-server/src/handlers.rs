//! HTTP Handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use agent_core::{AgentError, ThreadId};

use crate::state::AgentHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Gate in front of the lazily-initialized agent
    pub handle: Arc<AgentHandle>,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub agent: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Conversation to continue; omitted = new conversation
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub thread_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============================================================================
// Routing
// ============================================================================

/// API routes; the caller adds static file serving and middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat_handler))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        agent: state.handle.state().label(),
    })
}

/// Main chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let service = state.handle.admit().map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: e.user_message(),
                code: "AGENT_UNAVAILABLE".into(),
            }),
        )
    })?;

    let thread = payload
        .thread_id
        .filter(|id| !id.trim().is_empty())
        .map_or_else(ThreadId::new, ThreadId::from_string);

    let response = service.chat(&thread, &payload.message).await.map_err(|e| {
        tracing::error!("Chat turn failed: {}", e);
        let (status, code) = match &e {
            AgentError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TURN_TIMEOUT"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR"),
        };
        (
            status,
            Json(ErrorResponse {
                error: e.user_message(),
                code: code.into(),
            }),
        )
    })?;

    Ok(Json(ChatResponse {
        response,
        thread_id: thread.to_string(),
    }))
}
