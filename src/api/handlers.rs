//! Route handlers for the chat API.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::integration::assistant::{ChatTurn, DEFAULT_SESSION_ID, DEFAULT_USER_ID};
use crate::integration::CoordinatorMetrics;
use crate::memory::ConversationEntry;
use crate::telemetry::LogEntry;

/// Body returned when the LLM produced nothing
pub const AI_FAILURE_MESSAGE: &str = "AI module failed to generate a response.";

/// Body returned when the request had no usable message
pub const NO_MESSAGE: &str = "No message provided";

// =============================================================================
// Chat
// =============================================================================

/// Request body for POST /chat.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub speak: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// POST /chat - answer one prompt.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!("Rejected chat body: {}", rejection);
        ApiError::BadRequest(NO_MESSAGE.to_string())
    })?;

    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(NO_MESSAGE.to_string()))?;

    let turn = ChatTurn::new(message.as_str())
        .with_user(request.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string()))
        .with_session(request.session_id.unwrap_or_else(|| DEFAULT_SESSION_ID.to_string()))
        .with_speech(request.speak);

    match state.assistant.ask(turn).await {
        Some(response) => Ok(Json(ChatResponse { response })),
        None => {
            let preview: String = message.chars().take(50).collect();
            tracing::error!("Received no response from the LLM for input: {}...", preview);
            Err(ApiError::Internal(AI_FAILURE_MESSAGE.to_string()))
        }
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub handlers: Vec<String>,
    pub memory_enabled: bool,
    pub metrics: CoordinatorMetrics,
}

/// GET /health - liveness and routing counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let coordinator = state.assistant.coordinator();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        handlers: coordinator.handler_names(),
        memory_enabled: state.assistant.memory().is_some(),
        metrics: coordinator.metrics(),
    })
}

// =============================================================================
// Logs
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_log_limit")]
    pub limit: usize,
}

fn default_log_limit() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub count: usize,
    pub entries: Vec<LogEntry>,
}

/// GET /logs?limit=n - most recent log entries, oldest first.
pub async fn logs(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(format!("Invalid query: {}", e.body_text())))?;

    let entries = state.logs.recent(query.limit);
    Ok(Json(LogsResponse {
        count: entries.len(),
        entries,
    }))
}

// =============================================================================
// Conversations
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub user_id: String,
    pub session_id: String,
    pub entries: Vec<ConversationEntry>,
}

/// GET /conversations/{user_id}/{session_id} - stored turns of one session.
pub async fn conversation(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let memory = state
        .assistant
        .memory()
        .ok_or_else(|| ApiError::NotFound("Conversation memory is disabled".to_string()))?;

    let entries = memory.load_conversation(&user_id, &session_id).await?;
    Ok(Json(ConversationResponse {
        user_id,
        session_id,
        entries,
    }))
}
