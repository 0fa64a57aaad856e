//! Browser-facing text chat and session management.

use crate::api::{run_blocking, ApiError};
use crate::AppState;
use axum::extract::{Extension, Json, Path};
use outdial_agent::{SessionKey, SessionSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_SESSION_ID: &str = "default";

/// Request body for a text chat turn.
#[derive(Debug, Deserialize)]
pub struct TextChatRequest {
    pub agent_id: i64,
    pub message: String,
    /// Defaults to a shared "default" session per agent when omitted.
    pub session_id: Option<String>,
}

/// Response body for a text chat turn.
#[derive(Debug, Serialize)]
pub struct TextChatResponse {
    pub agent_id: i64,
    pub session_id: String,
    pub user_message: String,
    pub agent_response: String,
}

/// Handler for `POST /api/chat/text`: one user/assistant exchange against the
/// session's history. An unknown agent is a 404 and creates no session.
pub async fn text_chat_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TextChatRequest>,
) -> Result<Json<TextChatResponse>, ApiError> {
    let message = payload.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let agent_id = payload.agent_id;
    let loader_state = state.clone();
    let agent = run_blocking(move || {
        let conn = loader_state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        Ok(outdial_db::get_agent(&conn, agent_id)?)
    })
    .await?;

    let voice_agent = state.voice_agent_for(&agent)?;

    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());
    let session_key = SessionKey::new(agent.id, &session_id);

    let history = state.sessions.history(&session_key);
    let agent_response = voice_agent.respond(&message, &history).await;
    state
        .sessions
        .append_exchange(&session_key, &message, &agent_response);

    tracing::debug!(
        agent_id,
        session_id = %session_id,
        history_len = history.len(),
        "text chat turn"
    );

    Ok(Json(TextChatResponse {
        agent_id: agent.id,
        session_id,
        user_message: message,
        agent_response,
    }))
}

/// Handler for `GET /api/chat/sessions/:agentId`: the agent's active
/// in-memory sessions.
pub async fn list_sessions_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<i64>,
) -> Json<Vec<SessionSummary>> {
    Json(state.sessions.sessions_for_agent(agent_id))
}

/// Handler for `DELETE /api/chat/session/:agentId/:sessionId`. Clearing an
/// absent session is not an error; the response says which case happened.
pub async fn clear_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((agent_id, session_id)): Path<(i64, String)>,
) -> Json<serde_json::Value> {
    let existed = state.sessions.clear(&SessionKey::new(agent_id, &session_id));
    let message = if existed {
        "session cleared"
    } else {
        "session not found"
    };
    Json(serde_json::json!({
        "agent_id": agent_id,
        "session_id": session_id,
        "message": message,
    }))
}
