//! Agent CRUD and the provider options catalog.

use crate::api::{run_blocking, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use outdial_agent::DEFAULT_APPOINTMENT_SETTER_PROMPT;
use outdial_db::{NewAgent, UpdateAgent};
use outdial_types::{provider_catalog, Agent, LlmProviderId, ProviderCatalog, SttProviderId};
use serde::Deserialize;
use std::sync::Arc;

/// Request body for agent creation. Provider fields deserialize straight into
/// the tagged enums, so an unknown provider string is rejected before the
/// handler runs.
#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    /// Defaults to the shipped appointment-setter persona when omitted.
    pub system_prompt: Option<String>,
    pub llm_provider: LlmProviderId,
    pub llm_model: String,
    pub tts_voice_id: String,
    pub stt_provider: SttProviderId,
}

/// Handler for `POST /api/agents`.
pub async fn create_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("agent name must not be empty".into()));
    }

    let params = NewAgent {
        name: payload.name,
        system_prompt: payload
            .system_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_APPOINTMENT_SETTER_PROMPT.trim().to_string()),
        llm_provider: payload.llm_provider,
        llm_model: payload.llm_model,
        tts_voice_id: payload.tts_voice_id,
        stt_provider: payload.stt_provider,
    };

    let agent = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        Ok(outdial_db::create_agent(&conn, &params)?)
    })
    .await?;

    tracing::info!(
        agent_id = agent.id,
        llm = agent.llm_provider.as_str(),
        stt = agent.stt_provider.as_str(),
        "created agent"
    );
    Ok((StatusCode::CREATED, Json(agent)))
}

/// Handler for `GET /api/agents`.
pub async fn list_agents_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Agent>>, ApiError> {
    let agents = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        Ok(outdial_db::list_agents(&conn)?)
    })
    .await?;
    Ok(Json(agents))
}

/// Handler for `GET /api/agents/:agentId`.
pub async fn get_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<i64>,
) -> Result<Json<Agent>, ApiError> {
    let agent = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        Ok(outdial_db::get_agent(&conn, agent_id)?)
    })
    .await?;
    Ok(Json(agent))
}

/// Handler for `PUT /api/agents/:agentId`. Omitted fields are left unchanged.
pub async fn update_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<i64>,
    Json(update): Json<UpdateAgent>,
) -> Result<Json<Agent>, ApiError> {
    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("agent name must not be empty".into()));
        }
    }

    let agent = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        Ok(outdial_db::update_agent(&conn, agent_id, &update)?)
    })
    .await?;

    tracing::info!(agent_id, "updated agent");
    Ok(Json(agent))
}

/// Handler for `GET /api/agents/options/config`: the static catalog of
/// selectable providers, models, and voices.
pub async fn options_config_handler() -> Json<ProviderCatalog> {
    Json(provider_catalog())
}
