//! Outdial server library logic.

pub mod api;
pub mod api_agents;
pub mod api_calls;
pub mod api_campaigns;
pub mod api_chat;
pub mod api_ws;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use outdial_agent::{SessionStore, VoiceAgent};
use outdial_db::DbPool;
use outdial_dialer::Dialer;
use outdial_providers::{
    LlmClient, LlmSettings, ProviderError, SttClient, SttSettings, TtsClient, TtsSettings,
};
use outdial_types::Agent;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// The campaign dialer (worker pool + run registry).
    pub dialer: Dialer,
    /// In-memory chat session buffers.
    pub sessions: Arc<SessionStore>,
    /// LLM credentials, used to build per-agent clients on demand.
    pub llm_settings: LlmSettings,
    /// STT credentials.
    pub stt_settings: SttSettings,
    /// TTS credentials.
    pub tts_settings: TtsSettings,
    /// Directory where synthesized call audio is written; served at `/audio`.
    pub audio_dir: PathBuf,
    /// Publicly reachable base URL, used to build audio URLs in TwiML.
    pub public_url: String,
}

impl AppState {
    /// Builds a [`VoiceAgent`] for a stored agent row.
    ///
    /// Fails if the agent's selected LLM provider has no credential
    /// configured; callers at the API boundary map that to a 400.
    pub fn voice_agent_for(&self, agent: &Agent) -> Result<VoiceAgent, ProviderError> {
        let llm = LlmClient::new(&self.llm_settings, agent.llm_provider, &agent.llm_model)?;
        Ok(VoiceAgent::new(&agent.system_prompt, llm))
    }

    /// Builds a TTS client bound to the agent's configured voice.
    pub fn tts_for(&self, agent: &Agent) -> Result<TtsClient, ProviderError> {
        TtsClient::new(&self.tts_settings, &agent.tts_voice_id)
    }

    /// Builds an STT client for the agent's configured transcription provider.
    pub fn stt_for(&self, agent: &Agent) -> Result<SttClient, ProviderError> {
        SttClient::new(&self.stt_settings, agent.stt_provider)
    }
}

/// Maximum request body size (2 MiB). Protects against OOM from oversized
/// payloads; contact lists and chat messages fit comfortably below it.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route(
            "/api/agents",
            post(api_agents::create_agent_handler).get(api_agents::list_agents_handler),
        )
        .route(
            "/api/agents/options/config",
            get(api_agents::options_config_handler),
        )
        .route(
            "/api/agents/{agentId}",
            get(api_agents::get_agent_handler).put(api_agents::update_agent_handler),
        )
        .route(
            "/api/campaigns",
            post(api_campaigns::create_campaign_handler).get(api_campaigns::list_campaigns_handler),
        )
        .route(
            "/api/campaigns/runs/active",
            get(api_campaigns::active_runs_handler),
        )
        .route(
            "/api/campaigns/{campaignId}",
            get(api_campaigns::get_campaign_handler),
        )
        .route(
            "/api/campaigns/{campaignId}/run",
            post(api_campaigns::run_campaign_handler),
        )
        .route(
            "/api/campaigns/{campaignId}/status",
            get(api_campaigns::campaign_status_handler),
        )
        .route(
            "/api/campaigns/{campaignId}/cancel",
            post(api_campaigns::cancel_campaign_handler),
        )
        .route(
            "/api/calls/logs",
            post(api_calls::create_call_log_handler).get(api_calls::list_call_logs_handler),
        )
        .route("/api/calls/webhook", post(api_calls::call_webhook_handler))
        .route("/api/calls/status", post(api_calls::call_status_handler))
        .route("/api/chat/text", post(api_chat::text_chat_handler))
        .route(
            "/api/chat/sessions/{agentId}",
            get(api_chat::list_sessions_handler),
        )
        .route(
            "/api/chat/session/{agentId}/{sessionId}",
            delete(api_chat::clear_session_handler),
        )
        .route("/ws/voice/{agentId}", get(api_ws::voice_ws_handler));

    // Serve synthesized call audio under /audio/*. Twilio fetches these URLs
    // when executing a <Play> verb.
    let router = router.nest_service("/audio", ServeDir::new(&state.audio_dir));

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
