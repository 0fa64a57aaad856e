use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use outdial_db::{create_pool, DbPool, DbRuntimeSettings, NewAgent};
use outdial_dialer::{Dialer, DialerConfig};
use outdial_providers::{LlmSettings, SttSettings, TtsSettings, LLM_FALLBACK_RESPONSE};
use outdial_server::{app, AppState};
use outdial_types::{LlmProviderId, SttProviderId};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

fn test_pool() -> (DbPool, tempfile::NamedTempFile) {
    let temp_file = tempfile::NamedTempFile::new().unwrap();
    let db_path = temp_file.path().to_str().unwrap();
    let pool = create_pool(db_path, DbRuntimeSettings::default()).unwrap();
    let conn = pool.get().unwrap();
    outdial_db::run_migrations(&conn).unwrap();
    (pool, temp_file)
}

fn test_app(pool: DbPool) -> Router {
    let dialer = Dialer::spawn(
        pool.clone(),
        None,
        DialerConfig {
            simulation: true,
            ..Default::default()
        },
    );
    app(AppState {
        pool,
        dialer,
        sessions: Arc::new(outdial_agent::SessionStore::new()),
        // A syntactically valid key that no vendor accepts: the LLM adapter
        // degrades every completion to its fallback sentence, which is what
        // these tests assert on.
        llm_settings: LlmSettings {
            gemini_api_key: "test-key".to_string(),
            groq_api_key: "test-key".to_string(),
        },
        stt_settings: SttSettings::default(),
        tts_settings: TtsSettings::default(),
        audio_dir: std::env::temp_dir().join("outdial-test-audio"),
        public_url: "http://localhost:3000".to_string(),
    })
}

fn seed_agent(pool: &DbPool) -> i64 {
    let conn = pool.get().unwrap();
    outdial_db::create_agent(
        &conn,
        &NewAgent {
            name: "Alex".to_string(),
            system_prompt: "You are Alex.".to_string(),
            llm_provider: LlmProviderId::Gemini,
            llm_model: "gemini-1.5-flash".to_string(),
            tts_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            stt_provider: SttProviderId::Deepgram,
        },
    )
    .unwrap()
    .id
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unknown_agent_is_404_and_creates_no_session() {
    let (pool, _db) = test_pool();
    let app = test_app(pool);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/chat/text",
            json!({ "agent_id": 42, "message": "hello" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/chat/sessions/42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sessions = body_json(response).await;
    assert_eq!(sessions.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn chat_turn_builds_a_session_with_fallback_reply() {
    let (pool, _db) = test_pool();
    let agent_id = seed_agent(&pool);
    let app = test_app(pool);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/chat/text",
            json!({ "agent_id": agent_id, "message": "  hello there  " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["agent_id"], agent_id);
    assert_eq!(body["session_id"], "default");
    assert_eq!(body["user_message"], "hello there");
    assert_eq!(body["agent_response"], LLM_FALLBACK_RESPONSE);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/chat/sessions/{agent_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let sessions = body_json(response).await;
    assert_eq!(sessions[0]["session_id"], "default");
    assert_eq!(sessions[0]["message_count"], 2);
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let (pool, _db) = test_pool();
    let agent_id = seed_agent(&pool);
    let app = test_app(pool);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/chat/text",
            json!({ "agent_id": agent_id, "message": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clearing_a_session_twice_reports_absence_without_error() {
    let (pool, _db) = test_pool();
    let agent_id = seed_agent(&pool);
    let app = test_app(pool);

    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/chat/text",
            json!({ "agent_id": agent_id, "message": "hello", "session_id": "s1" }),
        ))
        .await
        .unwrap();

    let uri = format!("/api/chat/session/{agent_id}/s1");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "session cleared");

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "session not found");
}
