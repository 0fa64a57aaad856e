//! Telephony webhook, status callback, and call logs.
//!
//! Twilio drives a live call by POSTing here: first to `/api/calls/webhook`
//! for TwiML instructions (we answer with synthesized speech and a `<Gather>`
//! for the caller's reply), then to `/api/calls/status` with the terminal
//! call status. The status callback is the async completion path for live
//! calls; the dialer only ever writes `calling` before handing off.

use crate::api::{run_blocking, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Form, Json, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use outdial_agent::SessionKey;
use outdial_db::NewCallLog;
use outdial_types::{CallLog, CallStatus, ContactStatus};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Query parameters Twilio echoes back from the webhook URLs the dialer
/// registered at origination time.
#[derive(Debug, Deserialize)]
pub struct CallQuery {
    pub agent_id: i64,
}

/// Form fields Twilio POSTs to the conversation webhook.
#[derive(Debug, Deserialize)]
pub struct WebhookForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    /// Present on `<Gather>` callbacks; absent on the initial fetch.
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
}

/// Form fields Twilio POSTs to the status callback.
#[derive(Debug, Deserialize)]
pub struct StatusCallbackForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus")]
    pub call_status: String,
    #[serde(rename = "To")]
    pub to_number: String,
}

/// Query parameters for the call log listing.
#[derive(Debug, Default, Deserialize)]
pub struct CallLogQuery {
    pub agent_id: Option<i64>,
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// TwiML that speaks (via `<Play>` when synthesis succeeded, `<Say>` as the
/// degraded path) and then gathers the caller's reply.
fn twiml_turn(audio_url: Option<&str>, say_text: &str, gather_action: &str) -> String {
    let voice_line = match audio_url {
        Some(url) => format!("<Play>{}</Play>", xml_escape(url)),
        None => format!("<Say>{}</Say>", xml_escape(say_text)),
    };
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response>{voice_line}\
         <Gather input=\"speech\" action=\"{}\" method=\"POST\" speechTimeout=\"auto\"/>\
         </Response>",
        xml_escape(gather_action)
    )
}

/// TwiML that apologizes and hangs up; used when the call cannot proceed.
fn twiml_hangup(say_text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response><Say>{}</Say><Hangup/></Response>",
        xml_escape(say_text)
    )
}

fn xml_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

/// Handler for `POST /api/calls/webhook`: one conversational turn of a live
/// call. The initial fetch (no `SpeechResult`) gets the greeting; `<Gather>`
/// callbacks get a response to the transcribed caller speech. Per-call
/// history is keyed by the Twilio call SID.
pub async fn call_webhook_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<CallQuery>,
    Form(form): Form<WebhookForm>,
) -> Response {
    let agent_id = query.agent_id;
    let pool = state.pool.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        let conn = outdial_db::conn(&pool)?;
        outdial_db::get_agent(&conn, agent_id)
    })
    .await;

    let agent = match loaded {
        Ok(Ok(agent)) => agent,
        Ok(Err(e)) => {
            tracing::warn!(agent_id, call_sid = %form.call_sid, "webhook for unusable agent: {}", e);
            return xml_response(
                StatusCode::OK,
                twiml_hangup("Sorry, this agent is not available right now. Goodbye."),
            );
        }
        Err(e) => {
            tracing::error!(agent_id, "agent load task failed: {}", e);
            return xml_response(
                StatusCode::OK,
                twiml_hangup("Sorry, something went wrong. Goodbye."),
            );
        }
    };

    let voice_agent = match state.voice_agent_for(&agent) {
        Ok(voice_agent) => voice_agent,
        Err(e) => {
            tracing::warn!(agent_id, "webhook agent misconfigured: {}", e);
            return xml_response(
                StatusCode::OK,
                twiml_hangup("Sorry, this agent is not configured correctly. Goodbye."),
            );
        }
    };

    let session_key = SessionKey::new(agent.id, &form.call_sid);
    let caller_text = form
        .speech_result
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty());

    let reply = match caller_text {
        Some(text) => {
            let history = state.sessions.history(&session_key);
            let reply = voice_agent.respond(text, &history).await;
            state.sessions.append_exchange(&session_key, text, &reply);
            reply
        }
        None => voice_agent.initial_greeting().await,
    };

    tracing::info!(
        agent_id,
        call_sid = %form.call_sid,
        greeting = caller_text.is_none(),
        "webhook turn produced"
    );

    // Synthesis failure degrades to <Say>; the call keeps going either way.
    let audio_url = match state.tts_for(&agent) {
        Ok(tts) => match tts.synthesize(&reply, &state.audio_dir).await {
            Ok(path) => audio_url_for(&state.public_url, &path),
            Err(e) => {
                tracing::warn!(agent_id, "tts synthesis failed, falling back to <Say>: {}", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!(agent_id, "tts unavailable, falling back to <Say>: {}", e);
            None
        }
    };

    let gather_action = format!("/api/calls/webhook?agent_id={agent_id}");
    xml_response(
        StatusCode::OK,
        twiml_turn(audio_url.as_deref(), &reply, &gather_action),
    )
}

fn audio_url_for(public_url: &str, audio_path: &Path) -> Option<String> {
    let file_name = audio_path.file_name()?.to_str()?;
    Some(format!(
        "{}/audio/{}",
        public_url.trim_end_matches('/'),
        file_name
    ))
}

/// Handler for `POST /api/calls/status`: maps Twilio terminal call statuses
/// onto the contact and agent rows and appends a call log entry.
/// Non-terminal statuses (ringing, in-progress) are acknowledged and ignored.
pub async fn call_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<CallQuery>,
    Form(form): Form<StatusCallbackForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let terminal_status = match form.call_status.as_str() {
        "completed" => CallStatus::Completed,
        "busy" | "failed" | "no-answer" | "canceled" => CallStatus::Failed,
        other => {
            tracing::debug!(
                agent_id = query.agent_id,
                call_sid = %form.call_sid,
                status = other,
                "ignoring non-terminal call status"
            );
            return Ok(Json(serde_json::json!({ "status": "ignored" })));
        }
    };

    let contact_status = match terminal_status {
        CallStatus::Completed => ContactStatus::Completed,
        _ => ContactStatus::Failed,
    };

    let agent_id = query.agent_id;
    let log = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;

        let resolved =
            outdial_db::resolve_calling_contact(&conn, &form.to_number, contact_status)?;
        outdial_db::update_agent_call_status(&conn, agent_id, terminal_status)?;
        let log = outdial_db::create_call_log(
            &conn,
            &NewCallLog {
                agent_id,
                phone_number: form.to_number.clone(),
                call_sid: Some(form.call_sid.clone()),
                status: terminal_status,
            },
        )?;

        tracing::info!(
            agent_id,
            call_sid = %form.call_sid,
            status = terminal_status.as_str(),
            contacts_resolved = resolved,
            "recorded terminal call status"
        );
        Ok(log)
    })
    .await?;

    Ok(Json(serde_json::json!({
        "status": "recorded",
        "call_log_id": log.id,
    })))
}

/// Handler for `POST /api/calls/logs`.
pub async fn create_call_log_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NewCallLog>,
) -> Result<(StatusCode, Json<CallLog>), ApiError> {
    let log = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        // Reject logs for agents that do not exist; the table has no foreign
        // key on agent_id so stale clients would otherwise write orphans.
        outdial_db::get_agent(&conn, payload.agent_id)?;
        Ok(outdial_db::create_call_log(&conn, &payload)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// Handler for `GET /api/calls/logs`, newest first, optionally filtered by
/// `?agent_id=`.
pub async fn list_call_logs_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<CallLogQuery>,
) -> Result<Json<Vec<CallLog>>, ApiError> {
    let logs = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        Ok(outdial_db::list_call_logs(&conn, query.agent_id)?)
    })
    .await?;
    Ok(Json(logs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twiml_turn_prefers_play_over_say() {
        let xml = twiml_turn(
            Some("http://localhost:3000/audio/x.mp3"),
            "hello",
            "/api/calls/webhook?agent_id=1",
        );
        assert!(xml.contains("<Play>http://localhost:3000/audio/x.mp3</Play>"));
        assert!(!xml.contains("<Say>"));
        assert!(xml.contains("input=\"speech\""));

        let xml = twiml_turn(None, "hi & bye", "/api/calls/webhook?agent_id=1");
        assert!(xml.contains("<Say>hi &amp; bye</Say>"));
    }

    #[test]
    fn hangup_twiml_escapes_text() {
        let xml = twiml_hangup("a < b");
        assert!(xml.contains("<Say>a &lt; b</Say>"));
        assert!(xml.contains("<Hangup/>"));
    }

    #[test]
    fn audio_urls_are_rooted_at_the_public_url() {
        let url = audio_url_for(
            "http://localhost:3000/",
            Path::new("/var/lib/outdial/audio/abc.mp3"),
        );
        assert_eq!(
            url.as_deref(),
            Some("http://localhost:3000/audio/abc.mp3")
        );
    }
}
