//! Voice chat over WebSocket.
//!
//! The browser connects to `/ws/voice/{agentId}`, receives the agent's
//! greeting, and then exchanges text turns. History is connection-local:
//! closing the socket ends the conversation, nothing is persisted.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Extension, Path, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use base64::Engine;
use outdial_agent::SESSION_MAX_TURNS;
use outdial_providers::SttClient;
use outdial_types::ChatTurn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Incoming WebSocket frame types.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingFrame {
    UserText {
        text: String,
    },
    /// A short base64-encoded audio clip to transcribe and answer.
    UserAudio {
        audio: String,
    },
}

/// Outgoing WebSocket frame types.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingFrame {
    AgentResponse { text: String },
    Error { message: String },
}

/// Handler for `GET /ws/voice/:agentId`.
pub async fn voice_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<i64>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_voice_socket(socket, state, agent_id))
}

async fn send_frame(socket: &mut WebSocket, frame: &OutgoingFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("failed to encode websocket frame: {}", e);
            false
        }
    }
}

async fn handle_voice_socket(mut socket: WebSocket, state: Arc<AppState>, agent_id: i64) {
    let pool = state.pool.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        let conn = outdial_db::conn(&pool)?;
        outdial_db::get_agent(&conn, agent_id)
    })
    .await;

    let agent = match loaded {
        Ok(Ok(agent)) => agent,
        Ok(Err(e)) => {
            tracing::warn!(agent_id, "voice socket rejected: {}", e);
            send_frame(
                &mut socket,
                &OutgoingFrame::Error {
                    message: format!("agent {agent_id} not found"),
                },
            )
            .await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
        Err(e) => {
            tracing::error!(agent_id, "agent load task failed: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let voice_agent = match state.voice_agent_for(&agent) {
        Ok(voice_agent) => voice_agent,
        Err(e) => {
            tracing::warn!(agent_id, "voice socket rejected, agent misconfigured: {}", e);
            send_frame(
                &mut socket,
                &OutgoingFrame::Error {
                    message: e.to_string(),
                },
            )
            .await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    // Transcription is optional on this endpoint: a text-only deployment has
    // no STT credentials and still serves user_text frames.
    let stt = state.stt_for(&agent).ok();

    tracing::info!(agent_id, transcription = stt.is_some(), "voice session opened");

    let greeting = voice_agent.initial_greeting().await;
    let mut history: Vec<ChatTurn> = vec![ChatTurn::assistant(&greeting)];
    if !send_frame(&mut socket, &OutgoingFrame::AgentResponse { text: greeting }).await {
        return;
    }

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(agent_id, "voice socket receive error: {}", e);
                break;
            }
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Pings are answered by the protocol layer; binary frames have
            // no meaning on this endpoint.
            _ => continue,
        };

        let frame: IncomingFrame = match serde_json::from_str(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(agent_id, "ignoring malformed frame: {}", e);
                continue;
            }
        };

        let user_text = match frame {
            IncomingFrame::UserText { text } => text,
            IncomingFrame::UserAudio { audio } => {
                match transcribe_clip(&state, stt.as_ref(), &audio).await {
                    Some(text) => text,
                    None => continue,
                }
            }
        };
        let user_text = user_text.trim().to_string();
        if user_text.is_empty() {
            continue;
        }

        let reply = voice_agent.respond(&user_text, &history).await;
        push_capped(&mut history, ChatTurn::user(&user_text));
        push_capped(&mut history, ChatTurn::assistant(&reply));

        if !send_frame(&mut socket, &OutgoingFrame::AgentResponse { text: reply }).await {
            break;
        }
    }

    tracing::info!(agent_id, turns = history.len(), "voice session closed");
}

/// Decodes a base64 audio clip, transcribes it through the agent's STT
/// provider, and cleans the scratch file up afterwards. Returns `None` for
/// anything that should simply be ignored (no STT configured, undecodable
/// payload, empty transcript).
async fn transcribe_clip(
    state: &AppState,
    stt: Option<&SttClient>,
    audio_b64: &str,
) -> Option<String> {
    let Some(stt) = stt else {
        tracing::warn!("audio frame received but no transcription provider is configured");
        return None;
    };

    let bytes = match base64::engine::general_purpose::STANDARD.decode(audio_b64) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => return None,
        Err(e) => {
            tracing::debug!("ignoring undecodable audio frame: {}", e);
            return None;
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(&state.audio_dir).await {
        tracing::warn!("could not create audio scratch directory: {}", e);
        return None;
    }
    let path = state.audio_dir.join(format!("ws-{}.webm", Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&path, &bytes).await {
        tracing::warn!("could not write audio scratch file: {}", e);
        return None;
    }

    let transcript = stt.transcribe(&path).await;
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::debug!(path = %path.display(), "scratch file cleanup failed: {}", e);
    }

    let transcript = transcript.trim();
    if transcript.is_empty() {
        None
    } else {
        Some(transcript.to_string())
    }
}

/// Appends to the connection's history under the same cap the session store
/// applies to persistent chat buffers.
fn push_capped(history: &mut Vec<ChatTurn>, turn: ChatTurn) {
    history.push(turn);
    if history.len() > SESSION_MAX_TURNS {
        let excess = history.len() - SESSION_MAX_TURNS;
        history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_cap_applies_to_socket_buffers() {
        let mut history = Vec::new();
        for i in 0..30 {
            push_capped(&mut history, ChatTurn::user(format!("u{i}")));
        }
        assert_eq!(history.len(), SESSION_MAX_TURNS);
        assert_eq!(history[0], ChatTurn::user("u10"));
    }

    #[test]
    fn frames_round_trip_their_type_tags() {
        let frame: IncomingFrame =
            serde_json::from_str(r#"{"type":"user_text","text":"hi"}"#).expect("should parse");
        match frame {
            IncomingFrame::UserText { text } => assert_eq!(text, "hi"),
            other => panic!("unexpected frame: {other:?}"),
        }

        let frame: IncomingFrame =
            serde_json::from_str(r#"{"type":"user_audio","audio":"aGk="}"#).expect("should parse");
        assert!(matches!(frame, IncomingFrame::UserAudio { .. }));

        let json = serde_json::to_string(&OutgoingFrame::AgentResponse {
            text: "hello".to_string(),
        })
        .expect("should encode");
        assert!(json.contains(r#""type":"agent_response""#));
    }
}
