//! Conversation logic for Outdial agents.
//!
//! A [`VoiceAgent`] pairs a system prompt with an LLM client and produces
//! greetings and per-turn responses. The [`SessionStore`] keeps bounded,
//! process-lifetime conversation buffers for interactive sessions (text chat,
//! voice WebSocket, and telephony webhook turns).

mod agent;
mod sessions;

pub use agent::{VoiceAgent, DEFAULT_APPOINTMENT_SETTER_PROMPT};
pub use sessions::{SessionKey, SessionStore, SessionSummary, SESSION_MAX_TURNS};
