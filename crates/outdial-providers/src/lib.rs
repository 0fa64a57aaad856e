//! Vendor adapters for the Outdial platform.
//!
//! Wraps the LLM (Gemini/Groq), STT (Deepgram/Gemini), TTS (ElevenLabs), and
//! telephony (Twilio) HTTP APIs behind narrow interfaces: send prompt → get
//! text, transcribe audio → get text, synthesize text → get an audio path,
//! originate call → get a call SID.
//!
//! Provider selection is a tagged enum chosen from agent configuration at
//! construction time; an unconfigured credential for the chosen provider is a
//! construction error, never a mid-call surprise. Transient call failures are
//! degraded in place (fallback sentence, empty transcript) so a single bad
//! vendor response cannot take down a dialer worker or a live conversation.

mod llm;
mod stt;
mod telephony;
mod tts;

pub use llm::{LlmClient, LlmSettings, LLM_FALLBACK_RESPONSE};
pub use stt::{SttClient, SttSettings};
pub use telephony::{TelephonyClient, TwilioSettings};
pub use tts::{TtsClient, TtsSettings};

use thiserror::Error;

/// Errors surfaced by the provider adapters.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A credential required by the selected provider is not configured.
    /// Fatal at construction.
    #[error("missing credential for {0}: set {1} in the provider config")]
    MissingCredential(&'static str, &'static str),

    /// Transport-level failure talking to the vendor.
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The vendor answered with something we could not interpret.
    #[error("unexpected {provider} response: {detail}")]
    UnexpectedResponse {
        provider: &'static str,
        detail: String,
    },

    /// Local filesystem failure while persisting synthesized audio.
    #[error("audio io error: {0}")]
    AudioIo(#[from] std::io::Error),
}
