//! Shared types, status enums, and constants for the Outdial platform.
//!
//! This crate provides the foundational types used across all Outdial crates:
//! the Agent/Campaign/Contact/CallLog domain entities, their status enums
//! (with stable string encodings used in the database and the HTTP API), chat
//! turn types, and the static provider catalog.
//!
//! No crate in the workspace depends on anything *except* `outdial-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod catalog;
mod chat;

pub use catalog::{
    provider_catalog, CatalogLlmModel, CatalogLlmProvider, CatalogSttProvider, CatalogTtsVoice,
    ProviderCatalog,
};
pub use chat::{ChatTurn, Role};

/// Error returned when a status or provider string from the database or an
/// API payload does not match any known variant.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// What was being parsed (e.g. "contact status").
    pub kind: &'static str,
    /// The offending input.
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// Returns the stable string encoding used in the database and API.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Status of an agent's most recent call attempt, across any campaign
    /// using it. Last-writer-wins: concurrent campaigns sharing one agent can
    /// both write this field and the model does not disambiguate which one
    /// set it.
    CallStatus ("call status") {
        Idle => "idle",
        Calling => "calling",
        Completed => "completed",
        Failed => "failed",
    }
}

string_enum! {
    /// Lifecycle of a campaign run.
    CampaignStatus ("campaign status") {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

string_enum! {
    /// Status of a single contact within a campaign.
    ///
    /// Transitions only move forward: pending → calling → completed | failed.
    ContactStatus ("contact status") {
        Pending => "pending",
        Calling => "calling",
        Completed => "completed",
        Failed => "failed",
    }
}

string_enum! {
    /// Supported LLM backends for agent conversations.
    LlmProviderId ("llm provider") {
        Gemini => "gemini",
        Groq => "groq",
    }
}

string_enum! {
    /// Supported STT backends for call transcription.
    SttProviderId ("stt provider") {
        Deepgram => "deepgram",
        Gemini => "gemini",
    }
}

/// A configured conversational persona: system prompt plus provider choices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    /// Internal database ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// System prompt driving the agent's conversational behavior.
    pub system_prompt: String,
    /// LLM backend used for responses.
    pub llm_provider: LlmProviderId,
    /// Model name within the LLM provider.
    pub llm_model: String,
    /// TTS voice ID (ElevenLabs).
    pub tts_voice_id: String,
    /// STT backend used for call transcription.
    pub stt_provider: SttProviderId,
    /// Status of the most recent call attempt using this agent.
    pub last_call_status: CallStatus,
    /// Timestamp of the most recent call attempt (ISO 8601), if any.
    pub last_call_time: Option<String>,
}

/// A batch outbound-calling job tied to one agent and an ordered contact list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    /// Internal database ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// The agent that handles calls for this campaign.
    pub agent_id: i64,
    /// Lifecycle status.
    pub status: CampaignStatus,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// A phone number belonging to exactly one campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    /// Internal database ID. Contacts are dialed in ascending ID order.
    pub id: i64,
    /// The campaign this contact belongs to.
    pub campaign_id: i64,
    /// Phone number in E.164 form.
    pub phone_number: String,
    /// Dialing status.
    pub status: ContactStatus,
}

/// A record of one placed or attempted call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallLog {
    /// Internal database ID.
    pub id: i64,
    /// The agent that handled the call.
    pub agent_id: i64,
    /// Number that was dialed.
    pub phone_number: String,
    /// Provider call handle (e.g. Twilio call SID), if one was assigned.
    pub call_sid: Option<String>,
    /// Terminal status reported for the call.
    pub status: CallStatus,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_status_round_trip() {
        for status in [
            ContactStatus::Pending,
            ContactStatus::Calling,
            ContactStatus::Completed,
            ContactStatus::Failed,
        ] {
            let text = status.as_str();
            assert_eq!(text.parse::<ContactStatus>().unwrap(), status);
        }
    }

    #[test]
    fn campaign_status_round_trip() {
        for status in [
            CampaignStatus::Pending,
            CampaignStatus::Running,
            CampaignStatus::Completed,
            CampaignStatus::Cancelled,
        ] {
            assert_eq!(
                status.as_str().parse::<CampaignStatus>().unwrap(),
                status
            );
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "ringing".parse::<ContactStatus>().unwrap_err();
        assert_eq!(err.kind, "contact status");
        assert_eq!(err.value, "ringing");
    }

    #[test]
    fn provider_ids_parse() {
        assert_eq!("gemini".parse::<LlmProviderId>().unwrap(), LlmProviderId::Gemini);
        assert_eq!("groq".parse::<LlmProviderId>().unwrap(), LlmProviderId::Groq);
        assert_eq!(
            "deepgram".parse::<SttProviderId>().unwrap(),
            SttProviderId::Deepgram
        );
        assert!("whisper".parse::<LlmProviderId>().is_err());
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&CallStatus::Idle).unwrap();
        assert_eq!(json, "\"idle\"");
        let back: CallStatus = serde_json::from_str("\"calling\"").unwrap();
        assert_eq!(back, CallStatus::Calling);
    }
}
