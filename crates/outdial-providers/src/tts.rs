//! Text-to-speech adapter (ElevenLabs).

use crate::ProviderError;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Timeout for a single synthesis request.
const TTS_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum text input size (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

const ELEVENLABS_DEFAULT_MODEL: &str = "eleven_monolingual_v1";

/// Credentials and defaults for ElevenLabs synthesis.
#[derive(Debug, Clone, Default)]
pub struct TtsSettings {
    pub elevenlabs_api_key: String,
    pub elevenlabs_model_id: Option<String>,
}

/// A synthesis client bound to one voice.
#[derive(Debug, Clone)]
pub struct TtsClient {
    voice_id: String,
    model_id: String,
    api_key: String,
    http: reqwest::Client,
}

impl TtsClient {
    /// Builds a client for the given voice.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingCredential`] if no ElevenLabs API key
    /// is configured.
    pub fn new(settings: &TtsSettings, voice_id: impl Into<String>) -> Result<Self, ProviderError> {
        if settings.elevenlabs_api_key.is_empty() {
            return Err(ProviderError::MissingCredential(
                "elevenlabs",
                "elevenlabs_api_key",
            ));
        }

        Ok(Self {
            voice_id: voice_id.into(),
            model_id: settings
                .elevenlabs_model_id
                .clone()
                .unwrap_or_else(|| ELEVENLABS_DEFAULT_MODEL.to_string()),
            api_key: settings.elevenlabs_api_key.clone(),
            http: reqwest::Client::builder()
                .timeout(TTS_TIMEOUT)
                .build()
                .expect("reqwest client construction cannot fail with static options"),
        })
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// Synthesizes speech and writes it to a UUID-named MP3 under `out_dir`.
    ///
    /// Returns the path of the written file.
    pub async fn synthesize(&self, text: &str, out_dir: &Path) -> Result<PathBuf, ProviderError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(ProviderError::UnexpectedResponse {
                provider: "elevenlabs",
                detail: format!(
                    "text exceeds maximum size: {} bytes (limit: {} bytes)",
                    text.len(),
                    MAX_TTS_INPUT_BYTES
                ),
            });
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice_id
        );
        let audio = self
            .http
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": text,
                "model_id": self.model_id,
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.75,
                    "style": 0.0,
                    "use_speaker_boost": true,
                },
            }))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tokio::fs::create_dir_all(out_dir).await?;
        let out_path = out_dir.join(format!("{}.mp3", Uuid::new_v4()));
        tokio::fs::write(&out_path, &audio).await?;

        tracing::debug!(
            voice = %self.voice_id,
            bytes = audio.len(),
            path = %out_path.display(),
            "synthesized audio"
        );
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_requires_api_key() {
        let err = TtsClient::new(&TtsSettings::default(), "voice-1")
            .expect_err("empty key should fail construction");
        assert!(matches!(
            err,
            ProviderError::MissingCredential("elevenlabs", _)
        ));
    }

    #[test]
    fn model_id_defaults_when_unset() {
        let client = TtsClient::new(
            &TtsSettings {
                elevenlabs_api_key: "xi-key".to_string(),
                elevenlabs_model_id: None,
            },
            "voice-1",
        )
        .unwrap();
        assert_eq!(client.model_id, ELEVENLABS_DEFAULT_MODEL);
        assert_eq!(client.voice_id(), "voice-1");
    }

    #[tokio::test]
    async fn oversized_text_is_rejected_before_any_request() {
        let client = TtsClient::new(
            &TtsSettings {
                elevenlabs_api_key: "xi-key".to_string(),
                elevenlabs_model_id: None,
            },
            "voice-1",
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let big = "a".repeat(MAX_TTS_INPUT_BYTES + 1);
        let err = client.synthesize(&big, dir.path()).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedResponse { .. }));
    }
}
