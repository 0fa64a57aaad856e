//! Speech-to-text adapter (Deepgram and Gemini).

use crate::ProviderError;
use base64::Engine;
use outdial_types::SttProviderId;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

/// Timeout for a single transcription request.
const STT_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum audio input size (10 MiB). Prevents OOM from oversized recordings.
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

const DEEPGRAM_DEFAULT_MODEL: &str = "nova-2";

const GEMINI_TRANSCRIBE_PROMPT: &str = "Please transcribe the speech in this audio \
file accurately. Only return the transcribed text without any additional comments \
or formatting.";

/// Credentials for the STT backends.
#[derive(Debug, Clone, Default)]
pub struct SttSettings {
    pub deepgram_api_key: String,
    pub deepgram_model: Option<String>,
    pub gemini_api_key: String,
    pub gemini_model: Option<String>,
}

/// A transcription client bound to one provider.
#[derive(Debug, Clone)]
pub struct SttClient {
    provider: SttProviderId,
    model: String,
    api_key: String,
    http: reqwest::Client,
}

impl SttClient {
    /// Builds a client for the given provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingCredential`] if the selected provider
    /// has no API key configured.
    pub fn new(settings: &SttSettings, provider: SttProviderId) -> Result<Self, ProviderError> {
        let (api_key, model) = match provider {
            SttProviderId::Deepgram => {
                if settings.deepgram_api_key.is_empty() {
                    return Err(ProviderError::MissingCredential(
                        "deepgram",
                        "deepgram_api_key",
                    ));
                }
                (
                    settings.deepgram_api_key.clone(),
                    settings
                        .deepgram_model
                        .clone()
                        .unwrap_or_else(|| DEEPGRAM_DEFAULT_MODEL.to_string()),
                )
            }
            SttProviderId::Gemini => {
                if settings.gemini_api_key.is_empty() {
                    return Err(ProviderError::MissingCredential("gemini", "gemini_api_key"));
                }
                (
                    settings.gemini_api_key.clone(),
                    settings
                        .gemini_model
                        .clone()
                        .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
                )
            }
        };

        Ok(Self {
            provider,
            model,
            api_key,
            http: reqwest::Client::builder()
                .timeout(STT_TIMEOUT)
                .build()
                .expect("reqwest client construction cannot fail with static options"),
        })
    }

    pub fn provider(&self) -> SttProviderId {
        self.provider
    }

    /// Transcribes an audio file.
    ///
    /// Vendor failures are logged and degraded to an empty transcript so a
    /// bad recording cannot end a call.
    pub async fn transcribe(&self, audio_path: &Path) -> String {
        match self.try_transcribe(audio_path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.as_str(),
                    path = %audio_path.display(),
                    "transcription failed, returning empty transcript: {}",
                    e
                );
                String::new()
            }
        }
    }

    async fn try_transcribe(&self, audio_path: &Path) -> Result<String, ProviderError> {
        let audio = tokio::fs::read(audio_path).await?;
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(ProviderError::UnexpectedResponse {
                provider: self.provider.as_str(),
                detail: format!(
                    "audio exceeds maximum size: {} bytes (limit: {} bytes)",
                    audio.len(),
                    MAX_STT_INPUT_BYTES
                ),
            });
        }

        match self.provider {
            SttProviderId::Deepgram => self.transcribe_deepgram(audio).await,
            SttProviderId::Gemini => self.transcribe_gemini(audio).await,
        }
    }

    async fn transcribe_deepgram(&self, audio: Vec<u8>) -> Result<String, ProviderError> {
        let response: Value = self
            .http
            .post("https://api.deepgram.com/v1/listen")
            .query(&[
                ("model", self.model.as_str()),
                ("smart_format", "true"),
                ("punctuate", "true"),
            ])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response["results"]["channels"][0]["alternatives"][0]["transcript"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ProviderError::UnexpectedResponse {
                provider: "deepgram",
                detail: "no transcript in response".to_string(),
            })
    }

    /// Gemini has no dedicated STT endpoint; the audio rides inline on a
    /// `generateContent` request with a transcription prompt.
    async fn transcribe_gemini(&self, audio: Vec<u8>) -> Result<String, ProviderError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&audio);
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let response: Value = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": GEMINI_TRANSCRIBE_PROMPT },
                        { "inlineData": { "mimeType": "audio/wav", "data": encoded } }
                    ]
                }]
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ProviderError::UnexpectedResponse {
                provider: "gemini",
                detail: "no candidate text in response".to_string(),
            })
    }
}
