//! LLM chat completion adapter (Gemini and Groq).

use crate::ProviderError;
use outdial_types::{ChatTurn, LlmProviderId, Role};
use serde_json::{json, Value};
use std::time::Duration;

/// Timeout for a single completion request.
const LLM_TIMEOUT: Duration = Duration::from_secs(30);

/// Token cap for completions. Voice exchanges need short answers; capping at
/// the vendor keeps a rambling model from blowing the turn budget.
const MAX_COMPLETION_TOKENS: u32 = 60;

const COMPLETION_TEMPERATURE: f64 = 0.7;

/// Returned to the caller when the vendor fails mid-conversation. A live call
/// is better served by an apology than a dropped connection.
pub const LLM_FALLBACK_RESPONSE: &str = "I'm sorry, I'm having trouble thinking right now.";

/// Credentials for the LLM backends.
#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub gemini_api_key: String,
    pub groq_api_key: String,
}

/// A chat-completion client bound to one provider and model.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: LlmProviderId,
    model: String,
    api_key: String,
    endpoint: String,
    http: reqwest::Client,
}

fn completion_endpoint(provider: LlmProviderId, model: &str) -> String {
    match provider {
        LlmProviderId::Gemini => format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
        ),
        LlmProviderId::Groq => "https://api.groq.com/openai/v1/chat/completions".to_string(),
    }
}

impl LlmClient {
    /// Builds a client for the given provider/model pair.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingCredential`] if the selected provider
    /// has no API key configured.
    pub fn new(
        settings: &LlmSettings,
        provider: LlmProviderId,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = match provider {
            LlmProviderId::Gemini => {
                if settings.gemini_api_key.is_empty() {
                    return Err(ProviderError::MissingCredential("gemini", "gemini_api_key"));
                }
                settings.gemini_api_key.clone()
            }
            LlmProviderId::Groq => {
                if settings.groq_api_key.is_empty() {
                    return Err(ProviderError::MissingCredential("groq", "groq_api_key"));
                }
                settings.groq_api_key.clone()
            }
        };

        let model = model.into();
        Ok(Self {
            endpoint: completion_endpoint(provider, &model),
            provider,
            model,
            api_key,
            http: reqwest::Client::builder()
                .timeout(LLM_TIMEOUT)
                .build()
                .expect("reqwest client construction cannot fail with static options"),
        })
    }

    pub fn provider(&self) -> LlmProviderId {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Gets a chat completion for the given turns.
    ///
    /// Vendor failures are logged and degraded to [`LLM_FALLBACK_RESPONSE`];
    /// this method never errors mid-conversation.
    pub async fn complete(&self, turns: &[ChatTurn]) -> String {
        match self.try_complete(turns).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.as_str(),
                    model = %self.model,
                    "llm completion failed, using fallback: {}",
                    e
                );
                LLM_FALLBACK_RESPONSE.to_string()
            }
        }
    }

    async fn try_complete(&self, turns: &[ChatTurn]) -> Result<String, ProviderError> {
        match self.provider {
            LlmProviderId::Gemini => self.complete_gemini(turns).await,
            LlmProviderId::Groq => self.complete_groq(turns).await,
        }
    }

    /// Gemini `generateContent`: system turns map to `systemInstruction`,
    /// assistant turns to the `model` role.
    async fn complete_gemini(&self, turns: &[ChatTurn]) -> Result<String, ProviderError> {
        let mut system_parts: Vec<Value> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        for turn in turns {
            match turn.role {
                Role::System => system_parts.push(json!({ "text": turn.content })),
                Role::User => {
                    contents.push(json!({ "role": "user", "parts": [{ "text": turn.content }] }))
                }
                Role::Assistant => {
                    contents.push(json!({ "role": "model", "parts": [{ "text": turn.content }] }))
                }
            }
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": MAX_COMPLETION_TOKENS,
                "temperature": COMPLETION_TEMPERATURE,
            },
        });
        if !system_parts.is_empty() {
            body["systemInstruction"] = json!({ "parts": system_parts });
        }

        let response: Value = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
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

    /// Groq speaks the OpenAI chat-completions dialect.
    async fn complete_groq(&self, turns: &[ChatTurn]) -> Result<String, ProviderError> {
        let messages: Vec<Value> = turns
            .iter()
            .map(|t| {
                let role = match t.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({ "role": role, "content": t.content })
            })
            .collect();

        let response: Value = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": COMPLETION_TEMPERATURE,
                "max_tokens": MAX_COMPLETION_TOKENS,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ProviderError::UnexpectedResponse {
                provider: "groq",
                detail: "no message content in response".to_string(),
            })
    }
}
