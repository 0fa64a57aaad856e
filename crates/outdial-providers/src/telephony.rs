//! Telephony adapter (Twilio call origination).
//!
//! The dialer hands a number and an agent ID to [`TelephonyClient::originate`]
//! and gets back a call SID. Everything after origination — the media
//! exchange, the caller's answers, the terminal status — happens over the
//! webhook endpoints this client points Twilio at; the dialer never sees it.

use crate::ProviderError;
use serde_json::Value;
use std::time::Duration;

/// Timeout for a single origination request.
const TELEPHONY_TIMEOUT: Duration = Duration::from_secs(30);

/// Twilio account credentials and webhook addressing.
#[derive(Debug, Clone, Default)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    /// Caller ID for outbound calls (E.164).
    pub from_number: String,
    /// Publicly reachable base URL of this server; Twilio fetches call
    /// instructions from `{public_url}/api/calls/webhook`.
    pub public_url: String,
}

/// A Twilio call-origination client.
#[derive(Debug, Clone)]
pub struct TelephonyClient {
    settings: TwilioSettings,
    http: reqwest::Client,
}

impl TelephonyClient {
    /// Builds a client from Twilio settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingCredential`] if the account SID, auth
    /// token, or caller number is not configured.
    pub fn new(settings: TwilioSettings) -> Result<Self, ProviderError> {
        if settings.account_sid.is_empty() {
            return Err(ProviderError::MissingCredential("twilio", "account_sid"));
        }
        if settings.auth_token.is_empty() {
            return Err(ProviderError::MissingCredential("twilio", "auth_token"));
        }
        if settings.from_number.is_empty() {
            return Err(ProviderError::MissingCredential("twilio", "from_number"));
        }

        Ok(Self {
            settings,
            http: reqwest::Client::builder()
                .timeout(TELEPHONY_TIMEOUT)
                .build()
                .expect("reqwest client construction cannot fail with static options"),
        })
    }

    /// Places an outbound call to `to_number`, instructing Twilio to drive
    /// the conversation through this server's webhook for the given agent.
    ///
    /// Returns the Twilio call SID. A synchronous error here means the call
    /// was never placed; asynchronous outcomes arrive on the status callback.
    pub async fn originate(&self, to_number: &str, agent_id: i64) -> Result<String, ProviderError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Calls.json",
            self.settings.account_sid
        );
        let webhook_url = format!(
            "{}/api/calls/webhook?agent_id={}",
            self.settings.public_url.trim_end_matches('/'),
            agent_id
        );
        let status_callback = format!(
            "{}/api/calls/status?agent_id={}",
            self.settings.public_url.trim_end_matches('/'),
            agent_id
        );

        let response: Value = self
            .http
            .post(&url)
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[
                ("To", to_number),
                ("From", self.settings.from_number.as_str()),
                ("Url", webhook_url.as_str()),
                ("StatusCallback", status_callback.as_str()),
                ("StatusCallbackEvent", "completed"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let sid = response["sid"]
            .as_str()
            .ok_or_else(|| ProviderError::UnexpectedResponse {
                provider: "twilio",
                detail: "no call sid in response".to_string(),
            })?
            .to_string();

        tracing::info!(to = to_number, agent_id, call_sid = %sid, "originated call");
        Ok(sid)
    }
}
