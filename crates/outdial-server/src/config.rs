//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Campaign dialer pacing and worker settings.
    #[serde(default)]
    pub dialer: DialerSection,

    /// Vendor API credentials.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Twilio telephony settings. Required only in live (non-simulation) mode.
    #[serde(default)]
    pub twilio: TwilioConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Publicly reachable base URL, used in telephony webhook and audio URLs.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Directory where synthesized call audio is written and served from.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "outdial_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Dialer configuration, in seconds where durations are involved.
#[derive(Debug, Clone, Deserialize)]
pub struct DialerSection {
    /// Fabricate call outcomes instead of placing real calls.
    #[serde(default = "default_true")]
    pub simulation: bool,

    /// Number of campaign worker tasks.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Queued campaign runs beyond the active ones.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Duration of a fabricated call in simulation mode.
    #[serde(default = "default_simulated_call_secs")]
    pub simulated_call_duration_secs: u64,

    /// Pause between contacts in live mode.
    #[serde(default = "default_inter_call_secs")]
    pub inter_call_delay_secs: u64,

    /// Pause between contacts in simulation mode.
    #[serde(default = "default_simulated_inter_call_secs")]
    pub simulated_inter_call_delay_secs: u64,

    /// Probability that a simulated call completes.
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

/// Vendor API credentials. An empty key disables the corresponding provider;
/// selecting a disabled provider on an agent fails at client construction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default)]
    pub groq_api_key: String,
    #[serde(default)]
    pub deepgram_api_key: String,
    #[serde(default)]
    pub deepgram_model: Option<String>,
    #[serde(default)]
    pub gemini_stt_model: Option<String>,
    #[serde(default)]
    pub elevenlabs_api_key: String,
    #[serde(default)]
    pub elevenlabs_model_id: Option<String>,
}

/// Twilio account settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// Caller ID for outbound calls (E.164).
    #[serde(default)]
    pub from_number: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_audio_dir() -> String {
    "audio".to_string()
}

fn default_db_path() -> String {
    "outdial.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    32
}

fn default_simulated_call_secs() -> u64 {
    3
}

fn default_inter_call_secs() -> u64 {
    10
}

fn default_simulated_inter_call_secs() -> u64 {
    5
}

fn default_success_rate() -> f64 {
    0.8
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            audio_dir: default_audio_dir(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for DialerSection {
    fn default() -> Self {
        Self {
            simulation: true,
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            simulated_call_duration_secs: default_simulated_call_secs(),
            inter_call_delay_secs: default_inter_call_secs(),
            simulated_inter_call_delay_secs: default_simulated_inter_call_secs(),
            success_rate: default_success_rate(),
        }
    }
}

impl DialerSection {
    /// Converts the section into the dialer's own config type.
    pub fn to_dialer_config(&self) -> outdial_dialer::DialerConfig {
        outdial_dialer::DialerConfig {
            simulation: self.simulation,
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            simulated_call_duration: std::time::Duration::from_secs(
                self.simulated_call_duration_secs,
            ),
            inter_call_delay: std::time::Duration::from_secs(self.inter_call_delay_secs),
            simulated_inter_call_delay: std::time::Duration::from_secs(
                self.simulated_inter_call_delay_secs,
            ),
            success_rate: self.success_rate,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `OUTDIAL_HOST` overrides `server.host`
/// - `OUTDIAL_PORT` overrides `server.port`
/// - `OUTDIAL_PUBLIC_URL` overrides `server.public_url`
/// - `OUTDIAL_DB_PATH` overrides `database.path`
/// - `OUTDIAL_LOG_LEVEL` overrides `logging.level`
/// - `OUTDIAL_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `OUTDIAL_SIMULATION` overrides `dialer.simulation`
/// - `OUTDIAL_GEMINI_API_KEY`, `OUTDIAL_GROQ_API_KEY`,
///   `OUTDIAL_DEEPGRAM_API_KEY`, `OUTDIAL_ELEVENLABS_API_KEY` override the
///   corresponding provider credentials
/// - `OUTDIAL_TWILIO_ACCOUNT_SID`, `OUTDIAL_TWILIO_AUTH_TOKEN`,
///   `OUTDIAL_TWILIO_FROM_NUMBER` override the Twilio settings
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("OUTDIAL_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("OUTDIAL_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(public_url) = std::env::var("OUTDIAL_PUBLIC_URL") {
        config.server.public_url = public_url;
    }
    if let Ok(db_path) = std::env::var("OUTDIAL_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("OUTDIAL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("OUTDIAL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(simulation) = std::env::var("OUTDIAL_SIMULATION") {
        config.dialer.simulation = simulation == "true" || simulation == "1";
    }
    if let Ok(key) = std::env::var("OUTDIAL_GEMINI_API_KEY") {
        config.providers.gemini_api_key = key;
    }
    if let Ok(key) = std::env::var("OUTDIAL_GROQ_API_KEY") {
        config.providers.groq_api_key = key;
    }
    if let Ok(key) = std::env::var("OUTDIAL_DEEPGRAM_API_KEY") {
        config.providers.deepgram_api_key = key;
    }
    if let Ok(key) = std::env::var("OUTDIAL_ELEVENLABS_API_KEY") {
        config.providers.elevenlabs_api_key = key;
    }
    if let Ok(sid) = std::env::var("OUTDIAL_TWILIO_ACCOUNT_SID") {
        config.twilio.account_sid = sid;
    }
    if let Ok(token) = std::env::var("OUTDIAL_TWILIO_AUTH_TOKEN") {
        config.twilio.auth_token = token;
    }
    if let Ok(number) = std::env::var("OUTDIAL_TWILIO_FROM_NUMBER") {
        config.twilio.from_number = number;
    }

    Ok(config)
}
