//! Outdial server binary — the main entry point for the Outdial platform.
//!
//! Starts an axum HTTP server with structured logging, database
//! initialization, the campaign dialer worker pool, and graceful shutdown on
//! SIGTERM/SIGINT.

use outdial_providers::{LlmSettings, SttSettings, TelephonyClient, TtsSettings, TwilioSettings};
use outdial_server::{app, config, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("OUTDIAL_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = outdial_db::create_pool(
        &config.database.path,
        outdial_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool — check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied = outdial_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    // Telephony is mandatory in live mode: a dialer with nowhere to place
    // calls would mark every contact failed, so fail fast at startup instead.
    let telephony = if config.dialer.simulation {
        tracing::info!("simulation mode enabled, call outcomes will be fabricated");
        None
    } else {
        let client = TelephonyClient::new(TwilioSettings {
            account_sid: config.twilio.account_sid.clone(),
            auth_token: config.twilio.auth_token.clone(),
            from_number: config.twilio.from_number.clone(),
            public_url: config.server.public_url.clone(),
        })
        .expect("live mode requires Twilio credentials — set [twilio] in config");
        Some(Arc::new(client))
    };

    // Spawn the campaign dialer worker pool on this runtime.
    let dialer = outdial_dialer::Dialer::spawn(
        pool.clone(),
        telephony,
        config.dialer.to_dialer_config(),
    );

    let state = AppState {
        pool,
        dialer,
        sessions: Arc::new(outdial_agent::SessionStore::new()),
        llm_settings: LlmSettings {
            gemini_api_key: config.providers.gemini_api_key.clone(),
            groq_api_key: config.providers.groq_api_key.clone(),
        },
        stt_settings: SttSettings {
            deepgram_api_key: config.providers.deepgram_api_key.clone(),
            deepgram_model: config.providers.deepgram_model.clone(),
            gemini_api_key: config.providers.gemini_api_key.clone(),
            gemini_model: config.providers.gemini_stt_model.clone(),
        },
        tts_settings: TtsSettings {
            elevenlabs_api_key: config.providers.elevenlabs_api_key.clone(),
            elevenlabs_model_id: config.providers.elevenlabs_model_id.clone(),
        },
        audio_dir: config.server.audio_dir.clone().into(),
        public_url: config.server.public_url.clone(),
    };

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting outdial server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("outdial server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
