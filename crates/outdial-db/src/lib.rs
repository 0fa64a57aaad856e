//! Database layer for the Outdial platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and query helpers for the Agent, Campaign,
//! Contact, and CallLog tables. Every table is created through versioned
//! migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: a single-server deployment needs no external
//!   database process. WAL allows concurrent readers with a single writer,
//!   which matches the access pattern of one dialer worker pool plus API
//!   handlers.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema ships with the server and cannot drift
//!   from the code that depends on it. The agent call-status columns arrive
//!   through a later additive migration, letting pre-existing databases
//!   upgrade in place.

mod agents;
mod call_logs;
mod campaigns;
mod migrations;
mod pool;

pub use agents::{
    create_agent, get_agent, list_agents, update_agent, update_agent_call_status, NewAgent,
    UpdateAgent,
};
pub use call_logs::{create_call_log, list_call_logs, NewCallLog};
pub use campaigns::{
    campaign_status_breakdown, create_campaign, get_campaign, list_campaigns, list_contacts,
    resolve_calling_contact, set_campaign_status, set_contact_status, NewCampaign, StatusBreakdown,
};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};

use outdial_types::ParseEnumError;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

/// Errors surfaced by the query helpers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("{0} not found: {1}")]
    NotFound(&'static str, i64),
    #[error(transparent)]
    Parse(#[from] ParseEnumError),
}

/// Checks a connection out of the pool, mapping pool exhaustion into
/// [`StoreError`] so callers keep a single error type.
pub fn conn(pool: &DbPool) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
    Ok(pool.get()?)
}
