//! SQLite pool setup.
//!
//! Every connection handed out by the pool goes through the same preparation:
//! WAL journaling, foreign key enforcement, and a busy timeout. The dialer
//! workers and the API handlers share one pool, so WAL matters here — status
//! reads from handlers must not block behind a worker writing contact rows.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Tunables applied to every pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Upper bound on concurrently checked-out connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// The shared SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("could not build sqlite pool: {0}")]
    Build(#[from] r2d2::Error),
}

/// Opens (creating if needed) the database at `db_path` and builds the pool.
///
/// `:memory:` works for tests, but note that each pooled connection then gets
/// its own private database; file-backed paths are required whenever more
/// than one connection must see the same data.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| prepare_connection(conn, settings.busy_timeout_ms));

    Ok(Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?)
}

/// Pragmas applied once per connection, before the pool hands it out.
fn prepare_connection(conn: &Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    // journal_mode is the one pragma that answers back; anything other than
    // "wal" (or "memory", which has no journal file at all) means the switch
    // was refused and the connection must not be used.
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    if mode != "wal" && mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode pragma answered {mode:?}")),
        ));
    }

    conn.pragma_update(None, "foreign_keys", true)?;
    conn.pragma_update(None, "busy_timeout", busy_timeout_ms as i64)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_connections_carry_the_configured_pragmas() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let db_path = dir.path().join("pool_test.db");
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 1_250,
            pool_max_size: 2,
        };

        let pool = create_pool(db_path.to_str().expect("utf-8 path"), settings)
            .expect("pool should build");
        assert_eq!(pool.max_size(), 2);

        let conn = pool.get().expect("should check out a connection");
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .expect("should query journal_mode");
        assert_eq!(mode, "wal");

        let foreign_keys: bool = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .expect("should query foreign_keys");
        assert!(foreign_keys);

        let busy_timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .expect("should query busy_timeout");
        assert_eq!(busy_timeout, 1_250);
    }

    #[test]
    fn in_memory_databases_are_accepted_without_wal() {
        let pool = create_pool(":memory:", DbRuntimeSettings::default())
            .expect("pool should build");
        let conn = pool.get().expect("should check out a connection");

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .expect("should query journal_mode");
        assert_eq!(mode, "memory");
    }
}
