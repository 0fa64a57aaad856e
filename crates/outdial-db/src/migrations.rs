//! Schema migrations, embedded in the binary.
//!
//! Each migration is an SQL file compiled in with `include_str!` and applied
//! at most once, in declaration order. Applied names live in the
//! `_outdial_migrations` table, so startup against an up-to-date database is
//! a no-op.

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Ordered migration list; append-only.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_call_logs",
        sql: include_str!("migrations/001_call_logs.sql"),
    },
    Migration {
        name: "002_agent_call_status",
        sql: include_str!("migrations/002_agent_call_status.sql"),
    },
];

#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration's SQL (or its bookkeeping) failed to execute.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    /// The applied-migrations table could not be read.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

impl MigrationError {
    fn failed_in(name: &str) -> impl FnOnce(rusqlite::Error) -> Self + '_ {
        move |source| Self::ExecutionFailed {
            name: name.to_string(),
            source,
        }
    }
}

/// Brings the schema up to date, returning how many migrations were applied.
///
/// # Errors
///
/// Returns [`MigrationError`] when a migration's SQL fails or the tracking
/// table cannot be queried. A failed migration leaves no partial schema
/// behind; each one runs inside its own transaction.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    ensure_tracking_table(conn)?;

    let mut applied = 0;
    for migration in migrations {
        if is_applied(conn, migration.name)? {
            tracing::debug!(migration = migration.name, "already applied, skipping");
            continue;
        }
        apply_one(conn, migration)?;
        applied += 1;
    }
    Ok(applied)
}

fn ensure_tracking_table(conn: &Connection) -> Result<(), MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _outdial_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(MigrationError::failed_in("_outdial_migrations_bootstrap"))
}

fn is_applied(conn: &Connection, name: &str) -> Result<bool, MigrationError> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM _outdial_migrations WHERE name = ?1",
        [name],
        |row| row.get(0),
    )
    .map_err(MigrationError::StateQuery)
}

/// Runs one migration's SQL and its tracking insert in a single transaction,
/// so a mid-migration failure rolls the schema change back with it.
fn apply_one(conn: &Connection, migration: &Migration) -> Result<(), MigrationError> {
    tracing::info!(migration = migration.name, "applying migration");
    let fail = || MigrationError::failed_in(migration.name);

    let tx = conn.unchecked_transaction().map_err(fail())?;
    tx.execute_batch(migration.sql).map_err(fail())?;
    tx.execute(
        "INSERT INTO _outdial_migrations (name) VALUES (?1)",
        [migration.name],
    )
    .map_err(fail())?;
    tx.commit().map_err(fail())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn fresh_conn() -> Connection {
        Connection::open_in_memory().expect("should open in-memory db")
    }

    #[test]
    fn run_migrations_on_fresh_db() {
        let conn = fresh_conn();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, 3, "should apply all migrations");

        let tracked: i32 = conn
            .query_row("SELECT COUNT(*) FROM _outdial_migrations", [], |row| {
                row.get(0)
            })
            .expect("should query migration count");
        assert_eq!(tracked, 3);
    }

    #[test]
    fn run_migrations_idempotent() {
        let conn = fresh_conn();
        assert_eq!(run_migrations(&conn).expect("first run should succeed"), 3);
        assert_eq!(
            run_migrations(&conn).expect("second run should succeed"),
            0,
            "no new migrations to apply"
        );
    }

    #[test]
    fn agent_status_columns_exist_after_upgrade() {
        let conn = fresh_conn();
        run_migrations(&conn).expect("migrations should succeed");

        conn.execute(
            "INSERT INTO agents (name, system_prompt) VALUES ('a', 'p')",
            [],
        )
        .expect("insert should succeed");

        let (status, time): (String, Option<String>) = conn
            .query_row(
                "SELECT last_call_status, last_call_time FROM agents WHERE name = 'a'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("status columns should exist");
        assert_eq!(status, "idle");
        assert_eq!(time, None);
    }

    #[test]
    fn migration_side_effects_rollback_when_tracking_insert_fails() {
        let conn = fresh_conn();
        let migrations = [Migration {
            name: "001_tracking_insert_conflict",
            sql: "
                CREATE TABLE rollback_marker (id INTEGER PRIMARY KEY);
                INSERT INTO _outdial_migrations (name) VALUES ('001_tracking_insert_conflict');
            ",
        }];

        let err = run_migrations_from_list(&conn, &migrations)
            .expect_err("tracking insert conflict should fail migration");

        match err {
            MigrationError::ExecutionFailed { name, .. } => {
                assert_eq!(name, "001_tracking_insert_conflict")
            }
            other => panic!("unexpected error type: {other:?}"),
        }

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'rollback_marker')",
                [],
                |row| row.get(0),
            )
            .expect("should query sqlite_master");

        assert!(
            !exists,
            "schema side effects should be rolled back when tracking insert fails"
        );
    }
}
