//! Database schema migrations for routinely.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{info, warn};

/// Schema version after all migrations have run.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }
    if current_version < SCHEMA_VERSION {
        info!(from = current_version, to = SCHEMA_VERSION, "database schema migrated");
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: routines and their ordered tasks.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS routines (
            id            TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            description   TEXT NOT NULL DEFAULT '',
            timer_enabled INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id               TEXT PRIMARY KEY,
            routine_id       TEXT NOT NULL REFERENCES routines(id) ON DELETE CASCADE,
            position         INTEGER NOT NULL,
            title            TEXT NOT NULL,
            description      TEXT NOT NULL DEFAULT '',
            duration_minutes INTEGER NOT NULL DEFAULT 0,
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            timer_enabled    INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_routine_position ON tasks(routine_id, position);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: streak records and the per-day completion log.
///
/// Completion dates are stored as ISO `YYYY-MM-DD` text so lexical order
/// matches calendar order.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS streaks (
            routine_id             TEXT PRIMARY KEY REFERENCES routines(id) ON DELETE CASCADE,
            current_streak         INTEGER NOT NULL DEFAULT 0,
            longest_streak         INTEGER NOT NULL DEFAULT 0,
            last_completed_date    TEXT,
            streak_goal            INTEGER NOT NULL DEFAULT 30,
            streak_saver_used      INTEGER NOT NULL DEFAULT 0,
            streak_saver_available INTEGER NOT NULL DEFAULT 1,
            days_completed         INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS completion_records (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            routine_id      TEXT NOT NULL REFERENCES routines(id) ON DELETE CASCADE,
            completed_date  TEXT NOT NULL,
            is_streak_saver INTEGER NOT NULL DEFAULT 0,
            UNIQUE(routine_id, completed_date)
        );

        CREATE INDEX IF NOT EXISTS idx_completion_records_date
            ON completion_records(routine_id, completed_date);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: achievements and the key-value table for app state.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS achievements (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            description TEXT NOT NULL,
            unlocked    INTEGER NOT NULL DEFAULT 0,
            unlocked_at TEXT
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()
}
