//! SQLite-based storage for routines, streaks and app state.
//!
//! Provides persistent storage for:
//! - Routines and their ordered tasks
//! - Streak records and the per-day completion log
//! - Achievement unlock state
//! - Key-value store for application state

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::data_dir;
use super::migrations;
use crate::achievements::{Achievement, AchievementDef};
use crate::error::{CoreError, DatabaseError, Result, ValidationError};
use crate::routine::{Routine, Task};
use crate::streak::{CompletionRecord, StreakRecord, StreakStore};

/// SQLite database shared by the CLI and the streak tracker.
///
/// The connection sits behind a `Mutex` so the handle is `Sync` and can be
/// shared across threads; every operation holds the lock for its duration.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/routinely/routinely.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join("routinely.db"))
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self::init(conn)?;
        info!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the underlying SQLite connection.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Database(DatabaseError::Poisoned))
    }

    // ── Routines ─────────────────────────────────────────────────────

    /// Insert a new routine with its tasks.
    ///
    /// # Errors
    /// Returns a validation error for an empty title, or a database error
    /// if the id already exists.
    pub fn insert_routine(&self, routine: &Routine) -> Result<()> {
        routine.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO routines (id, title, description, timer_enabled, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                routine.id,
                routine.title,
                routine.description,
                routine.timer_enabled,
                Utc::now().to_rfc3339(),
            ],
        )?;
        insert_tasks(&tx, &routine.id, &routine.tasks)?;
        tx.commit()?;
        debug!(routine_id = %routine.id, tasks = routine.tasks.len(), "routine inserted");
        Ok(())
    }

    /// Update a routine's fields and replace its task list.
    pub fn update_routine(&self, routine: &Routine) -> Result<()> {
        routine.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE routines SET title = ?2, description = ?3, timer_enabled = ?4 WHERE id = ?1",
            params![
                routine.id,
                routine.title,
                routine.description,
                routine.timer_enabled
            ],
        )?;
        if changed == 0 {
            return Err(routine_not_found(&routine.id));
        }
        tx.execute("DELETE FROM tasks WHERE routine_id = ?1", params![routine.id])?;
        insert_tasks(&tx, &routine.id, &routine.tasks)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_routine(&self, id: &str) -> Result<Option<Routine>> {
        let conn = self.conn()?;
        let routine = conn
            .query_row(
                "SELECT id, title, description, timer_enabled FROM routines WHERE id = ?1",
                params![id],
                routine_from_row,
            )
            .optional()?;
        match routine {
            Some(mut routine) => {
                routine.tasks = load_tasks(&conn, &routine.id)?;
                Ok(Some(routine))
            }
            None => Ok(None),
        }
    }

    /// All routines ordered by creation time.
    pub fn list_routines(&self) -> Result<Vec<Routine>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, timer_enabled FROM routines
             ORDER BY created_at, rowid",
        )?;
        let mut routines = stmt
            .query_map([], routine_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for routine in &mut routines {
            routine.tasks = load_tasks(&conn, &routine.id)?;
        }
        Ok(routines)
    }

    /// Delete a routine; its tasks, streak and completions cascade.
    ///
    /// Returns `false` if no routine had that id.
    pub fn delete_routine(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM routines WHERE id = ?1", params![id])?;
        if changed > 0 {
            info!(routine_id = %id, "routine deleted");
        }
        Ok(changed > 0)
    }

    pub fn routine_count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM routines", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── Streak aggregates ────────────────────────────────────────────

    /// Highest `longest_streak` across all routines.
    pub fn max_longest_streak(&self) -> Result<u32> {
        let conn = self.conn()?;
        let max = conn.query_row(
            "SELECT COALESCE(MAX(longest_streak), 0) FROM streaks",
            [],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    // ── Achievements ─────────────────────────────────────────────────

    /// Insert catalogue entries that are not stored yet; existing rows keep
    /// their unlock state.
    pub fn seed_achievements(&self, catalogue: &[AchievementDef]) -> Result<()> {
        let conn = self.conn()?;
        for def in catalogue {
            conn.execute(
                "INSERT OR IGNORE INTO achievements (id, title, description) VALUES (?1, ?2, ?3)",
                params![def.id, def.title, def.description],
            )?;
        }
        Ok(())
    }

    pub fn achievements(&self) -> Result<Vec<Achievement>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, unlocked, unlocked_at FROM achievements ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, title, description, unlocked, unlocked_at)| -> Result<Achievement> {
                let unlocked_at = unlocked_at
                    .map(|s| {
                        DateTime::parse_from_rfc3339(&s)
                            .map(|dt| dt.with_timezone(&Utc))
                            .map_err(|_| corrupt("unlocked_at", &s))
                    })
                    .transpose()?;
                Ok(Achievement {
                    id,
                    title,
                    description,
                    unlocked,
                    unlocked_at,
                })
            })
            .collect()
    }

    /// Mark an achievement unlocked. Returns `false` if it already was.
    pub fn unlock_achievement(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE achievements SET unlocked = 1, unlocked_at = ?2 WHERE id = ?1 AND unlocked = 0",
            params![id, at.to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Add `by` to a numeric kv entry (missing counts as zero) and return the new value.
    pub fn kv_increment(&self, key: &str, by: u64) -> Result<u64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current = match tx
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
        {
            Some(raw) => raw.parse::<u64>().map_err(|_| corrupt("kv.value", &raw))?,
            None => 0,
        };
        let next = current.saturating_add(by);
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, next.to_string()],
        )?;
        tx.commit()?;
        Ok(next)
    }
}

impl StreakStore for Database {
    fn streak(&self, routine_id: &str) -> Result<Option<StreakRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT routine_id, current_streak, longest_streak, last_completed_date,
                        streak_goal, streak_saver_used, streak_saver_available, days_completed
                 FROM streaks WHERE routine_id = ?1",
                params![routine_id],
                |row| {
                    Ok((
                        StreakRecord {
                            routine_id: row.get(0)?,
                            current_streak: row.get(1)?,
                            longest_streak: row.get(2)?,
                            last_completed_date: None,
                            streak_goal: row.get(4)?,
                            streak_saver_used: row.get(5)?,
                            streak_saver_available: row.get(6)?,
                            days_completed: row.get(7)?,
                        },
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(mut record, last)| -> Result<StreakRecord> {
            record.last_completed_date = last
                .map(|s| parse_date("last_completed_date", &s))
                .transpose()?;
            Ok(record)
        })
        .transpose()
    }

    fn upsert_streak(&self, record: &StreakRecord) -> Result<()> {
        write_streak(&*self.conn()?, record)?;
        Ok(())
    }

    fn insert_completion(&self, record: &CompletionRecord) -> Result<()> {
        write_completion(&*self.conn()?, record)?;
        Ok(())
    }

    fn record_completion(&self, completion: &CompletionRecord, streak: &StreakRecord) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        write_completion(&tx, completion)?;
        write_streak(&tx, streak)?;
        tx.commit()?;
        Ok(())
    }

    fn completion_on(&self, routine_id: &str, date: NaiveDate) -> Result<Option<CompletionRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT routine_id, completed_date, is_streak_saver FROM completion_records
                 WHERE routine_id = ?1 AND completed_date = ?2",
                params![routine_id, date.to_string()],
                completion_columns,
            )
            .optional()?;
        row.map(completion_from_columns).transpose()
    }

    fn completions(&self, routine_id: &str) -> Result<Vec<CompletionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT routine_id, completed_date, is_streak_saver FROM completion_records
             WHERE routine_id = ?1 ORDER BY completed_date DESC",
        )?;
        let rows = stmt
            .query_map(params![routine_id], completion_columns)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(completion_from_columns).collect()
    }

    fn completions_between(
        &self,
        routine_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CompletionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT routine_id, completed_date, is_streak_saver FROM completion_records
             WHERE routine_id = ?1 AND completed_date BETWEEN ?2 AND ?3
             ORDER BY completed_date DESC",
        )?;
        let rows = stmt
            .query_map(
                params![routine_id, from.to_string(), to.to_string()],
                completion_columns,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(completion_from_columns).collect()
    }

    fn delete_streak_data(&self, routine_id: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM completion_records WHERE routine_id = ?1",
            params![routine_id],
        )?;
        tx.execute("DELETE FROM streaks WHERE routine_id = ?1", params![routine_id])?;
        tx.commit()?;
        Ok(())
    }
}

fn write_streak(conn: &Connection, record: &StreakRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO streaks
            (routine_id, current_streak, longest_streak, last_completed_date,
             streak_goal, streak_saver_used, streak_saver_available, days_completed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.routine_id,
            record.current_streak,
            record.longest_streak,
            record.last_completed_date.map(|d| d.to_string()),
            record.streak_goal,
            record.streak_saver_used,
            record.streak_saver_available,
            record.days_completed,
        ],
    )?;
    Ok(())
}

fn write_completion(conn: &Connection, record: &CompletionRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO completion_records (routine_id, completed_date, is_streak_saver)
         VALUES (?1, ?2, ?3)",
        params![
            record.routine_id,
            record.completed_date.to_string(),
            record.is_streak_saver
        ],
    )?;
    Ok(())
}

fn insert_tasks(conn: &Connection, routine_id: &str, tasks: &[Task]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO tasks (id, routine_id, position, title, description,
                            duration_minutes, duration_seconds, timer_enabled)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (position, task) in tasks.iter().enumerate() {
        stmt.execute(params![
            task.id,
            routine_id,
            position as i64,
            task.title,
            task.description,
            task.duration_minutes,
            task.duration_seconds,
            task.timer_enabled,
        ])?;
    }
    Ok(())
}

fn load_tasks(conn: &Connection, routine_id: &str) -> rusqlite::Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, duration_minutes, duration_seconds, timer_enabled
         FROM tasks WHERE routine_id = ?1 ORDER BY position",
    )?;
    let tasks = stmt
        .query_map(params![routine_id], |row| {
            Ok(Task {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                duration_minutes: row.get(3)?,
                duration_seconds: row.get(4)?,
                timer_enabled: row.get(5)?,
            })
        })?
        .collect();
    tasks
}

fn routine_from_row(row: &Row<'_>) -> rusqlite::Result<Routine> {
    Ok(Routine {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        tasks: Vec::new(),
        timer_enabled: row.get(3)?,
    })
}

fn completion_columns(row: &Row<'_>) -> rusqlite::Result<(String, String, bool)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn completion_from_columns(
    (routine_id, date, is_streak_saver): (String, String, bool),
) -> Result<CompletionRecord> {
    Ok(CompletionRecord {
        routine_id,
        completed_date: parse_date("completed_date", &date)?,
        is_streak_saver,
    })
}

fn parse_date(column: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| corrupt(column, value))
}

fn corrupt(column: &str, value: &str) -> CoreError {
    CoreError::Database(DatabaseError::Corrupt {
        column: column.to_string(),
        value: value.to_string(),
    })
}

fn routine_not_found(id: &str) -> CoreError {
    CoreError::Validation(ValidationError::NotFound {
        entity: "routine".into(),
        id: id.to_string(),
    })
}
