//! SQLite-based save storage and focus statistics.
//!
//! Provides persistent storage for:
//! - Completed focus sessions
//! - Session statistics (daily and all-time)
//! - Key-value store for saved game state

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PersistenceError;
use crate::focus::{SessionReport, SessionType};

use super::data_dir;
use super::persistence::Persistence;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub session_type: String,
    pub minutes: u64,
    pub reward: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_focus_min: u64,
    pub total_break_min: u64,
    pub completed_work_sessions: u64,
    pub total_rewards: u64,
    pub today_sessions: u64,
    pub today_focus_min: u64,
}

/// SQLite database holding the key-value save store and the focus
/// session history.
pub struct Database {
    conn: Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.conn.path())
            .finish()
    }
}

fn session_type_str(session_type: SessionType) -> &'static str {
    match session_type {
        SessionType::Work => "work",
        SessionType::Break => "break",
        SessionType::LongBreak => "long_break",
    }
}

impl Database {
    /// Open the database at `~/.config/idlebuddy/idlebuddy.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, PersistenceError> {
        let dir = data_dir().map_err(|e| PersistenceError::OpenFailed {
            path: "idlebuddy.db".into(),
            message: e.to_string(),
        })?;
        Self::open_at(&dir.join("idlebuddy.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(|e| PersistenceError::OpenFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS focus_sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                session_type TEXT NOT NULL,
                minutes      INTEGER NOT NULL,
                reward       INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_focus_sessions_completed_at
                ON focus_sessions(completed_at);",
        )?;
        Ok(())
    }

    /// Record a completed focus session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(
        &self,
        report: &SessionReport,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, PersistenceError> {
        self.conn.execute(
            "INSERT INTO focus_sessions (session_type, minutes, reward, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_type_str(report.session_type),
                report.minutes as u64,
                report.reward,
                completed_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_type, minutes, reward, completed_at
             FROM focus_sessions
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, session_type, minutes, reward, completed_at) = row?;
            let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                .map_err(|e| PersistenceError::Corrupt {
                    key: format!("focus_sessions.{id}"),
                    message: e.to_string(),
                })?
                .with_timezone(&Utc);
            records.push(SessionRecord {
                id,
                session_type,
                minutes,
                reward,
                completed_at,
            });
        }
        Ok(records)
    }

    /// All-time totals plus the totals for `today` (UTC).
    pub fn stats_all(&self, today: NaiveDate) -> Result<Stats, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT session_type, COUNT(*), COALESCE(SUM(minutes), 0), COALESCE(SUM(reward), 0)
             FROM focus_sessions
             GROUP BY session_type",
        )?;

        let mut stats = Stats::default();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
            ))
        })?;

        for row in rows {
            let (session_type, count, minutes, reward) = row?;
            stats.total_sessions += count;
            stats.total_rewards += reward;
            match session_type.as_str() {
                "work" => {
                    stats.completed_work_sessions += count;
                    stats.total_focus_min += minutes;
                }
                "break" | "long_break" => {
                    stats.total_break_min += minutes;
                }
                _ => {}
            }
        }

        // Today's work sessions
        let mut stmt2 = self.conn.prepare(
            "SELECT COUNT(*), COALESCE(SUM(minutes), 0)
             FROM focus_sessions
             WHERE session_type = 'work' AND completed_at >= ?1 AND completed_at < ?2",
        )?;
        let next_day = today.succ_opt().unwrap_or(today);
        let row = stmt2.query_row(
            params![
                format!("{today}T00:00:00+00:00"),
                format!("{next_day}T00:00:00+00:00")
            ],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        stats.today_sessions = row.0;
        stats.today_focus_min = row.1;

        Ok(stats)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Returns whether the key existed.
    pub fn kv_delete(&self, key: &str) -> Result<bool, PersistenceError> {
        let n = self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }
}

impl Persistence for Database {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, PersistenceError> {
        match self.kv_get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| PersistenceError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn save(&mut self, key: &str, value: &serde_json::Value) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(value)?;
        debug!(key, bytes = raw.len(), "kv save");
        self.kv_set(key, &raw)
    }

    fn remove(&mut self, key: &str) -> Result<bool, PersistenceError> {
        self.kv_delete(key)
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        // Autocommit mode: every statement is already durable.
        Ok(())
    }
}
