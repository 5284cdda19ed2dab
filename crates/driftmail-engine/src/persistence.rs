//! SQLite-backed persistence for lifecycle runs and step checkpoints.
//! Survives restarts; a resumed process picks up every run exactly where
//! its last checkpoint left it.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use driftmail_core::error::{DriftmailError, Result};
use driftmail_core::types::SignupPayload;
use rusqlite::{Connection, OptionalExtension, params};

use crate::run::{LifecycleRun, RunState};

/// SQLite store for all notifier data. The connection is mutex-wrapped so
/// the store can be shared between the tick loop and the gateway.
pub struct NotifierDb {
    conn: Mutex<Connection>,
}

fn ts_to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn ts_from_db(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DriftmailError::Store(format!("Bad timestamp '{s}': {e}")))
}

impl NotifierDb {
    /// Open or create the notifier database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DriftmailError::Store(format!("DB open: {e}")))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DriftmailError::Store(format!("DB open: {e}")))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch(
                "
            -- One durable run per user, keyed by email
            CREATE TABLE IF NOT EXISTS lifecycle_runs (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                full_name TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'signup',
                iteration INTEGER NOT NULL DEFAULT 0,
                next_wake TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Durably recorded step completions; replay returns the output
            CREATE TABLE IF NOT EXISTS step_checkpoints (
                run_id TEXT NOT NULL,
                step_key TEXT NOT NULL,
                output TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                PRIMARY KEY (run_id, step_key)
            );

            -- The platform's user table; read-only from the notifier
            CREATE TABLE IF NOT EXISTS users (
                email TEXT PRIMARY KEY,
                full_name TEXT NOT NULL DEFAULT '',
                last_activity_date TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_runs_next_wake
                ON lifecycle_runs(next_wake);
         ",
            )
            .map_err(|e| DriftmailError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    // ─── Lifecycle runs ───────────────────────────────────────

    /// Persist updates to a run, replacing its previous row by id. New runs
    /// go through `create_run_if_absent`, never through this.
    pub fn save_run(&self, run: &LifecycleRun) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT OR REPLACE INTO lifecycle_runs
                 (id, email, full_name, state, iteration, next_wake, attempts,
                  last_error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    run.id,
                    run.email,
                    run.full_name,
                    run.state.as_db_str(),
                    run.iteration,
                    run.next_wake.map(ts_to_db),
                    run.attempts,
                    run.last_error,
                    ts_to_db(run.created_at),
                    ts_to_db(run.updated_at),
                ],
            )
            .map_err(|e| DriftmailError::Store(format!("Save run: {e}")))?;
        Ok(())
    }

    /// Create a run for a signup unless one already exists for the email.
    /// Returns the run and whether it was newly created — this is what
    /// makes the welcome step once-per-signup even if the trigger fires
    /// twice. Creation is a single conflict-guarded insert: two racing
    /// triggers for the same email cannot replace each other's row, so the
    /// first run's checkpoints stay attached to the surviving run id.
    pub fn create_run_if_absent(
        &self,
        payload: &SignupPayload,
        now: DateTime<Utc>,
    ) -> Result<(LifecycleRun, bool)> {
        let run = LifecycleRun::new(payload, now);
        let inserted = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO lifecycle_runs
                 (id, email, full_name, state, iteration, next_wake, attempts,
                  last_error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(email) DO NOTHING",
                params![
                    run.id,
                    run.email,
                    run.full_name,
                    run.state.as_db_str(),
                    run.iteration,
                    run.next_wake.map(ts_to_db),
                    run.attempts,
                    run.last_error,
                    ts_to_db(run.created_at),
                    ts_to_db(run.updated_at),
                ],
            )
            .map_err(|e| DriftmailError::Store(format!("Create run: {e}")))?;
        if inserted > 0 {
            return Ok((run, true));
        }
        let existing = self.get_run_by_email(&payload.email)?.ok_or_else(|| {
            DriftmailError::Store(format!("Run for {} vanished during creation", payload.email))
        })?;
        Ok((existing, false))
    }

    pub fn get_run_by_email(&self, email: &str) -> Result<Option<LifecycleRun>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                "SELECT id, email, full_name, state, iteration, next_wake,
                        attempts, last_error, created_at, updated_at
                 FROM lifecycle_runs WHERE email = ?1",
                params![email],
                raw_run_from_row,
            )
            .optional()
            .map_err(|e| DriftmailError::Store(format!("Get run: {e}")))?;
        raw.map(RawRun::into_run).transpose()
    }

    /// Runs that should be driven now: live state and a wake time in the
    /// past, oldest wake first.
    pub fn due_runs(&self, now: DateTime<Utc>) -> Result<Vec<LifecycleRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, email, full_name, state, iteration, next_wake,
                        attempts, last_error, created_at, updated_at
                 FROM lifecycle_runs
                 WHERE state NOT IN ('terminated', 'halted')
                   AND next_wake IS NOT NULL
                   AND next_wake <= ?1
                 ORDER BY next_wake ASC",
            )
            .map_err(|e| DriftmailError::Store(format!("Due runs: {e}")))?;
        let raws = stmt
            .query_map(params![ts_to_db(now)], raw_run_from_row)
            .map_err(|e| DriftmailError::Store(format!("Due runs: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| DriftmailError::Store(format!("Due runs: {e}")))?;
        raws.into_iter().map(RawRun::into_run).collect()
    }

    /// All runs, newest first.
    pub fn list_runs(&self) -> Result<Vec<LifecycleRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, email, full_name, state, iteration, next_wake,
                        attempts, last_error, created_at, updated_at
                 FROM lifecycle_runs ORDER BY created_at DESC",
            )
            .map_err(|e| DriftmailError::Store(format!("List runs: {e}")))?;
        let raws = stmt
            .query_map([], raw_run_from_row)
            .map_err(|e| DriftmailError::Store(format!("List runs: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| DriftmailError::Store(format!("List runs: {e}")))?;
        raws.into_iter().map(RawRun::into_run).collect()
    }

    /// Run counts grouped by state, for the info endpoint.
    pub fn run_counts(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT state, COUNT(*) FROM lifecycle_runs GROUP BY state")
            .map_err(|e| DriftmailError::Store(format!("Run counts: {e}")))?;
        stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| DriftmailError::Store(format!("Run counts: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| DriftmailError::Store(format!("Run counts: {e}")))
    }

    /// Explicitly stop a run. The workflow never takes this transition on
    /// its own.
    pub fn terminate_run(&self, email: &str, now: DateTime<Utc>) -> Result<bool> {
        let changed = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE lifecycle_runs
                 SET state = 'terminated', next_wake = NULL, updated_at = ?1
                 WHERE email = ?2 AND state != 'terminated'",
                params![ts_to_db(now), email],
            )
            .map_err(|e| DriftmailError::Store(format!("Terminate run: {e}")))?;
        Ok(changed > 0)
    }

    // ─── Step checkpoints ─────────────────────────────────────

    /// Record a completed step. First write wins: a replay that somehow
    /// races an earlier recording keeps the original output.
    pub fn record_checkpoint(
        &self,
        run_id: &str,
        step_key: &str,
        output: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT OR IGNORE INTO step_checkpoints
                 (run_id, step_key, output, completed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![run_id, step_key, output, ts_to_db(now)],
            )
            .map_err(|e| DriftmailError::Store(format!("Record checkpoint: {e}")))?;
        Ok(())
    }

    /// Recorded output of a step, if it has completed.
    pub fn checkpoint(&self, run_id: &str, step_key: &str) -> Result<Option<String>> {
        self.conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT output FROM step_checkpoints
                 WHERE run_id = ?1 AND step_key = ?2",
                params![run_id, step_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DriftmailError::Store(format!("Get checkpoint: {e}")))
    }

    /// Number of recorded checkpoints for a run.
    pub fn checkpoint_count(&self, run_id: &str) -> Result<i64> {
        self.conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM step_checkpoints WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .map_err(|e| DriftmailError::Store(format!("Checkpoint count: {e}")))
    }

    // ─── Users (read-only view of the platform datastore) ────

    /// Last-activity timestamp for a user. `None` when no record exists or
    /// the record carries no activity date.
    pub fn user_last_activity(&self, email: &str) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<Option<String>> = self
            .conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT last_activity_date FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DriftmailError::Store(format!("User lookup: {e}")))?;
        match raw.flatten() {
            Some(s) => Ok(Some(ts_from_db(&s)?)),
            None => Ok(None),
        }
    }

    /// Upsert a user row. The live platform writes this table on every
    /// interaction; here it backs local setups and tests.
    pub fn upsert_user(
        &self,
        email: &str,
        full_name: &str,
        last_activity: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT OR REPLACE INTO users (email, full_name, last_activity_date)
                 VALUES (?1, ?2, ?3)",
                params![email, full_name, last_activity.map(ts_to_db)],
            )
            .map_err(|e| DriftmailError::Store(format!("Upsert user: {e}")))?;
        Ok(())
    }
}

/// Row image before timestamp parsing.
struct RawRun {
    id: String,
    email: String,
    full_name: String,
    state: String,
    iteration: u32,
    next_wake: Option<String>,
    attempts: u32,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

fn raw_run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRun> {
    Ok(RawRun {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        state: row.get(3)?,
        iteration: row.get(4)?,
        next_wake: row.get(5)?,
        attempts: row.get(6)?,
        last_error: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl RawRun {
    fn into_run(self) -> Result<LifecycleRun> {
        Ok(LifecycleRun {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            state: RunState::from_db_str(&self.state),
            iteration: self.iteration,
            next_wake: self.next_wake.as_deref().map(ts_from_db).transpose()?,
            attempts: self.attempts,
            last_error: self.last_error,
            created_at: ts_from_db(&self.created_at)?,
            updated_at: ts_from_db(&self.updated_at)?,
        })
    }
}
