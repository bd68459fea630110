//! SQLite store
//!
//! Implements `SessionStore` on a single SQLite connection. Breaks and
//! completed-task snapshots live in JSON columns; timestamps are stored as
//! milliseconds since the epoch.

use crate::store::{Result, SessionStore, StoreError};
use crate::{Location, NewSession, Session, SessionKind, Task, UserProfile};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use tracing::info;

const PROFILE_KEY: &str = "user";

pub struct SqliteStore {
    conn: Connection,
}

struct SessionRow {
    id: i64,
    start_ms: i64,
    end_ms: i64,
    duration: i64,
    kind: String,
    notes: String,
    lat: Option<f64>,
    lon: Option<f64>,
    breaks: String,
    completed_tasks: String,
    session_score: i64,
}

const SESSION_COLUMNS: &str = "id, start_time, end_time, duration, kind, notes, lat, lon, breaks, completed_tasks, session_score";

fn read_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        start_ms: row.get(1)?,
        end_ms: row.get(2)?,
        duration: row.get(3)?,
        kind: row.get(4)?,
        notes: row.get(5)?,
        lat: row.get(6)?,
        lon: row.get(7)?,
        breaks: row.get(8)?,
        completed_tasks: row.get(9)?,
        session_score: row.get(10)?,
    })
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {} out of range", ms)))
}

fn hydrate(row: SessionRow) -> Result<Session> {
    let location = match (row.lat, row.lon) {
        (Some(lat), Some(lon)) => Some(Location { lat, lon }),
        _ => None,
    };
    Ok(Session {
        id: Some(row.id),
        start_time: millis_to_utc(row.start_ms)?,
        end_time: millis_to_utc(row.end_ms)?,
        duration: row.duration,
        // Anything unrecognized is a legacy untagged record
        kind: SessionKind::from_str(&row.kind).unwrap_or_default(),
        notes: row.notes,
        location,
        breaks: serde_json::from_str(&row.breaks)?,
        completed_tasks: serde_json::from_str(&row.completed_tasks)?,
        session_score: row.session_score,
    })
}

impl SqliteStore {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open the default database
    pub fn open_default() -> Result<Self> {
        Self::open(crate::db_path())
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Tracked sessions (live, manual, imported, or synthetic)
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                duration INTEGER NOT NULL DEFAULT 0,
                kind TEXT NOT NULL DEFAULT 'productivity',
                notes TEXT NOT NULL DEFAULT '',
                lat REAL,
                lon REAL,
                breaks TEXT NOT NULL DEFAULT '[]',
                completed_tasks TEXT NOT NULL DEFAULT '[]',
                session_score INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_end_time ON sessions(end_time);

            -- Reusable task definitions
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0
            );

            -- Single-row user profile, stored as JSON
            CREATE TABLE IF NOT EXISTS profile (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        // Run migrations
        self.migrate_v1_import_keys()?;

        Ok(())
    }

    /// Migrate to deduplicated external imports (v1)
    fn migrate_v1_import_keys(&self) -> Result<()> {
        if !self.column_exists("sessions", "import_key")? {
            info!("Running migration: import keys v1");

            self.conn
                .execute("ALTER TABLE sessions ADD COLUMN import_key TEXT", [])?;
        }
        self.conn.execute_batch(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_import_key ON sessions(import_key)",
        )?;

        Ok(())
    }

    /// Check if a column exists in a table
    fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", table))?;
        let rows = stmt.query_map([], |row| {
            let col_name: String = row.get(1)?;
            Ok(col_name)
        })?;

        for row in rows {
            if row? == column {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn insert_session_tx(conn: &Connection, new: &NewSession, import_key: Option<&str>) -> Result<i64> {
        conn.execute(
            r#"
            INSERT INTO sessions (start_time, end_time, duration, kind, notes, lat, lon, breaks, completed_tasks, session_score, import_key)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                new.start_time.timestamp_millis(),
                new.end_time.timestamp_millis(),
                new.duration,
                new.kind.as_str(),
                new.notes,
                new.location.map(|l| l.lat),
                new.location.map(|l| l.lon),
                serde_json::to_string(&new.breaks)?,
                serde_json::to_string(&new.completed_tasks)?,
                new.session_score,
                import_key,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn session_from_new(new: &NewSession, id: i64) -> Session {
        Session {
            id: Some(id),
            start_time: new.start_time,
            end_time: new.end_time,
            duration: new.duration,
            kind: new.kind,
            notes: new.notes.clone(),
            location: new.location,
            breaks: new.breaks.clone(),
            completed_tasks: new.completed_tasks.clone(),
            session_score: new.session_score,
        }
    }
}

impl SessionStore for SqliteStore {
    fn create_session(&self, new: &NewSession) -> Result<Session> {
        let id = Self::insert_session_tx(&self.conn, new, None)?;
        Ok(Self::session_from_new(new, id))
    }

    fn create_sessions(&self, batch: &[NewSession]) -> Result<Vec<Session>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut created = Vec::with_capacity(batch.len());
        for new in batch {
            let id = Self::insert_session_tx(&tx, new, None)?;
            created.push(Self::session_from_new(new, id));
        }
        tx.commit()?;
        Ok(created)
    }

    fn get_session(&self, id: i64) -> Result<Option<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM sessions WHERE id = ?1",
            SESSION_COLUMNS
        ))?;

        let result = stmt.query_row(params![id], read_session_row);
        match result {
            Ok(row) => Ok(Some(hydrate(row)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM sessions ORDER BY end_time DESC, id DESC",
            SESSION_COLUMNS
        ))?;

        let rows = stmt.query_map([], read_session_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(hydrate(row?)?);
        }
        Ok(sessions)
    }

    fn update_session(&self, session: &Session) -> Result<()> {
        let id = session.id.ok_or(StoreError::NotFound)?;

        let changed = self.conn.execute(
            r#"
            UPDATE sessions SET
                start_time = ?2,
                end_time = ?3,
                duration = ?4,
                kind = ?5,
                notes = ?6,
                lat = ?7,
                lon = ?8,
                breaks = ?9,
                completed_tasks = ?10,
                session_score = ?11
            WHERE id = ?1
            "#,
            params![
                id,
                session.start_time.timestamp_millis(),
                session.end_time.timestamp_millis(),
                session.duration,
                session.kind.as_str(),
                session.notes,
                session.location.map(|l| l.lat),
                session.location.map(|l| l.lon),
                serde_json::to_string(&session.breaks)?,
                serde_json::to_string(&session.completed_tasks)?,
                session.session_score,
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn delete_session(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn delete_sessions(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        // One statement, so the batch is atomic
        let vars = vec!["?"; ids.len()].join(",");
        let sql = format!("DELETE FROM sessions WHERE id IN ({})", vars);
        let changed = self.conn.execute(&sql, params_from_iter(ids.iter()))?;
        Ok(changed)
    }

    fn upsert_imported(&self, import_key: &str, new: &NewSession) -> Result<Session> {
        self.conn.execute(
            r#"
            INSERT INTO sessions (start_time, end_time, duration, kind, notes, lat, lon, breaks, completed_tasks, session_score, import_key)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(import_key) DO UPDATE SET
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                duration = excluded.duration,
                kind = excluded.kind,
                notes = excluded.notes,
                lat = excluded.lat,
                lon = excluded.lon,
                breaks = excluded.breaks,
                completed_tasks = excluded.completed_tasks,
                session_score = excluded.session_score
            "#,
            params![
                new.start_time.timestamp_millis(),
                new.end_time.timestamp_millis(),
                new.duration,
                new.kind.as_str(),
                new.notes,
                new.location.map(|l| l.lat),
                new.location.map(|l| l.lon),
                serde_json::to_string(&new.breaks)?,
                serde_json::to_string(&new.completed_tasks)?,
                new.session_score,
                import_key,
            ],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT id FROM sessions WHERE import_key = ?1",
            params![import_key],
            |row| row.get(0),
        )?;
        Ok(Self::session_from_new(new, id))
    }

    fn create_task(&self, task: &Task) -> Result<Task> {
        self.conn.execute(
            "INSERT INTO tasks (name, score) VALUES (?1, ?2)",
            params![task.name, task.score],
        )?;
        Ok(Task {
            id: Some(self.conn.last_insert_rowid()),
            name: task.name.clone(),
            score: task.score,
        })
    }

    fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, score FROM tasks ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Task {
                id: Some(row.get(0)?),
                name: row.get(1)?,
                score: row.get(2)?,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    fn update_task(&self, task: &Task) -> Result<()> {
        let id = task.id.ok_or(StoreError::NotFound)?;
        let changed = self.conn.execute(
            "UPDATE tasks SET name = ?2, score = ?3 WHERE id = ?1",
            params![id, task.name, task.score],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn delete_task(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn load_profile(&self) -> Result<UserProfile> {
        let result = self.conn.query_row(
            "SELECT value FROM profile WHERE key = ?1",
            params![PROFILE_KEY],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(UserProfile::default()),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        profile.validate()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO profile (key, value) VALUES (?1, ?2)",
            params![PROFILE_KEY, serde_json::to_string(profile)?],
        )?;
        Ok(())
    }
}
