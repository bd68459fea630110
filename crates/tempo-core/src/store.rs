//! Session store abstraction
//!
//! Persistence sits behind the `SessionStore` trait so the aggregation and
//! timer layers never see SQLite directly. `SessionHub` wraps a store with a
//! watch channel carrying the latest full session snapshot; consumers
//! re-aggregate whenever it changes instead of tracking deltas.

use crate::{NewSession, ProfileError, Session, Task, UserProfile};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("record not found")]
    NotFound,
    #[error("invalid profile: {0}")]
    InvalidProfile(#[from] ProfileError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistent collection of sessions, tasks, and the user profile.
/// Batch operations are atomic: either every row lands or none do.
pub trait SessionStore {
    fn create_session(&self, new: &NewSession) -> Result<Session>;
    /// All-or-nothing bulk insert, used by CSV import
    fn create_sessions(&self, batch: &[NewSession]) -> Result<Vec<Session>>;
    fn get_session(&self, id: i64) -> Result<Option<Session>>;
    /// Most recently ended first
    fn list_sessions(&self) -> Result<Vec<Session>>;
    fn update_session(&self, session: &Session) -> Result<()>;
    fn delete_session(&self, id: i64) -> Result<()>;
    /// Atomic batch delete; returns how many rows went away
    fn delete_sessions(&self, ids: &[i64]) -> Result<usize>;
    /// Insert or replace a synthetic session identified by an external key,
    /// keeping repeat imports idempotent
    fn upsert_imported(&self, import_key: &str, new: &NewSession) -> Result<Session>;

    fn create_task(&self, task: &Task) -> Result<Task>;
    fn list_tasks(&self) -> Result<Vec<Task>>;
    fn update_task(&self, task: &Task) -> Result<()>;
    fn delete_task(&self, id: i64) -> Result<()>;

    /// Missing profile reads as defaults; it is materialized on first save
    fn load_profile(&self) -> Result<UserProfile>;
    fn save_profile(&self, profile: &UserProfile) -> Result<()>;
}

/// A store plus a broadcast of its current session list. Every mutation that
/// goes through the hub refreshes the snapshot, so subscribers always
/// re-aggregate from the full list.
pub struct SessionHub<S: SessionStore> {
    store: S,
    sessions_tx: watch::Sender<Arc<Vec<Session>>>,
}

impl<S: SessionStore> SessionHub<S> {
    pub fn new(store: S) -> Result<Self> {
        let snapshot = Arc::new(store.list_sessions()?);
        let (sessions_tx, _) = watch::channel(snapshot);
        Ok(Self { store, sessions_tx })
    }

    /// Direct access for reads that don't mutate sessions (tasks, profile)
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Session>>> {
        self.sessions_tx.subscribe()
    }

    /// The latest published session list
    pub fn sessions(&self) -> Arc<Vec<Session>> {
        self.sessions_tx.borrow().clone()
    }

    pub fn create_session(&self, new: &NewSession) -> Result<Session> {
        let session = self.store.create_session(new)?;
        self.refresh()?;
        Ok(session)
    }

    pub fn create_sessions(&self, batch: &[NewSession]) -> Result<Vec<Session>> {
        let sessions = self.store.create_sessions(batch)?;
        self.refresh()?;
        Ok(sessions)
    }

    pub fn update_session(&self, session: &Session) -> Result<()> {
        self.store.update_session(session)?;
        self.refresh()
    }

    pub fn delete_session(&self, id: i64) -> Result<()> {
        self.store.delete_session(id)?;
        self.refresh()
    }

    pub fn delete_sessions(&self, ids: &[i64]) -> Result<usize> {
        let removed = self.store.delete_sessions(ids)?;
        self.refresh()?;
        Ok(removed)
    }

    pub fn upsert_imported(&self, import_key: &str, new: &NewSession) -> Result<Session> {
        let session = self.store.upsert_imported(import_key, new)?;
        self.refresh()?;
        Ok(session)
    }

    fn refresh(&self) -> Result<()> {
        let snapshot = Arc::new(self.store.list_sessions()?);
        self.sessions_tx.send_replace(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::SessionKind;
    use chrono::{Duration, TimeZone, Utc};

    fn new_session(minutes_ago: i64, duration: i64) -> NewSession {
        let end = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
            - Duration::minutes(minutes_ago);
        NewSession {
            start_time: end - Duration::seconds(duration),
            end_time: end,
            duration,
            kind: SessionKind::Productivity,
            notes: String::new(),
            location: None,
            breaks: Vec::new(),
            completed_tasks: Vec::new(),
            session_score: 0,
        }
    }

    #[test]
    fn test_hub_publishes_after_mutation() {
        let hub = SessionHub::new(SqliteStore::open(":memory:").unwrap()).unwrap();
        let mut rx = hub.subscribe();
        assert!(hub.sessions().is_empty());

        hub.create_session(&new_session(10, 600)).unwrap();
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.len(), 1);

        let id = snapshot[0].id.unwrap();
        hub.delete_session(id).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(hub.sessions().is_empty());
    }

    #[test]
    fn test_hub_batch_refreshes_once() {
        let hub = SessionHub::new(SqliteStore::open(":memory:").unwrap()).unwrap();
        let mut rx = hub.subscribe();

        let batch = vec![new_session(30, 300), new_session(20, 300), new_session(10, 300)];
        let created = hub.create_sessions(&batch).unwrap();
        assert_eq!(created.len(), 3);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 3);

        let ids: Vec<i64> = created.iter().filter_map(|s| s.id).take(2).collect();
        assert_eq!(hub.delete_sessions(&ids).unwrap(), 2);
        assert_eq!(hub.sessions().len(), 1);
    }
}
