//! Session timer
//!
//! `FocusTimer` is the pure state machine: Idle -> Running -> Paused ->
//! Running -> ... -> Idle, accumulating break intervals while paused. Worked
//! time is always wall time minus total break time; the start anchor never
//! shifts on resume. `TimerService` is the async shell that owns the machine,
//! drives a 1-second display tick, and resolves pending sessions against the
//! store.

use crate::store::{SessionHub, SessionStore, StoreError};
use crate::{BreakInterval, Location, NewSession, Session, SessionKind, TaskSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    #[default]
    Idle,
    Running,
    Paused,
}

/// A stopped-but-unconfirmed session. Becomes a persisted record once the
/// user supplies notes/tasks/location, or vanishes on discard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingSession {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: i64,
    pub breaks: Vec<BreakInterval>,
    pub kind: SessionKind,
}

impl PendingSession {
    pub fn into_new_session(
        self,
        notes: String,
        completed_tasks: Vec<TaskSnapshot>,
        location: Option<Location>,
    ) -> NewSession {
        let session_score = NewSession::score_of(&completed_tasks);
        NewSession {
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.duration,
            kind: self.kind,
            notes,
            location,
            breaks: self.breaks,
            completed_tasks,
            session_score,
        }
    }
}

/// Pure timer state machine. All transitions take `now` explicitly so the
/// accounting is exact and testable without a clock.
#[derive(Debug, Clone, Default)]
pub struct FocusTimer {
    phase: TimerPhase,
    kind: SessionKind,
    started_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    breaks: Vec<BreakInterval>,
}

impl FocusTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn breaks(&self) -> &[BreakInterval] {
        &self.breaks
    }

    fn break_total(&self) -> chrono::Duration {
        self.breaks
            .iter()
            .fold(chrono::Duration::zero(), |acc, b| {
                acc + (b.end_time - b.start_time)
            })
    }

    /// Start a fresh session, or resume from a pause. Resuming closes the
    /// open break and keeps the original kind and start anchor; calling this
    /// while already running is an idempotent no-op.
    pub fn start(&mut self, kind: SessionKind, now: DateTime<Utc>) {
        match self.phase {
            TimerPhase::Idle => {
                self.kind = kind;
                self.started_at = Some(now);
                self.paused_at = None;
                self.breaks.clear();
                self.phase = TimerPhase::Running;
            }
            TimerPhase::Running => {}
            TimerPhase::Paused => {
                if let Some(paused_at) = self.paused_at.take() {
                    self.breaks.push(BreakInterval {
                        start_time: paused_at,
                        end_time: now,
                    });
                }
                self.phase = TimerPhase::Running;
            }
        }
    }

    /// Freeze the clock. Only meaningful while running.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.phase == TimerPhase::Running {
            self.paused_at = Some(now);
            self.phase = TimerPhase::Paused;
        }
    }

    /// Worked seconds so far: wall time minus completed breaks. While paused
    /// the value stays frozen at the instant the pause began.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let anchor = match self.started_at {
            Some(started_at) => started_at,
            None => return 0,
        };
        let reference = match self.phase {
            TimerPhase::Idle => return 0,
            TimerPhase::Running => now,
            TimerPhase::Paused => self.paused_at.unwrap_or(now),
        };
        ((reference - anchor) - self.break_total()).num_seconds().max(0)
    }

    /// Finish the session. A stop while paused closes the open break first
    /// so it is never lost. Under one second of worked time, the attempt is
    /// dropped as a mis-tap and no pending session is produced.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<PendingSession> {
        if self.phase == TimerPhase::Idle {
            return None;
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.breaks.push(BreakInterval {
                start_time: paused_at,
                end_time: now,
            });
        }

        let started_at = match self.started_at.take() {
            Some(s) => s,
            None => {
                self.reset();
                return None;
            }
        };
        let duration = ((now - started_at) - self.break_total()).num_seconds();
        let breaks = std::mem::take(&mut self.breaks);
        let kind = self.kind;
        self.reset();

        if duration < 1 {
            debug!("discarding a sub-second session attempt");
            return None;
        }

        Some(PendingSession {
            start_time: started_at,
            end_time: now,
            duration,
            breaks,
            kind,
        })
    }

    fn reset(&mut self) {
        self.phase = TimerPhase::Idle;
        self.started_at = None;
        self.paused_at = None;
        self.breaks.clear();
    }
}

/// What the display layer needs each tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub kind: SessionKind,
    pub elapsed_secs: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub has_pending: bool,
}

impl TimerSnapshot {
    fn idle() -> Self {
        Self {
            phase: TimerPhase::Idle,
            kind: SessionKind::Productivity,
            elapsed_secs: 0,
            started_at: None,
            has_pending: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum TimerError {
    #[error("no pending session to confirm")]
    NoPending,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Async shell around `FocusTimer`: owns the display ticker and turns
/// confirmed pending sessions into store records through the hub.
pub struct TimerService<S: SessionStore> {
    timer: Arc<Mutex<FocusTimer>>,
    pending: Arc<Mutex<Option<PendingSession>>>,
    hub: Arc<Mutex<SessionHub<S>>>,
    ticker: StdMutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
    display_tx: Arc<watch::Sender<TimerSnapshot>>,
}

impl<S: SessionStore> TimerService<S> {
    pub fn new(hub: Arc<Mutex<SessionHub<S>>>) -> Self {
        let (display_tx, _) = watch::channel(TimerSnapshot::idle());
        Self {
            timer: Arc::new(Mutex::new(FocusTimer::new())),
            pending: Arc::new(Mutex::new(None)),
            hub,
            ticker: StdMutex::new(None),
            tick_interval: Duration::from_secs(1),
            display_tx: Arc::new(display_tx),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Feed of display refreshes: one update per state change plus one per
    /// tick while running
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.display_tx.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        let (phase, kind, elapsed_secs, started_at) = {
            let timer = self.timer.lock().await;
            let now = Utc::now();
            (
                timer.phase(),
                timer.kind(),
                timer.elapsed_seconds(now),
                timer.started_at(),
            )
        };
        let has_pending = self.pending.lock().await.is_some();
        TimerSnapshot {
            phase,
            kind,
            elapsed_secs,
            started_at,
            has_pending,
        }
    }

    pub async fn pending(&self) -> Option<PendingSession> {
        self.pending.lock().await.clone()
    }

    pub async fn start(&self, kind: SessionKind) -> TimerSnapshot {
        if self.pending.lock().await.is_some() {
            warn!("starting a new timer while a pending session awaits confirmation");
        }
        {
            let mut timer = self.timer.lock().await;
            timer.start(kind, Utc::now());
        }
        self.spawn_ticker();
        self.publish().await
    }

    pub async fn pause(&self) -> TimerSnapshot {
        {
            let mut timer = self.timer.lock().await;
            timer.pause(Utc::now());
        }
        self.cancel_ticker();
        self.publish().await
    }

    /// Stop the timer. Any produced pending session is held until it is
    /// confirmed or discarded; stopping again before then replaces it.
    pub async fn stop(&self) -> Option<PendingSession> {
        let finished = {
            let mut timer = self.timer.lock().await;
            timer.stop(Utc::now())
        };
        self.cancel_ticker();
        if let Some(pending) = finished.clone() {
            let mut slot = self.pending.lock().await;
            if slot.replace(pending).is_some() {
                warn!("replacing a pending session that was never resolved");
            }
        }
        self.publish().await;
        finished
    }

    /// Persist the pending session with the user's annotations. The session
    /// score is recomputed from the supplied task snapshots.
    pub async fn confirm(
        &self,
        notes: String,
        completed_tasks: Vec<TaskSnapshot>,
        location: Option<Location>,
    ) -> Result<Session, TimerError> {
        let pending = self
            .pending
            .lock()
            .await
            .take()
            .ok_or(TimerError::NoPending)?;
        let new = pending.into_new_session(notes, completed_tasks, location);
        let session = self.hub.lock().await.create_session(&new)?;
        self.publish().await;
        Ok(session)
    }

    /// Drop the pending session without a trace. Returns whether one existed.
    pub async fn discard(&self) -> bool {
        let dropped = self.pending.lock().await.take().is_some();
        if dropped {
            self.publish().await;
        }
        dropped
    }

    /// Cancel the display ticker. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.cancel_ticker();
    }

    async fn publish(&self) -> TimerSnapshot {
        let snapshot = self.snapshot().await;
        self.display_tx.send_replace(snapshot);
        snapshot
    }

    fn spawn_ticker(&self) {
        let mut slot = self.ticker.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }

        let timer = self.timer.clone();
        let pending = self.pending.clone();
        let display_tx = self.display_tx.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            loop {
                interval.tick().await;

                let state = {
                    let timer = timer.lock().await;
                    if timer.phase() != TimerPhase::Running {
                        break;
                    }
                    let now = Utc::now();
                    (
                        timer.phase(),
                        timer.kind(),
                        timer.elapsed_seconds(now),
                        timer.started_at(),
                    )
                };
                let has_pending = pending.lock().await.is_some();
                display_tx.send_replace(TimerSnapshot {
                    phase: state.0,
                    kind: state.1,
                    elapsed_secs: state.2,
                    started_at: state.3,
                    has_pending,
                });
            }
        });

        *slot = Some(handle);
    }

    fn cancel_ticker(&self) {
        let mut slot = self.ticker.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl<S: SessionStore> Drop for TimerService<S> {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        t0() + ChronoDuration::seconds(seconds)
    }

    #[test]
    fn test_break_subtraction_across_pauses() {
        let mut timer = FocusTimer::new();
        timer.start(SessionKind::Productivity, at(0));
        timer.pause(at(10));
        timer.start(SessionKind::Productivity, at(15));
        timer.pause(at(40));
        timer.start(SessionKind::Productivity, at(42));
        let pending = timer.stop(at(60)).expect("session produced");

        assert_eq!(pending.breaks.len(), 2);
        assert_eq!(pending.breaks[0].seconds(), 5);
        assert_eq!(pending.breaks[1].seconds(), 2);
        // 60 elapsed minus 7 seconds of breaks
        assert_eq!(pending.duration, 53);
        assert_eq!(pending.start_time, at(0));
        assert_eq!(pending.end_time, at(60));
        assert_eq!(timer.phase(), TimerPhase::Idle);
    }

    #[test]
    fn test_stop_while_paused_keeps_final_break() {
        let mut timer = FocusTimer::new();
        timer.start(SessionKind::Productivity, at(0));
        timer.pause(at(25));
        let pending = timer.stop(at(30)).expect("session produced");

        assert_eq!(pending.breaks.len(), 1);
        assert_eq!(pending.breaks[0].start_time, at(25));
        assert_eq!(pending.breaks[0].end_time, at(30));
        assert_eq!(pending.duration, 25);
    }

    #[test]
    fn test_subsecond_stop_discarded() {
        let mut timer = FocusTimer::new();
        timer.start(SessionKind::Productivity, at(0));
        let pending = timer.stop(t0() + ChronoDuration::milliseconds(700));
        assert!(pending.is_none());
        assert_eq!(timer.phase(), TimerPhase::Idle);

        // Exactly one worked second is kept
        timer.start(SessionKind::Productivity, at(0));
        let pending = timer.stop(at(1)).expect("one second is enough");
        assert_eq!(pending.duration, 1);
    }

    #[test]
    fn test_start_is_idempotent_while_running() {
        let mut timer = FocusTimer::new();
        timer.start(SessionKind::Productivity, at(0));
        timer.start(SessionKind::Play, at(30));

        assert_eq!(timer.started_at(), Some(at(0)));
        assert_eq!(timer.kind(), SessionKind::Productivity);
        assert!(timer.breaks().is_empty());
    }

    #[test]
    fn test_pause_freezes_elapsed() {
        let mut timer = FocusTimer::new();
        timer.start(SessionKind::Productivity, at(0));
        assert_eq!(timer.elapsed_seconds(at(20)), 20);

        timer.pause(at(20));
        assert_eq!(timer.elapsed_seconds(at(25)), 20);
        assert_eq!(timer.elapsed_seconds(at(90)), 20);

        timer.start(SessionKind::Productivity, at(30));
        assert_eq!(timer.elapsed_seconds(at(35)), 25);
    }

    #[test]
    fn test_pause_only_valid_while_running() {
        let mut timer = FocusTimer::new();
        timer.pause(at(5));
        assert_eq!(timer.phase(), TimerPhase::Idle);

        timer.start(SessionKind::Play, at(10));
        timer.pause(at(20));
        timer.pause(at(25));
        let pending = timer.stop(at(30)).expect("session produced");
        // The second pause was ignored; one break from 20 to 30
        assert_eq!(pending.breaks.len(), 1);
        assert_eq!(pending.duration, 10);
    }

    #[test]
    fn test_stop_from_idle_produces_nothing() {
        let mut timer = FocusTimer::new();
        assert!(timer.stop(at(10)).is_none());
    }

    #[test]
    fn test_new_cycle_clears_old_breaks() {
        let mut timer = FocusTimer::new();
        timer.start(SessionKind::Productivity, at(0));
        timer.pause(at(5));
        timer.start(SessionKind::Productivity, at(10));
        timer.stop(at(20)).expect("session produced");

        timer.start(SessionKind::Play, at(100));
        let pending = timer.stop(at(130)).expect("session produced");
        assert!(pending.breaks.is_empty());
        assert_eq!(pending.kind, SessionKind::Play);
        assert_eq!(pending.duration, 30);
    }

    #[test]
    fn test_pending_confirmation_computes_score() {
        let pending = PendingSession {
            start_time: at(0),
            end_time: at(600),
            duration: 600,
            breaks: Vec::new(),
            kind: SessionKind::Productivity,
        };
        let tasks = vec![
            TaskSnapshot {
                id: Some(1),
                name: "review".into(),
                score: 2,
            },
            TaskSnapshot {
                id: Some(2),
                name: "ship".into(),
                score: 3,
            },
        ];
        let new = pending.into_new_session("good block".into(), tasks, None);
        assert_eq!(new.session_score, 5);
        assert_eq!(new.notes, "good block");
        assert_eq!(new.duration, 600);
    }

    fn test_hub() -> Arc<Mutex<SessionHub<SqliteStore>>> {
        let store = SqliteStore::open(":memory:").unwrap();
        Arc::new(Mutex::new(SessionHub::new(store).unwrap()))
    }

    #[tokio::test]
    async fn test_service_confirm_persists() {
        let hub = test_hub();
        let service = TimerService::new(hub.clone());

        service.start(SessionKind::Productivity).await;
        tokio::time::sleep(Duration::from_millis(1200)).await;
        let pending = service.stop().await.expect("pending session");
        assert!(pending.duration >= 1);
        assert!(service.snapshot().await.has_pending);

        let tasks = vec![TaskSnapshot {
            id: None,
            name: "write".into(),
            score: 4,
        }];
        let session = service
            .confirm("focused".into(), tasks, None)
            .await
            .expect("persisted");
        assert_eq!(session.session_score, 4);

        let stored = hub.lock().await.sessions();
        assert_eq!(stored.len(), 1);
        assert!(!service.snapshot().await.has_pending);
    }

    #[tokio::test]
    async fn test_service_discard_leaves_store_empty() {
        let hub = test_hub();
        let service = TimerService::new(hub.clone());

        service.start(SessionKind::Play).await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        service.stop().await.expect("pending session");

        assert!(service.discard().await);
        assert!(matches!(
            service.confirm(String::new(), Vec::new(), None).await,
            Err(TimerError::NoPending)
        ));
        assert!(hub.lock().await.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_ticker_lifecycle() {
        let hub = test_hub();
        let service = TimerService::new(hub).with_tick_interval(Duration::from_millis(20));
        let mut rx = service.subscribe();

        service.start(SessionKind::Productivity).await;
        assert!(service.ticker.lock().unwrap().is_some());
        tokio::time::timeout(Duration::from_millis(500), rx.changed())
            .await
            .expect("display update arrives")
            .unwrap();

        service.pause().await;
        assert!(service.ticker.lock().unwrap().is_none());
        assert_eq!(service.snapshot().await.phase, TimerPhase::Paused);

        service.start(SessionKind::Productivity).await;
        assert!(service.ticker.lock().unwrap().is_some());

        service.stop().await;
        assert!(service.ticker.lock().unwrap().is_none());
        assert_eq!(service.snapshot().await.phase, TimerPhase::Idle);

        service.shutdown();
    }
}
