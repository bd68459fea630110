//! Tempo Core Library
//!
//! Provides session storage, daily aggregation and scoring, goal progress,
//! heatmap bucketing, and CSV import/export for the Tempo productivity tracker.

pub mod aggregate;
pub mod db;
pub mod export;
pub mod format;
pub mod goals;
pub mod heatmap;
pub mod score;
pub mod store;
pub mod timer;

pub use aggregate::aggregate_daily;
pub use db::SqliteStore;
pub use export::{Exporter, Importer};
pub use store::{SessionHub, SessionStore};
pub use timer::{FocusTimer, TimerService};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session category. Untagged legacy records normalize to `Productivity`
/// when they cross any ingestion boundary (store, CSV, scout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    #[default]
    Productivity,
    Play,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Productivity => "productivity",
            SessionKind::Play => "play",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "productivity" => Some(SessionKind::Productivity),
            "play" => Some(SessionKind::Play),
            _ => None,
        }
    }
}

/// A paused sub-interval within a session, excluded from worked duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakInterval {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BreakInterval {
    pub fn seconds(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }

    /// Intersection with the given window, or `None` when the break lies
    /// entirely outside it.
    pub fn clamped(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        let clipped = BreakInterval {
            start_time: self.start_time.max(start),
            end_time: self.end_time.min(end),
        };
        (clipped.start_time < clipped.end_time).then_some(clipped)
    }
}

/// Task definition copied into a session at completion time. Later edits to
/// the task list never rewrite these snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: Option<i64>,
    pub name: String,
    pub score: i64,
}

/// Optional geographic tag on a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// One logged block of tracked time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Worked seconds: wall time minus breaks. Zero means the session was
    /// logged without clock times ("untimed") and display layers must not
    /// assume the timestamps are meaningful beyond the calendar day.
    pub duration: i64,
    #[serde(default)]
    pub kind: SessionKind,
    #[serde(default)]
    pub notes: String,
    pub location: Option<Location>,
    #[serde(default)]
    pub breaks: Vec<BreakInterval>,
    #[serde(default)]
    pub completed_tasks: Vec<TaskSnapshot>,
    #[serde(default)]
    pub session_score: i64,
}

impl Session {
    pub fn is_untimed(&self) -> bool {
        self.duration == 0
    }

    /// Re-derive worked duration after the clock bounds change. Every break
    /// must fall within `[start_time, end_time]`, so breaks are clamped to
    /// the new window first (and dropped when disjoint) before being
    /// subtracted from wall time.
    pub fn rebound(&mut self) {
        let (start, end) = (self.start_time, self.end_time);
        self.breaks = self
            .breaks
            .iter()
            .filter_map(|b| b.clamped(start, end))
            .collect();
        let break_secs: i64 = self.breaks.iter().map(|b| b.seconds()).sum();
        self.duration = ((end - start).num_seconds() - break_secs).max(0);
    }
}

/// A session not yet assigned an id by the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: i64,
    #[serde(default)]
    pub kind: SessionKind,
    #[serde(default)]
    pub notes: String,
    pub location: Option<Location>,
    #[serde(default)]
    pub breaks: Vec<BreakInterval>,
    #[serde(default)]
    pub completed_tasks: Vec<TaskSnapshot>,
    #[serde(default)]
    pub session_score: i64,
}

impl NewSession {
    /// Sum of snapshot scores — the value `session_score` must carry at save
    /// time for a task-annotated session.
    pub fn score_of(tasks: &[TaskSnapshot]) -> i64 {
        tasks.iter().map(|t| t.score).sum()
    }
}

/// A reusable unit of work with a fixed point value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<i64>,
    pub name: String,
    pub score: i64,
}

/// Per-day rollup, derived from sessions and never persisted.
/// `daily_harmony_score == total_productivity_points - total_play_points`
/// holds after every fold step, not just at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Local calendar day of the sessions' end times
    pub day: NaiveDate,
    /// Representative timestamp: end time of the first session folded in
    pub date: DateTime<Utc>,
    /// Worked seconds across productivity sessions
    pub total_duration: i64,
    /// Worked seconds across play sessions
    pub total_play_duration: i64,
    /// Productivity sessions only
    pub session_count: u32,
    pub total_score: i64,
    pub total_productivity_points: f64,
    pub total_play_points: f64,
    pub daily_harmony_score: f64,
}

/// Scoring configuration: worked minutes are divided by the matching divisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    pub time_divisor: i64,
    pub play_time_divisor: i64,
}

impl Default for Formula {
    fn default() -> Self {
        Self {
            time_divisor: 20,
            play_time_divisor: 30,
        }
    }
}

/// Metric a goal can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalMetric {
    TaskScore,
    TimeWorked,
    ProductivityPoints,
}

impl GoalMetric {
    pub const ALL: [GoalMetric; 3] = [
        GoalMetric::TaskScore,
        GoalMetric::TimeWorked,
        GoalMetric::ProductivityPoints,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalMetric::TaskScore => "task_score",
            GoalMetric::TimeWorked => "time_worked",
            GoalMetric::ProductivityPoints => "productivity_points",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "task_score" => Some(GoalMetric::TaskScore),
            "time_worked" => Some(GoalMetric::TimeWorked),
            "productivity_points" => Some(GoalMetric::ProductivityPoints),
            _ => None,
        }
    }
}

/// A per-metric average-daily target. Active only when both fields are set
/// and the end date has not passed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Goal {
    pub target: Option<f64>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Goals {
    pub task_score: Goal,
    pub time_worked: Goal,
    pub productivity_points: Goal,
}

impl Goals {
    pub fn get(&self, metric: GoalMetric) -> Goal {
        match metric {
            GoalMetric::TaskScore => self.task_score,
            GoalMetric::TimeWorked => self.time_worked,
            GoalMetric::ProductivityPoints => self.productivity_points,
        }
    }

    pub fn get_mut(&mut self, metric: GoalMetric) -> &mut Goal {
        match metric {
            GoalMetric::TaskScore => &mut self.task_score,
            GoalMetric::TimeWorked => &mut self.time_worked,
            GoalMetric::ProductivityPoints => &mut self.productivity_points,
        }
    }
}

/// Date/time rendering preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub date_format: format::DateFormat,
    pub time_format: format::TimeFormat,
}

fn default_score_per_line() -> f64 {
    0.1
}

/// Settings for the GitHub activity scout. The API token is intentionally
/// not stored here; the scout reads it from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubSettings {
    pub username: String,
    #[serde(default = "default_score_per_line")]
    pub score_per_line: f64,
    pub last_scout: Option<DateTime<Utc>>,
}

/// All per-user configuration, persisted as a single profile record.
/// Created on first write with defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub display: DisplaySettings,
    pub formula: Formula,
    pub goals: Goals,
    pub github: Option<GithubSettings>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("formula divisor must be a positive integer, got {0}")]
    NonPositiveDivisor(i64),
    #[error("goal target for {0} must be positive")]
    NonPositiveTarget(&'static str),
}

impl UserProfile {
    /// Reject configurations that would silently zero historical points or
    /// produce meaningless goal progress. Called before every persist.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.formula.time_divisor <= 0 {
            return Err(ProfileError::NonPositiveDivisor(self.formula.time_divisor));
        }
        if self.formula.play_time_divisor <= 0 {
            return Err(ProfileError::NonPositiveDivisor(
                self.formula.play_time_divisor,
            ));
        }
        for metric in GoalMetric::ALL {
            if let Some(target) = self.goals.get(metric).target {
                if target <= 0.0 {
                    return Err(ProfileError::NonPositiveTarget(metric.as_str()));
                }
            }
        }
        Ok(())
    }
}

/// Get the data directory for Tempo
pub fn data_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("com", "tempo", "tempo")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            directories::BaseDirs::new()
                .map(|d| d.home_dir().join(".tempo"))
                .unwrap_or_else(|| std::path::PathBuf::from(".tempo"))
        })
}

/// Get the database file path
pub fn db_path() -> std::path::PathBuf {
    data_dir().join("tempo.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, h, m, 0).unwrap()
    }

    fn timed(start: DateTime<Utc>, end: DateTime<Utc>, breaks: Vec<BreakInterval>) -> Session {
        Session {
            id: Some(1),
            start_time: start,
            end_time: end,
            duration: 0,
            kind: SessionKind::Productivity,
            notes: String::new(),
            location: None,
            breaks,
            completed_tasks: Vec::new(),
            session_score: 0,
        }
    }

    #[test]
    fn rebound_drops_break_outside_new_bounds() {
        let mut session = timed(
            at(9, 0),
            at(10, 0),
            vec![BreakInterval {
                start_time: at(9, 30),
                end_time: at(9, 40),
            }],
        );
        session.end_time = at(9, 20);
        session.rebound();

        // The break no longer overlaps the session, so the full wall time counts
        assert!(session.breaks.is_empty());
        assert_eq!(session.duration, 20 * 60);
    }

    #[test]
    fn rebound_clamps_straddling_break() {
        let mut session = timed(
            at(9, 0),
            at(9, 30),
            vec![BreakInterval {
                start_time: at(9, 20),
                end_time: at(9, 40),
            }],
        );
        session.rebound();

        assert_eq!(
            session.breaks,
            vec![BreakInterval {
                start_time: at(9, 20),
                end_time: at(9, 30),
            }]
        );
        assert_eq!(session.duration, 20 * 60);
    }

    #[test]
    fn rebound_keeps_interior_break() {
        let mut session = timed(
            at(9, 0),
            at(10, 0),
            vec![BreakInterval {
                start_time: at(9, 30),
                end_time: at(9, 40),
            }],
        );
        session.rebound();

        assert_eq!(session.breaks.len(), 1);
        assert_eq!(session.duration, 50 * 60);
    }
}
