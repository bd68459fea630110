//! Daily aggregation
//!
//! Folds a full session list into per-day summaries. A session belongs to the
//! local calendar day its *end* time falls on, so a block that crosses
//! midnight counts toward the day it finished.

use crate::score::{play_points, productivity_points};
use crate::{DailySummary, Formula, Session, SessionKind};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// The calendar day an instant falls on in the viewer's timezone
pub fn local_day<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

impl DailySummary {
    pub fn empty(day: NaiveDate, date: DateTime<Utc>) -> Self {
        Self {
            day,
            date,
            total_duration: 0,
            total_play_duration: 0,
            session_count: 0,
            total_score: 0,
            total_productivity_points: 0.0,
            total_play_points: 0.0,
            daily_harmony_score: 0.0,
        }
    }

    /// Fold one session into this day. The harmony score is refreshed on
    /// every call so the summary is consistent at each intermediate step.
    pub fn absorb(&mut self, session: &Session, formula: &Formula) {
        match session.kind {
            SessionKind::Productivity => {
                self.total_duration += session.duration;
                self.session_count += 1;
                self.total_score += session.session_score;
                self.total_productivity_points += productivity_points(session, formula);
            }
            SessionKind::Play => {
                self.total_play_duration += session.duration;
                self.total_play_points += play_points(session, formula);
            }
        }
        self.daily_harmony_score = self.total_productivity_points - self.total_play_points;
    }
}

/// Group sessions by local day of their end time and fold each group into a
/// summary. Returns the most recent day first.
pub fn aggregate_daily<Tz: TimeZone>(
    sessions: &[Session],
    formula: &Formula,
    tz: &Tz,
) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, DailySummary> = BTreeMap::new();

    for session in sessions {
        let day = local_day(session.end_time, tz);
        days.entry(day)
            .or_insert_with(|| DailySummary::empty(day, session.end_time))
            .absorb(session, formula);
    }

    days.into_values().rev().collect()
}

/// Average tracked seconds per day-with-activity, for the distribution view
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeDistribution {
    pub tracked_days: usize,
    pub avg_work_secs: f64,
    pub avg_play_secs: f64,
}

pub fn time_distribution(summaries: &[DailySummary]) -> TimeDistribution {
    let tracked_days = summaries.len();
    if tracked_days == 0 {
        return TimeDistribution {
            tracked_days: 0,
            avg_work_secs: 0.0,
            avg_play_secs: 0.0,
        };
    }
    let work: i64 = summaries.iter().map(|s| s.total_duration).sum();
    let play: i64 = summaries.iter().map(|s| s.total_play_duration).sum();
    TimeDistribution {
        tracked_days,
        avg_work_secs: work as f64 / tracked_days as f64,
        avg_play_secs: play as f64 / tracked_days as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn session_ending(
        end: DateTime<Utc>,
        duration: i64,
        kind: SessionKind,
        score: i64,
    ) -> Session {
        Session {
            id: None,
            start_time: end - Duration::seconds(duration),
            end_time: end,
            duration,
            kind,
            notes: String::new(),
            location: None,
            breaks: Vec::new(),
            completed_tasks: Vec::new(),
            session_score: score,
        }
    }

    #[test]
    fn test_concrete_mixed_day() {
        let formula = Formula {
            time_divisor: 20,
            play_time_divisor: 30,
        };
        let end = Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap();
        let sessions = vec![
            session_ending(end, 1200, SessionKind::Productivity, 5),
            session_ending(end + Duration::hours(2), 900, SessionKind::Play, 0),
        ];

        let days = aggregate_daily(&sessions, &formula, &Utc);
        assert_eq!(days.len(), 1);
        let day = &days[0];
        assert_eq!(day.total_productivity_points, 6.0);
        assert_eq!(day.total_play_points, 0.5);
        assert_eq!(day.daily_harmony_score, 5.5);
        assert_eq!(day.total_duration, 1200);
        assert_eq!(day.total_play_duration, 900);
        assert_eq!(day.session_count, 1);
        assert_eq!(day.total_score, 5);
    }

    #[test]
    fn test_grouped_by_end_day() {
        let formula = Formula::default();
        // Starts at 23:40, ends 00:20 the next day: belongs to the next day.
        let end = Utc.with_ymd_and_hms(2024, 5, 11, 0, 20, 0).unwrap();
        let sessions = vec![session_ending(end, 2400, SessionKind::Productivity, 0)];

        let days = aggregate_daily(&sessions, &formula, &Utc);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].day, NaiveDate::from_ymd_opt(2024, 5, 11).unwrap());
    }

    #[test]
    fn test_day_key_uses_viewer_timezone() {
        let formula = Formula::default();
        let end = Utc.with_ymd_and_hms(2024, 5, 10, 23, 30, 0).unwrap();
        let sessions = vec![session_ending(end, 600, SessionKind::Productivity, 0)];

        let utc_days = aggregate_daily(&sessions, &formula, &Utc);
        assert_eq!(utc_days[0].day, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());

        let sydney_ish = FixedOffset::east_opt(10 * 3600).unwrap();
        let offset_days = aggregate_daily(&sessions, &formula, &sydney_ish);
        assert_eq!(
            offset_days[0].day,
            NaiveDate::from_ymd_opt(2024, 5, 11).unwrap()
        );
    }

    #[test]
    fn test_sorted_most_recent_first() {
        let formula = Formula::default();
        let day1 = Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let day3 = Utc.with_ymd_and_hms(2024, 5, 9, 12, 0, 0).unwrap();
        let sessions = vec![
            session_ending(day1, 600, SessionKind::Productivity, 0),
            session_ending(day2, 600, SessionKind::Productivity, 0),
            session_ending(day3, 600, SessionKind::Productivity, 0),
        ];

        let days = aggregate_daily(&sessions, &formula, &Utc);
        let keys: Vec<NaiveDate> = days.iter().map(|d| d.day).collect();
        assert_eq!(
            keys,
            vec![
                NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 9).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 8).unwrap(),
            ]
        );
    }

    #[test]
    fn test_harmony_additivity() {
        let formula = Formula {
            time_divisor: 20,
            play_time_divisor: 30,
        };
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut sessions = Vec::new();
        for i in 0..14 {
            let end = base + Duration::days(i) + Duration::minutes(i * 7);
            let kind = if i % 3 == 0 {
                SessionKind::Play
            } else {
                SessionKind::Productivity
            };
            sessions.push(session_ending(end, 300 + i * 180, kind, i % 4));
        }

        let days = aggregate_daily(&sessions, &formula, &Utc);
        let harmony_sum: f64 = days.iter().map(|d| d.daily_harmony_score).sum();
        let prod_sum: f64 = days.iter().map(|d| d.total_productivity_points).sum();
        let play_sum: f64 = days.iter().map(|d| d.total_play_points).sum();
        assert!((harmony_sum - (prod_sum - play_sum)).abs() < 1e-9);
    }

    #[test]
    fn test_harmony_consistent_mid_fold() {
        let formula = Formula::default();
        let end = Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap();
        let mut summary = DailySummary::empty(local_day(end, &Utc), end);

        summary.absorb(
            &session_ending(end, 1200, SessionKind::Productivity, 2),
            &formula,
        );
        assert_eq!(
            summary.daily_harmony_score,
            summary.total_productivity_points - summary.total_play_points
        );

        summary.absorb(&session_ending(end, 900, SessionKind::Play, 0), &formula);
        assert_eq!(
            summary.daily_harmony_score,
            summary.total_productivity_points - summary.total_play_points
        );
    }

    #[test]
    fn test_time_distribution_averages() {
        let formula = Formula::default();
        let d1 = Utc.with_ymd_and_hms(2024, 5, 9, 12, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let sessions = vec![
            session_ending(d1, 1200, SessionKind::Productivity, 0),
            session_ending(d2, 600, SessionKind::Productivity, 0),
            session_ending(d2, 300, SessionKind::Play, 0),
        ];

        let days = aggregate_daily(&sessions, &formula, &Utc);
        let dist = time_distribution(&days);
        assert_eq!(dist.tracked_days, 2);
        assert_eq!(dist.avg_work_secs, 900.0);
        assert_eq!(dist.avg_play_secs, 150.0);
    }
}
