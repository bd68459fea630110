//! Goal progress
//!
//! A goal targets an average daily metric value over the window from today
//! to the goal's end date. Days without any recorded activity do not drag
//! the average down; they simply don't count.

use crate::{DailySummary, GoalMetric, Goals};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProgress {
    pub metric: GoalMetric,
    pub current: f64,
    pub target: f64,
    pub percentage: f64,
}

fn metric_value(summary: &DailySummary, metric: GoalMetric) -> f64 {
    match metric {
        GoalMetric::TaskScore => summary.total_score as f64,
        // Worked time is tracked in seconds but goals are set in minutes
        GoalMetric::TimeWorked => summary.total_duration as f64 / 60.0,
        GoalMetric::ProductivityPoints => summary.total_productivity_points,
    }
}

/// Progress entries for every active goal. A goal whose end date has passed
/// (or with either field unset) is skipped entirely; an active goal with no
/// activity in its window still reports zero progress.
pub fn goal_progress(
    goals: &Goals,
    summaries: &[DailySummary],
    today: NaiveDate,
) -> Vec<GoalProgress> {
    let mut progress = Vec::new();

    for metric in GoalMetric::ALL {
        let goal = goals.get(metric);
        let (target, end_date) = match (goal.target, goal.end_date) {
            (Some(target), Some(end_date)) => (target, end_date),
            _ => continue,
        };
        if end_date < today {
            continue;
        }

        let window: Vec<&DailySummary> = summaries
            .iter()
            .filter(|s| s.day >= today && s.day <= end_date)
            .collect();

        if window.is_empty() {
            progress.push(GoalProgress {
                metric,
                current: 0.0,
                target,
                percentage: 0.0,
            });
            continue;
        }

        let total: f64 = window.iter().map(|s| metric_value(s, metric)).sum();
        let current = total / window.len() as f64;
        progress.push(GoalProgress {
            metric,
            current,
            target,
            percentage: (current / target * 100.0).min(100.0),
        });
    }

    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Goal;
    use chrono::{Duration, TimeZone, Utc};

    fn summary(day: NaiveDate, duration: i64, score: i64, points: f64) -> DailySummary {
        let mut s = DailySummary::empty(day, Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap());
        s.total_duration = duration;
        s.total_score = score;
        s.total_productivity_points = points;
        s
    }

    fn goals_with(metric: GoalMetric, target: f64, end_date: NaiveDate) -> Goals {
        let mut goals = Goals::default();
        *goals.get_mut(metric) = Goal {
            target: Some(target),
            end_date: Some(end_date),
        };
        goals
    }

    #[test]
    fn test_expired_goal_reports_nothing() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let goals = goals_with(GoalMetric::TaskScore, 100.0, today - Duration::days(1));
        let summaries = vec![summary(today, 600, 50, 1.0)];
        assert!(goal_progress(&goals, &summaries, today).is_empty());
    }

    #[test]
    fn test_goal_ending_today_is_active_and_capped() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let goals = goals_with(GoalMetric::TaskScore, 100.0, today);
        let summaries = vec![summary(today, 600, 250, 1.0)];

        let progress = goal_progress(&goals, &summaries, today);
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].current, 250.0);
        assert_eq!(progress[0].percentage, 100.0);
    }

    #[test]
    fn test_empty_window_still_reported() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let goals = goals_with(GoalMetric::TimeWorked, 60.0, today + Duration::days(7));
        let summaries = vec![summary(today - Duration::days(3), 7200, 0, 0.0)];

        let progress = goal_progress(&goals, &summaries, today);
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].current, 0.0);
        assert_eq!(progress[0].target, 60.0);
        assert_eq!(progress[0].percentage, 0.0);
    }

    #[test]
    fn test_average_over_days_with_activity() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        // Ten-day window, but only two days carry activity: 40 and 20 minutes.
        let goals = goals_with(GoalMetric::TimeWorked, 60.0, today + Duration::days(9));
        let summaries = vec![
            summary(today, 2400, 0, 0.0),
            summary(today + Duration::days(4), 1200, 0, 0.0),
        ];

        let progress = goal_progress(&goals, &summaries, today);
        assert_eq!(progress[0].current, 30.0);
        assert_eq!(progress[0].percentage, 50.0);
    }

    #[test]
    fn test_days_before_today_excluded() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let goals = goals_with(GoalMetric::ProductivityPoints, 4.0, today + Duration::days(3));
        let summaries = vec![
            summary(today - Duration::days(1), 0, 0, 100.0),
            summary(today + Duration::days(1), 0, 0, 2.0),
        ];

        let progress = goal_progress(&goals, &summaries, today);
        assert_eq!(progress[0].current, 2.0);
        assert_eq!(progress[0].percentage, 50.0);
    }

    #[test]
    fn test_unset_fields_mean_inactive() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let mut goals = Goals::default();
        goals.task_score.target = Some(10.0);
        let summaries = vec![summary(today, 600, 5, 1.0)];
        assert!(goal_progress(&goals, &summaries, today).is_empty());
    }
}
