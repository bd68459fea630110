//! Scoring formula and harmony score
//!
//! Worked minutes divided by a per-kind divisor yield points; productivity
//! sessions additionally carry their task score. The harmony score is the
//! running difference between the two point totals.

use crate::{DailySummary, Formula, Session, SessionKind};

/// Points earned by a productivity session. Play sessions and unconfigured
/// or non-positive divisors yield 0 rather than poisoning the totals.
pub fn productivity_points(session: &Session, formula: &Formula) -> f64 {
    if session.kind != SessionKind::Productivity || formula.time_divisor <= 0 {
        return 0.0;
    }
    (session.duration as f64 / 60.0) / formula.time_divisor as f64 + session.session_score as f64
}

/// Points spent by a play session. Task scores never contribute here.
pub fn play_points(session: &Session, formula: &Formula) -> f64 {
    if session.kind != SessionKind::Play || formula.play_time_divisor <= 0 {
        return 0.0;
    }
    (session.duration as f64 / 60.0) / formula.play_time_divisor as f64
}

/// Cumulative harmony score: the sum of every day's harmony, unbounded
pub fn harmony_score(summaries: &[DailySummary]) -> f64 {
    summaries.iter().map(|s| s.daily_harmony_score).sum()
}

/// Lifetime productivity and play point totals, for the score breakdown view
pub fn point_totals(summaries: &[DailySummary]) -> (f64, f64) {
    summaries.iter().fold((0.0, 0.0), |(prod, play), s| {
        (
            prod + s.total_productivity_points,
            play + s.total_play_points,
        )
    })
}

/// Where the cumulative score sits on the balance rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmonyZone {
    DeepWork,
    Productive,
    Balanced,
    Playful,
    DeepPlay,
}

impl HarmonyZone {
    pub fn of(score: f64) -> Self {
        if score > 5.0 {
            HarmonyZone::DeepWork
        } else if score > 1.0 {
            HarmonyZone::Productive
        } else if score < -5.0 {
            HarmonyZone::DeepPlay
        } else if score < -1.0 {
            HarmonyZone::Playful
        } else {
            HarmonyZone::Balanced
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            HarmonyZone::DeepWork => "Well ahead on work. Time to play!",
            HarmonyZone::Productive => "Leaning productive.",
            HarmonyZone::Balanced => "In balance.",
            HarmonyZone::Playful => "Leaning playful.",
            HarmonyZone::DeepPlay => "Play is winning. Time to focus!",
        }
    }
}

/// Map a harmony score onto the display rail as a 0-100 percentage.
/// The score itself is unbounded; only the rail position clamps to [-10, 10].
pub fn rail_position(score: f64) -> f64 {
    let clamped = score.clamp(-10.0, 10.0);
    (clamped + 10.0) / 20.0 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn session(kind: SessionKind, duration: i64, score: i64) -> Session {
        let start = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        Session {
            id: None,
            start_time: start,
            end_time: start + chrono::Duration::seconds(duration),
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
    fn test_productivity_points_formula() {
        let formula = Formula {
            time_divisor: 20,
            play_time_divisor: 30,
        };
        let s = session(SessionKind::Productivity, 1200, 5);
        assert_eq!(productivity_points(&s, &formula), 6.0);
    }

    #[test]
    fn test_play_points_formula() {
        let formula = Formula {
            time_divisor: 20,
            play_time_divisor: 30,
        };
        let s = session(SessionKind::Play, 900, 0);
        assert_eq!(play_points(&s, &formula), 0.5);
    }

    #[test]
    fn test_points_respect_kind() {
        let formula = Formula::default();
        let play = session(SessionKind::Play, 1200, 5);
        let prod = session(SessionKind::Productivity, 1200, 5);
        assert_eq!(productivity_points(&play, &formula), 0.0);
        assert_eq!(play_points(&prod, &formula), 0.0);
    }

    #[test]
    fn test_non_positive_divisor_yields_zero() {
        let formula = Formula {
            time_divisor: 0,
            play_time_divisor: -3,
        };
        let prod = session(SessionKind::Productivity, 1200, 5);
        let play = session(SessionKind::Play, 900, 0);
        assert_eq!(productivity_points(&prod, &formula), 0.0);
        assert_eq!(play_points(&play, &formula), 0.0);
    }

    #[test]
    fn test_rail_position_clamps() {
        assert_eq!(rail_position(0.0), 50.0);
        assert_eq!(rail_position(10.0), 100.0);
        assert_eq!(rail_position(25.0), 100.0);
        assert_eq!(rail_position(-10.0), 0.0);
        assert_eq!(rail_position(-40.0), 0.0);
        assert_eq!(rail_position(5.0), 75.0);
    }

    #[test]
    fn test_zone_boundaries() {
        assert_eq!(HarmonyZone::of(5.1), HarmonyZone::DeepWork);
        assert_eq!(HarmonyZone::of(5.0), HarmonyZone::Productive);
        assert_eq!(HarmonyZone::of(1.0), HarmonyZone::Balanced);
        assert_eq!(HarmonyZone::of(-1.0), HarmonyZone::Balanced);
        assert_eq!(HarmonyZone::of(-2.0), HarmonyZone::Playful);
        assert_eq!(HarmonyZone::of(-6.0), HarmonyZone::DeepPlay);
    }
}
