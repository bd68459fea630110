//! Calendar heatmap bucketing
//!
//! Maps per-day metric values onto small ordinal intensity levels. Unsigned
//! metrics use five levels; the signed harmony metric uses three mirrored
//! levels per sign. Alignment placeholders and future days are separate
//! variants so they can never collide with a real intensity.

use crate::DailySummary;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

const RECENT_WINDOW_DAYS: i64 = 120;
const MIN_LABEL_GAP_COLUMNS: usize = 3;

/// Intensity of one rendered cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "level", rename_all = "snake_case")]
pub enum CellLevel {
    /// Leading alignment cell before the window starts
    Placeholder,
    /// A day after today (full-year mode only)
    Future,
    /// Real data: 0..=5 for unsigned metrics, -3..=3 for harmony
    Data(i8),
}

/// Which per-day value the heatmap colors by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatmapMetric {
    WorkDuration,
    TaskScore,
    PlayDuration,
    Harmony,
}

impl HeatmapMetric {
    pub fn is_signed(&self) -> bool {
        matches!(self, HeatmapMetric::Harmony)
    }

    pub fn value_of(&self, summary: &DailySummary) -> f64 {
        match self {
            HeatmapMetric::WorkDuration => summary.total_duration as f64,
            HeatmapMetric::TaskScore => summary.total_score as f64,
            HeatmapMetric::PlayDuration => summary.total_play_duration as f64,
            HeatmapMetric::Harmony => summary.daily_harmony_score,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeatmapMetric::WorkDuration => "duration",
            HeatmapMetric::TaskScore => "score",
            HeatmapMetric::PlayDuration => "play",
            HeatmapMetric::Harmony => "harmony",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "duration" | "time" => Some(HeatmapMetric::WorkDuration),
            "score" => Some(HeatmapMetric::TaskScore),
            "play" => Some(HeatmapMetric::PlayDuration),
            "harmony" => Some(HeatmapMetric::Harmony),
            _ => None,
        }
    }
}

/// Window selection: a trailing strip for compact layouts, or the whole
/// current calendar year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatmapWindow {
    Recent,
    FullYear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayCell {
    /// None for alignment placeholders
    pub date: Option<NaiveDate>,
    pub value: f64,
    pub level: CellLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthLabel {
    pub label: String,
    /// Week-grid column index (0-based)
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapGrid {
    pub cells: Vec<DayCell>,
    pub month_labels: Vec<MonthLabel>,
}

/// Bucket an unsigned value into 0..=5. Any nonzero value maps to at least
/// level 1 so trace activity stays visually distinct from none.
pub fn unsigned_level(value: f64, max: f64) -> i8 {
    if value <= 0.0 {
        return 0;
    }
    let max = max.max(1.0);
    let thresholds = [0.01, 0.25, 0.50, 0.75];
    for (i, t) in thresholds.iter().enumerate() {
        if value <= t * max {
            return (i + 1) as i8;
        }
    }
    5
}

/// Bucket a signed value into -3..=3, sign-preserving; exactly zero is 0
pub fn signed_level(value: f64, max_abs: f64) -> i8 {
    if value == 0.0 {
        return 0;
    }
    let max_abs = max_abs.max(1.0);
    let magnitude = value.abs();
    let thresholds = [0.10, 0.40, 0.70];
    let mut level = 3i8;
    for (i, t) in thresholds.iter().enumerate() {
        if magnitude <= t * max_abs {
            level = (i + 1) as i8;
            break;
        }
    }
    if value < 0.0 {
        -level
    } else {
        level
    }
}

/// Build the cell grid for one metric. Cells run Monday-first; leading
/// placeholders pad the window start onto its weekday column.
pub fn build_heatmap(
    summaries: &[DailySummary],
    metric: HeatmapMetric,
    window: HeatmapWindow,
    today: NaiveDate,
) -> HeatmapGrid {
    let values: HashMap<NaiveDate, f64> = summaries
        .iter()
        .map(|s| (s.day, metric.value_of(s)))
        .collect();

    let scale = if metric.is_signed() {
        values.values().fold(0.0f64, |m, v| m.max(v.abs()))
    } else {
        values.values().fold(0.0f64, |m, v| m.max(*v))
    };

    let (start, end) = match window {
        HeatmapWindow::Recent => (today - Duration::days(RECENT_WINDOW_DAYS - 1), today),
        HeatmapWindow::FullYear => {
            let jan1 = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
            let dec31 = NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today);
            (jan1, dec31)
        }
    };

    let placeholder_count = start.weekday().num_days_from_monday() as usize;
    let mut cells: Vec<DayCell> = (0..placeholder_count)
        .map(|_| DayCell {
            date: None,
            value: 0.0,
            level: CellLevel::Placeholder,
        })
        .collect();

    let mut month_labels = Vec::new();
    let mut last_seen_month: Option<u32> = None;
    let mut last_label_column: Option<usize> = None;

    let mut date = start;
    let mut index = 0usize;
    while date <= end {
        if last_seen_month != Some(date.month()) {
            last_seen_month = Some(date.month());
            let column = (placeholder_count + index) / 7;
            let far_enough = last_label_column
                .map(|prev| column > prev + MIN_LABEL_GAP_COLUMNS)
                .unwrap_or(true);
            if far_enough {
                month_labels.push(MonthLabel {
                    label: date.format("%b").to_string(),
                    column,
                });
                last_label_column = Some(column);
            }
        }

        if date > today {
            cells.push(DayCell {
                date: Some(date),
                value: 0.0,
                level: CellLevel::Future,
            });
        } else {
            let value = values.get(&date).copied().unwrap_or(0.0);
            let level = if metric.is_signed() {
                signed_level(value, scale)
            } else {
                unsigned_level(value, scale)
            };
            cells.push(DayCell {
                date: Some(date),
                value,
                level: CellLevel::Data(level),
            });
        }

        date += Duration::days(1);
        index += 1;
    }

    HeatmapGrid {
        cells,
        month_labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn summary_on(day: NaiveDate, duration: i64, harmony: f64) -> DailySummary {
        let mut s = DailySummary::empty(day, Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap());
        s.total_duration = duration;
        s.daily_harmony_score = harmony;
        s
    }

    #[test]
    fn test_unsigned_levels_monotonic() {
        let max = 1000.0;
        let samples = [0.0, 0.5, 5.0, 10.0, 200.0, 400.0, 600.0, 800.0, 1000.0];
        let levels: Vec<i8> = samples.iter().map(|v| unsigned_level(*v, max)).collect();
        for pair in levels.windows(2) {
            assert!(pair[0] <= pair[1], "levels must not decrease: {:?}", levels);
        }
        assert_eq!(levels[0], 0);
        assert_eq!(*levels.last().unwrap(), 5);
    }

    #[test]
    fn test_tiny_nonzero_value_is_visible() {
        assert_eq!(unsigned_level(0.001, 1000.0), 1);
        assert_eq!(unsigned_level(0.0, 1000.0), 0);
    }

    #[test]
    fn test_unsigned_threshold_edges() {
        let max = 100.0;
        assert_eq!(unsigned_level(1.0, max), 1);
        assert_eq!(unsigned_level(25.0, max), 2);
        assert_eq!(unsigned_level(50.0, max), 3);
        assert_eq!(unsigned_level(75.0, max), 4);
        assert_eq!(unsigned_level(75.1, max), 5);
    }

    #[test]
    fn test_signed_levels_mirror() {
        let max_abs = 10.0;
        for v in [0.5, 2.0, 5.0, 8.0, 10.0] {
            assert_eq!(signed_level(-v, max_abs), -signed_level(v, max_abs));
        }
        assert_eq!(signed_level(0.0, max_abs), 0);
        assert_eq!(signed_level(10.0, max_abs), 3);
        assert_eq!(signed_level(0.5, max_abs), 1);
    }

    #[test]
    fn test_recent_window_shape() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 25).unwrap();
        let grid = build_heatmap(&[], HeatmapMetric::WorkDuration, HeatmapWindow::Recent, today);

        let placeholders = grid
            .cells
            .iter()
            .take_while(|c| c.level == CellLevel::Placeholder)
            .count();
        // Window starts Sunday 2024-04-28, six columns into a Monday-first week
        assert_eq!(placeholders, 6);
        assert_eq!(grid.cells.len() - placeholders, 120);
        assert!(grid.cells[placeholders..]
            .iter()
            .all(|c| c.level != CellLevel::Placeholder && c.date.is_some()));
    }

    #[test]
    fn test_month_labels_suppressed_near_window_start() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 25).unwrap();
        let grid = build_heatmap(&[], HeatmapMetric::WorkDuration, HeatmapWindow::Recent, today);

        let labels: Vec<&str> = grid.month_labels.iter().map(|l| l.label.as_str()).collect();
        // May 1 lands one column after the Apr label and is dropped
        assert_eq!(labels, vec!["Apr", "Jun", "Jul", "Aug"]);
    }

    #[test]
    fn test_full_year_marks_future_days() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 5, 9).unwrap();
        let summaries = vec![summary_on(day, 3600, 0.0)];
        let grid = build_heatmap(
            &summaries,
            HeatmapMetric::WorkDuration,
            HeatmapWindow::FullYear,
            today,
        );

        // 2024 opens on a Monday: no placeholders, a leap year of cells
        assert_eq!(grid.cells.len(), 366);
        let future = grid
            .cells
            .iter()
            .filter(|c| c.level == CellLevel::Future)
            .count();
        let dec31 = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(future as i64, (dec31 - today).num_days());

        let tracked = grid
            .cells
            .iter()
            .find(|c| c.date == Some(day))
            .expect("tracked day present");
        assert_eq!(tracked.level, CellLevel::Data(5));
        let empty = grid
            .cells
            .iter()
            .find(|c| c.date == Some(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()))
            .unwrap();
        assert_eq!(empty.level, CellLevel::Data(0));
    }

    #[test]
    fn test_sentinels_distinct_from_data() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let grid = build_heatmap(&[], HeatmapMetric::Harmony, HeatmapWindow::FullYear, today);
        for cell in &grid.cells {
            if let CellLevel::Data(level) = cell.level {
                assert!((-3..=5).contains(&level));
            }
        }
        assert!(grid.cells.iter().any(|c| c.level == CellLevel::Future));
        assert_ne!(CellLevel::Placeholder, CellLevel::Future);
        assert_ne!(CellLevel::Future, CellLevel::Data(0));
    }

    #[test]
    fn test_harmony_cells_keep_sign() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let up = NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
        let down = NaiveDate::from_ymd_opt(2024, 5, 9).unwrap();
        let summaries = vec![summary_on(up, 0, 6.0), summary_on(down, 0, -6.0)];
        let grid = build_heatmap(&summaries, HeatmapMetric::Harmony, HeatmapWindow::Recent, today);

        let cell_up = grid.cells.iter().find(|c| c.date == Some(up)).unwrap();
        let cell_down = grid.cells.iter().find(|c| c.date == Some(down)).unwrap();
        assert_eq!(cell_up.level, CellLevel::Data(3));
        assert_eq!(cell_down.level, CellLevel::Data(-3));
    }
}
