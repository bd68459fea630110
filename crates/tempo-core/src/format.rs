//! Duration, date, and time formatting helpers
//!
//! Durations always render as `HH:MM:SS`. Dates and clock times follow the
//! user's configured display format.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Format worked seconds as HH:MM:SS (hours unpadded past 99)
pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Parse an HH:MM:SS duration back into seconds
pub fn parse_duration(s: &str) -> Option<i64> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: i64 = parts[0].parse().ok()?;
    let minutes: i64 = parts[1].parse().ok()?;
    let seconds: i64 = parts[2].parse().ok()?;
    if !(0..60).contains(&minutes) || !(0..60).contains(&seconds) || hours < 0 {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// Date ordering used for display and CSV cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    #[default]
    DayMonthYear,
    MonthDayYear,
    YearMonthDay,
}

impl DateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFormat::DayMonthYear => "DD/MM/YYYY",
            DateFormat::MonthDayYear => "MM/DD/YYYY",
            DateFormat::YearMonthDay => "YYYY/MM/DD",
        }
    }

    /// Parse from a settings label
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dd/mm/yyyy" | "dmy" => Some(DateFormat::DayMonthYear),
            "mm/dd/yyyy" | "mdy" => Some(DateFormat::MonthDayYear),
            "yyyy/mm/dd" | "ymd" => Some(DateFormat::YearMonthDay),
            _ => None,
        }
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        let pattern = match self {
            DateFormat::DayMonthYear => "%d/%m/%Y",
            DateFormat::MonthDayYear => "%m/%d/%Y",
            DateFormat::YearMonthDay => "%Y/%m/%d",
        };
        date.format(pattern).to_string()
    }

    /// Parse a date cell in this ordering, accepting `/` or `-` separators
    pub fn parse_date(&self, s: &str) -> Option<NaiveDate> {
        let normalized = s.trim().replace('-', "/");
        let pattern = match self {
            DateFormat::DayMonthYear => "%d/%m/%Y",
            DateFormat::MonthDayYear => "%m/%d/%Y",
            DateFormat::YearMonthDay => "%Y/%m/%d",
        };
        NaiveDate::parse_from_str(&normalized, pattern).ok()
    }
}

/// 24-hour vs 12-hour clock rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    #[default]
    Hour24,
    Hour12,
}

impl TimeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFormat::Hour24 => "24h",
            TimeFormat::Hour12 => "12h",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "24h" | "24" => Some(TimeFormat::Hour24),
            "12h" | "12" => Some(TimeFormat::Hour12),
            _ => None,
        }
    }

    pub fn format_time(&self, time: NaiveTime) -> String {
        match self {
            TimeFormat::Hour24 => time.format("%H:%M:%S").to_string(),
            TimeFormat::Hour12 => time.format("%I:%M:%S %p").to_string(),
        }
    }
}

/// Parse a clock-time cell regardless of which format wrote it
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let trimmed = s.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%I:%M:%S %p"))
        .ok()
}
