//! CSV import/export
//!
//! One row per session, with dates and clock times rendered in the user's
//! display format and the worked duration always as HH:MM:SS. The file does
//! not carry the session kind, so a round trip normalizes every row to
//! `productivity` — a documented lossy boundary. Completed-task snapshots
//! cannot be relinked to live tasks either; on import they are folded into
//! the notes as a bracketed annotation.

use crate::format::{self, DateFormat};
use crate::{DisplaySettings, Location, NewSession, Session, SessionKind, TaskSnapshot};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::io::{Read, Write};
use thiserror::Error;
use tracing::debug;

pub const CSV_HEADERS: [&str; 8] = [
    "Date",
    "Start Time",
    "End Time",
    "Work Duration",
    "Session Score",
    "Completed Tasks",
    "Notes",
    "Location (Lat,Lon)",
];

/// Only the first four headers must match for a file to be accepted
const REQUIRED_HEADERS: usize = 4;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognized CSV headers: expected the file to start with \"{expected}\", found \"{found}\"")]
    InvalidHeader { expected: String, found: String },
}

pub struct Exporter {
    settings: DisplaySettings,
}

impl Exporter {
    pub fn new(settings: DisplaySettings) -> Self {
        Self { settings }
    }

    /// Write sessions as CSV, rendering dates and times in the given
    /// timezone. Quoting and quote-doubling are handled by the writer.
    pub fn export<W: Write, Tz: TimeZone>(
        &self,
        writer: W,
        sessions: &[Session],
        tz: &Tz,
    ) -> Result<(), ExportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(CSV_HEADERS)?;

        for session in sessions {
            let start_local = session.start_time.with_timezone(tz);
            let end_local = session.end_time.with_timezone(tz);
            csv_writer.write_record([
                // The row's day is the day the session ended, matching the
                // daily aggregation rule
                self.settings.date_format.format_date(end_local.date_naive()),
                self.settings.time_format.format_time(start_local.time()),
                self.settings.time_format.format_time(end_local.time()),
                format::format_duration(session.duration),
                session.session_score.to_string(),
                task_cell(&session.completed_tasks),
                session.notes.clone(),
                location_cell(session.location),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

fn task_cell(tasks: &[TaskSnapshot]) -> String {
    tasks
        .iter()
        .map(|t| format!("{} ({})", t.name, t.score))
        .collect::<Vec<_>>()
        .join("; ")
}

fn location_cell(location: Option<Location>) -> String {
    location
        .map(|l| format!("{},{}", l.lat, l.lon))
        .unwrap_or_default()
}

pub struct Importer {
    date_format: DateFormat,
}

impl Importer {
    pub fn new(date_format: DateFormat) -> Self {
        Self { date_format }
    }

    /// Parse a CSV file into new session records. A wrong header rejects the
    /// whole file; individual rows with unparseable dates or times are
    /// dropped and the rest imported.
    pub fn import<R: Read, Tz: TimeZone>(
        &self,
        reader: R,
        tz: &Tz,
    ) -> Result<Vec<NewSession>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let found: Vec<&str> = headers.iter().take(REQUIRED_HEADERS).map(str::trim).collect();
        if found != CSV_HEADERS[..REQUIRED_HEADERS] {
            return Err(ImportError::InvalidHeader {
                expected: CSV_HEADERS[..REQUIRED_HEADERS].join(", "),
                found: found.join(", "),
            });
        }

        let mut sessions = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            match self.parse_row(&record, tz) {
                Some(new) => sessions.push(new),
                None => debug!(row = ?record, "dropping unparseable CSV row"),
            }
        }
        Ok(sessions)
    }

    fn parse_row<Tz: TimeZone>(
        &self,
        record: &csv::StringRecord,
        tz: &Tz,
    ) -> Option<NewSession> {
        let cell = |i: usize| record.get(i).unwrap_or("").trim();

        let date = self.date_format.parse_date(cell(0))?;
        let start_str = cell(1);
        let end_str = cell(2);
        let duration = format::parse_duration(cell(3)).unwrap_or(0);
        let session_score = cell(4).parse::<i64>().unwrap_or(0);
        let tasks = cell(5).to_string();
        let notes = cell(6).to_string();
        let location = parse_location(cell(7));

        // Rows without clock times are untimed manual entries: both bounds
        // anchor to noon and the worked time comes from the duration column.
        let (start_time, end_time) = if !start_str.is_empty() && !end_str.is_empty() {
            let start = format::parse_time(start_str)?;
            let end = format::parse_time(end_str)?;
            (
                local_instant(date, start, tz)?,
                local_instant(date, end, tz)?,
            )
        } else {
            let noon = local_instant(date, NaiveTime::from_hms_opt(12, 0, 0)?, tz)?;
            (noon, noon)
        };

        // Exported snapshots can't be relinked to live tasks, so they ride
        // along in the notes instead
        let notes = if tasks.is_empty() {
            notes
        } else if notes.is_empty() {
            format!("[Imported Tasks: {}]", tasks)
        } else {
            format!("{} [Imported Tasks: {}]", notes, tasks)
        };

        Some(NewSession {
            start_time,
            end_time,
            duration,
            kind: SessionKind::Productivity,
            notes,
            location,
            breaks: Vec::new(),
            completed_tasks: Vec::new(),
            session_score,
        })
    }
}

fn local_instant<Tz: TimeZone>(
    date: NaiveDate,
    time: NaiveTime,
    tz: &Tz,
) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_location(cell: &str) -> Option<Location> {
    let (lat, lon) = cell.split_once(',')?;
    Some(Location {
        lat: lat.trim().parse().ok()?,
        lon: lon.trim().parse().ok()?,
    })
}
