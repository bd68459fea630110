//! Commit activity folding
//!
//! Turns sanitized per-commit line counts into one synthetic untimed session
//! per UTC day of activity. Lockfiles, binary assets, and generated output
//! don't count toward the line total, and a commit whose sanitized total
//! still exceeds the cap is treated as machine-generated and skipped whole.

use crate::github::{CommitDetail, CommitFile};
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use tempo_core::{NewSession, SessionKind};
use tracing::debug;

/// Sanity cap on sanitized additions for a single commit
pub const COMMIT_LINE_LIMIT: i64 = 2500;

const IGNORED_SUFFIXES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    ".min.js",
    ".svg",
    ".png",
    ".jpg",
    ".jpeg",
    ".gif",
    ".webp",
];

const IGNORED_SEGMENTS: &[&str] = &["node_modules/", "dist/", "build/"];

fn is_ignored_path(path: &str) -> bool {
    IGNORED_SUFFIXES.iter().any(|s| path.ends_with(s))
        || IGNORED_SEGMENTS.iter().any(|s| path.contains(s))
}

/// Lines added across the files that count
pub fn sanitized_additions(files: &[CommitFile]) -> i64 {
    files
        .iter()
        .filter(|f| !is_ignored_path(&f.filename))
        .map(|f| f.additions)
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayActivity {
    pub lines_added: i64,
    pub commit_count: u32,
}

/// Fold commit details into per-UTC-day activity totals. Over-cap and
/// zero-line commits contribute nothing.
pub fn fold_commits<'a, I>(details: I) -> BTreeMap<NaiveDate, DayActivity>
where
    I: IntoIterator<Item = &'a CommitDetail>,
{
    let mut days: BTreeMap<NaiveDate, DayActivity> = BTreeMap::new();

    for detail in details {
        let lines = sanitized_additions(&detail.files);
        if lines > COMMIT_LINE_LIMIT {
            debug!(
                sha = %detail.sha,
                lines,
                "skipping commit over the line cap"
            );
            continue;
        }
        if lines <= 0 {
            continue;
        }

        let day = detail.commit.author.date.date_naive();
        let entry = days.entry(day).or_default();
        entry.lines_added += lines;
        entry.commit_count += 1;
    }

    days
}

/// The store key that keeps one synthetic session per day idempotent
pub fn import_key(day: NaiveDate) -> String {
    format!("github-{:04}-{:02}-{:02}", day.year(), day.month(), day.day())
}

/// Build the untimed session for one day of commit activity. Both bounds
/// anchor to noon UTC; the score is lines times the per-user rate, rounded
/// to fit the integer schema.
pub fn synthetic_session(day: NaiveDate, activity: DayActivity, score_per_line: f64) -> NewSession {
    let noon = Utc
        .from_utc_datetime(&day.and_hms_opt(12, 0, 0).expect("noon is a valid time"));
    let session_score = (activity.lines_added as f64 * score_per_line).round() as i64;

    NewSession {
        start_time: noon,
        end_time: noon,
        duration: 0,
        kind: SessionKind::Productivity,
        notes: format!(
            "GitHub Activity: {} lines added across {} valid commit(s).",
            activity.lines_added, activity.commit_count
        ),
        location: None,
        breaks: Vec::new(),
        completed_tasks: Vec::new(),
        session_score,
    }
}
