//! Tempo CLI
//!
//! Command-line interface for logging sessions and reviewing productivity
//! and play balance.

use anyhow::{anyhow, bail, Result};
use chrono::{Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};
use tempo_core::{
    aggregate::{aggregate_daily, time_distribution},
    export::{Exporter, Importer},
    format,
    goals::goal_progress,
    heatmap::{build_heatmap, CellLevel, HeatmapGrid, HeatmapMetric, HeatmapWindow},
    score::{self, HarmonyZone},
    store::SessionStore,
    DailySummary, GithubSettings, Goal, GoalMetric, NewSession, Session, SessionKind, SqliteStore,
    Task, TaskSnapshot,
};

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "Productivity and play balance tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's summary and goal progress
    Today,

    /// Show recent daily summaries
    Summary {
        /// Number of days to show
        #[arg(short, long, default_value = "14")]
        days: usize,
    },

    /// Show the session log, most recent first
    Log {
        /// Number of sessions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Log a session manually
    Add {
        /// Session date (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Start time of day (HH:MM:SS)
        #[arg(long)]
        start: Option<String>,

        /// End time of day (HH:MM:SS)
        #[arg(long)]
        end: Option<String>,

        /// Worked duration (HH:MM:SS); derived from start/end when omitted
        #[arg(long)]
        duration: Option<String>,

        /// Log as a play session instead of productivity
        #[arg(long)]
        play: bool,

        /// Notes
        #[arg(short, long, default_value = "")]
        notes: String,

        /// Completed task ids (repeatable)
        #[arg(short, long = "task")]
        tasks: Vec<i64>,
    },

    /// Edit a stored session
    Edit {
        /// Session id
        id: i64,

        /// New session date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,

        /// New start time of day (HH:MM:SS)
        #[arg(long)]
        start: Option<String>,

        /// New end time of day (HH:MM:SS)
        #[arg(long)]
        end: Option<String>,

        /// Replace the notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Change the kind (productivity or play)
        #[arg(short, long)]
        kind: Option<String>,

        /// Replace completed tasks with these task ids (repeatable)
        #[arg(short, long = "task")]
        tasks: Option<Vec<i64>>,
    },

    /// Delete sessions by id (one atomic batch)
    Delete {
        /// Session ids
        ids: Vec<i64>,
    },

    /// Export all sessions to CSV
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import sessions from a CSV file
    Import {
        /// Input file
        file: PathBuf,
    },

    /// Render a calendar heatmap
    Heatmap {
        /// Metric to color by (duration, score, play, harmony)
        #[arg(short, long, default_value = "duration")]
        metric: String,

        /// Show the full calendar year instead of the trailing window
        #[arg(long)]
        full_year: bool,
    },

    /// Show or change goals
    Goals {
        #[command(subcommand)]
        command: Option<GoalsCommand>,
    },

    /// Show or change the scoring formula
    Formula {
        #[command(subcommand)]
        command: Option<FormulaCommand>,
    },

    /// Show the cumulative harmony score
    Harmony,

    /// Show or change display formats
    Display {
        /// Date ordering (dmy, mdy, ymd)
        #[arg(long)]
        date: Option<String>,

        /// Clock style (24h, 12h)
        #[arg(long)]
        time: Option<String>,
    },

    /// Link or tune the GitHub activity scout
    Github {
        /// GitHub username
        #[arg(long)]
        username: Option<String>,

        /// Session score per line added
        #[arg(long)]
        score_per_line: Option<f64>,
    },

    /// Manage reusable tasks
    Tasks {
        #[command(subcommand)]
        command: TasksCommand,
    },
}

#[derive(Subcommand)]
enum GoalsCommand {
    /// Set a goal for a metric
    Set {
        /// Metric (task_score, time_worked, productivity_points)
        metric: String,
        /// Average daily target (minutes for time_worked)
        target: f64,
        /// End date (YYYY-MM-DD)
        end_date: String,
    },
    /// Remove a goal
    Clear {
        /// Metric (task_score, time_worked, productivity_points)
        metric: String,
    },
}

#[derive(Subcommand)]
enum FormulaCommand {
    /// Change the divisors
    Set {
        /// Minutes of work per productivity point
        #[arg(long)]
        time_divisor: Option<i64>,
        /// Minutes of play per play point
        #[arg(long)]
        play_time_divisor: Option<i64>,
    },
}

#[derive(Subcommand)]
enum TasksCommand {
    /// List tasks
    List,
    /// Add a task
    Add {
        name: String,
        /// Point value
        #[arg(short, long, default_value = "1")]
        score: i64,
    },
    /// Edit a task (historical sessions keep their snapshots)
    Edit {
        id: i64,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        score: Option<i64>,
    },
    /// Delete a task
    Delete { id: i64 },
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Day")]
    day: String,
    #[tabled(rename = "Worked")]
    worked: String,
    #[tabled(rename = "Play")]
    play: String,
    #[tabled(rename = "Sessions")]
    sessions: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Harmony")]
    harmony: String,
}

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Breaks")]
    breaks: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Score")]
    score: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let store = SqliteStore::open_default()?;

    match cli.command {
        Commands::Today => show_today(&store),
        Commands::Summary { days } => show_summary(&store, days),
        Commands::Log { limit } => show_log(&store, limit),
        Commands::Add {
            date,
            start,
            end,
            duration,
            play,
            notes,
            tasks,
        } => add_session(&store, date, start, end, duration, play, notes, &tasks),
        Commands::Edit {
            id,
            date,
            start,
            end,
            notes,
            kind,
            tasks,
        } => edit_session(&store, id, date, start, end, notes, kind, tasks),
        Commands::Delete { ids } => {
            let removed = store.delete_sessions(&ids)?;
            println!("{}", format!("Deleted {} session(s)", removed).green());
            Ok(())
        }
        Commands::Export { output } => export_csv(&store, output),
        Commands::Import { file } => import_csv(&store, &file),
        Commands::Heatmap { metric, full_year } => show_heatmap(&store, &metric, full_year),
        Commands::Goals { command } => match command {
            None => show_goals(&store),
            Some(GoalsCommand::Set {
                metric,
                target,
                end_date,
            }) => set_goal(&store, &metric, target, &end_date),
            Some(GoalsCommand::Clear { metric }) => clear_goal(&store, &metric),
        },
        Commands::Formula { command } => match command {
            None => show_formula(&store),
            Some(FormulaCommand::Set {
                time_divisor,
                play_time_divisor,
            }) => set_formula(&store, time_divisor, play_time_divisor),
        },
        Commands::Harmony => show_harmony(&store),
        Commands::Display { date, time } => configure_display(&store, date, time),
        Commands::Github {
            username,
            score_per_line,
        } => configure_github(&store, username, score_per_line),
        Commands::Tasks { command } => match command {
            TasksCommand::List => list_tasks(&store),
            TasksCommand::Add { name, score } => {
                let task = store.create_task(&Task {
                    id: None,
                    name,
                    score,
                })?;
                println!(
                    "{}",
                    format!("Added task #{} ({} pts)", task.id.unwrap_or(0), task.score).green()
                );
                Ok(())
            }
            TasksCommand::Edit { id, name, score } => edit_task(&store, id, name, score),
            TasksCommand::Delete { id } => {
                store.delete_task(id)?;
                println!("{}", "Task deleted".green());
                Ok(())
            }
        },
    }
}

fn daily_summaries(store: &SqliteStore) -> Result<Vec<DailySummary>> {
    let sessions = store.list_sessions()?;
    let formula = store.load_profile()?.formula;
    Ok(aggregate_daily(&sessions, &formula, &Local))
}

fn parse_cli_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date {:?}, expected YYYY-MM-DD", s))
}

fn parse_cli_time(s: &str) -> Result<NaiveTime> {
    format::parse_time(s).ok_or_else(|| anyhow!("invalid time {:?}, expected HH:MM:SS", s))
}

fn local_instant(date: NaiveDate, time: NaiveTime) -> Result<chrono::DateTime<Utc>> {
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("{} {} does not exist in the local timezone", date, time))
}

fn snapshots_for(store: &SqliteStore, ids: &[i64]) -> Result<Vec<TaskSnapshot>> {
    let tasks = store.list_tasks()?;
    ids.iter()
        .map(|id| {
            tasks
                .iter()
                .find(|t| t.id == Some(*id))
                .map(|t| TaskSnapshot {
                    id: t.id,
                    name: t.name.clone(),
                    score: t.score,
                })
                .ok_or_else(|| anyhow!("no task with id {}", id))
        })
        .collect()
}

fn show_today(store: &SqliteStore) -> Result<()> {
    let summaries = daily_summaries(store)?;
    let profile = store.load_profile()?;
    let today = Local::now().date_naive();

    println!("\n{}", "Today".bold().cyan());
    println!("{}", "─".repeat(40));

    let empty = DailySummary::empty(today, Utc::now());
    let day = summaries.iter().find(|s| s.day == today).unwrap_or(&empty);

    let rows = vec![
        StatRow {
            metric: "Worked".to_string(),
            value: format::format_duration(day.total_duration),
        },
        StatRow {
            metric: "Play".to_string(),
            value: format::format_duration(day.total_play_duration),
        },
        StatRow {
            metric: "Sessions".to_string(),
            value: day.session_count.to_string(),
        },
        StatRow {
            metric: "Task Score".to_string(),
            value: day.total_score.to_string(),
        },
        StatRow {
            metric: "Productivity Points".to_string(),
            value: format!("{:.2}", day.total_productivity_points),
        },
        StatRow {
            metric: "Play Points".to_string(),
            value: format!("{:.2}", day.total_play_points),
        },
        StatRow {
            metric: "Harmony".to_string(),
            value: format!("{:+.2}", day.daily_harmony_score),
        },
    ];
    println!("{}", Table::new(rows).with(Style::rounded()));

    let progress = goal_progress(&profile.goals, &summaries, today);
    if !progress.is_empty() {
        println!("\n{}", "Goals".bold().cyan());
        for p in progress {
            println!(
                "  {:<22} {:>8.1} / {:<8.1} {}",
                p.metric.as_str(),
                p.current,
                p.target,
                format!("{:.0}%", p.percentage).green()
            );
        }
    }
    Ok(())
}

fn show_summary(store: &SqliteStore, days: usize) -> Result<()> {
    let summaries = daily_summaries(store)?;
    if summaries.is_empty() {
        println!("\n{}", "No sessions recorded yet.".yellow());
        return Ok(());
    }

    println!("\n{}", "Daily Summary".bold().cyan());
    println!("{}", "─".repeat(60));

    let rows: Vec<SummaryRow> = summaries
        .iter()
        .take(days)
        .map(|s| SummaryRow {
            day: s.day.format("%Y-%m-%d").to_string(),
            worked: format::format_duration(s.total_duration),
            play: format::format_duration(s.total_play_duration),
            sessions: s.session_count.to_string(),
            score: s.total_score.to_string(),
            harmony: format!("{:+.2}", s.daily_harmony_score),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    let dist = time_distribution(&summaries);
    println!(
        "\nAcross {} tracked day(s): avg {} worked, {} play per day",
        dist.tracked_days,
        format::format_duration(dist.avg_work_secs as i64),
        format::format_duration(dist.avg_play_secs as i64),
    );
    Ok(())
}

fn show_log(store: &SqliteStore, limit: usize) -> Result<()> {
    let sessions = store.list_sessions()?;
    if sessions.is_empty() {
        println!("\n{}", "No sessions recorded yet.".yellow());
        return Ok(());
    }

    let display = store.load_profile()?.display;

    println!("\n{}", "Session Log".bold().cyan());
    println!("{}", "─".repeat(60));

    let rows: Vec<SessionRow> = sessions.iter().take(limit).map(|s| session_row(s, &display)).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn session_row(session: &Session, display: &tempo_core::DisplaySettings) -> SessionRow {
    let end_local = session.end_time.with_timezone(&Local);
    // Untimed entries carry no meaningful clock times
    let time = if session.start_time == session.end_time {
        "—".to_string()
    } else {
        let start_local = session.start_time.with_timezone(&Local);
        format!(
            "{} – {}",
            display.time_format.format_time(start_local.time()),
            display.time_format.format_time(end_local.time())
        )
    };
    let mut notes = session.notes.clone();
    if notes.chars().count() > 40 {
        notes = format!("{}…", notes.chars().take(39).collect::<String>());
    }
    SessionRow {
        id: session.id.map(|id| id.to_string()).unwrap_or_default(),
        date: display.date_format.format_date(end_local.date_naive()),
        time,
        duration: format::format_duration(session.duration),
        kind: session.kind.as_str().to_string(),
        score: session.session_score.to_string(),
        breaks: session.breaks.len().to_string(),
        notes,
    }
}

#[allow(clippy::too_many_arguments)]
fn add_session(
    store: &SqliteStore,
    date: Option<String>,
    start: Option<String>,
    end: Option<String>,
    duration: Option<String>,
    play: bool,
    notes: String,
    task_ids: &[i64],
) -> Result<()> {
    let date = match date {
        Some(d) => parse_cli_date(&d)?,
        None => Local::now().date_naive(),
    };
    let duration_secs = duration
        .as_deref()
        .map(|d| format::parse_duration(d).ok_or_else(|| anyhow!("invalid duration {:?}", d)))
        .transpose()?;

    let (start_time, end_time, duration_secs) = match (start, end) {
        (Some(start), Some(end)) => {
            let start_time = local_instant(date, parse_cli_time(&start)?)?;
            let end_time = local_instant(date, parse_cli_time(&end)?)?;
            if end_time < start_time {
                bail!("end time is before start time");
            }
            let elapsed = (end_time - start_time).num_seconds();
            (start_time, end_time, duration_secs.unwrap_or(elapsed))
        }
        (None, None) => {
            // Untimed manual entry, anchored to noon
            let noon = local_instant(date, NaiveTime::from_hms_opt(12, 0, 0).unwrap())?;
            (noon, noon, duration_secs.unwrap_or(0))
        }
        _ => bail!("--start and --end must be given together"),
    };

    let completed_tasks = snapshots_for(store, task_ids)?;
    let session_score = NewSession::score_of(&completed_tasks);
    let kind = if play {
        SessionKind::Play
    } else {
        SessionKind::Productivity
    };

    let session = store.create_session(&NewSession {
        start_time,
        end_time,
        duration: duration_secs,
        kind,
        notes,
        location: None,
        breaks: Vec::new(),
        completed_tasks,
        session_score,
    })?;
    println!(
        "{}",
        format!(
            "Logged session #{} ({}, {} pts)",
            session.id.unwrap_or(0),
            format::format_duration(session.duration),
            session.session_score
        )
        .green()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn edit_session(
    store: &SqliteStore,
    id: i64,
    date: Option<String>,
    start: Option<String>,
    end: Option<String>,
    notes: Option<String>,
    kind: Option<String>,
    task_ids: Option<Vec<i64>>,
) -> Result<()> {
    let mut session = store
        .get_session(id)?
        .ok_or_else(|| anyhow!("no session with id {}", id))?;

    let day = match date {
        Some(d) => parse_cli_date(&d)?,
        None => session.end_time.with_timezone(&Local).date_naive(),
    };
    let bounds_changed = start.is_some() || end.is_some();
    if let Some(start) = start {
        session.start_time = local_instant(day, parse_cli_time(&start)?)?;
    }
    if let Some(end) = end {
        session.end_time = local_instant(day, parse_cli_time(&end)?)?;
    }
    if session.end_time < session.start_time {
        bail!("end time is before start time");
    }

    // New bounds mean a new worked duration; breaks outside the edited
    // window are clamped away so none outlive the session they belong to
    if bounds_changed {
        session.rebound();
    }

    if let Some(notes) = notes {
        session.notes = notes;
    }
    if let Some(kind) = kind {
        session.kind =
            SessionKind::from_str(&kind).ok_or_else(|| anyhow!("unknown kind {:?}", kind))?;
    }
    if let Some(ids) = task_ids {
        session.completed_tasks = snapshots_for(store, &ids)?;
        session.session_score = NewSession::score_of(&session.completed_tasks);
    }

    store.update_session(&session)?;
    println!("{}", format!("Updated session #{}", id).green());
    Ok(())
}

fn export_csv(store: &SqliteStore, output: Option<PathBuf>) -> Result<()> {
    let sessions = store.list_sessions()?;
    let display = store.load_profile()?.display;
    let exporter = Exporter::new(display);

    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    exporter.export(writer, &sessions, &Local)?;

    if let Some(path) = output {
        println!(
            "{}",
            format!("Exported {} session(s) to {}", sessions.len(), path.display()).green()
        );
    }
    Ok(())
}

fn import_csv(store: &SqliteStore, file: &PathBuf) -> Result<()> {
    let display = store.load_profile()?.display;
    let importer = Importer::new(display.date_format);

    let reader = File::open(file)?;
    let batch = importer.import(reader, &Local)?;
    let created = store.create_sessions(&batch)?;
    println!(
        "{}",
        format!("Imported {} session(s)", created.len()).green()
    );
    Ok(())
}

fn show_heatmap(store: &SqliteStore, metric: &str, full_year: bool) -> Result<()> {
    let metric =
        HeatmapMetric::from_str(metric).ok_or_else(|| anyhow!("unknown metric {:?}", metric))?;
    let window = if full_year {
        HeatmapWindow::FullYear
    } else {
        HeatmapWindow::Recent
    };
    let summaries = daily_summaries(store)?;
    let grid = build_heatmap(&summaries, metric, window, Local::now().date_naive());

    println!("\n{}", format!("Heatmap — {}", metric.as_str()).bold().cyan());
    render_heatmap(&grid);
    Ok(())
}

fn render_heatmap(grid: &HeatmapGrid) {
    let columns = grid.cells.len().div_ceil(7);

    let mut label_row = vec![' '; columns * 2];
    for label in &grid.month_labels {
        for (i, ch) in label.label.chars().enumerate() {
            let pos = label.column * 2 + i;
            if pos < label_row.len() {
                label_row[pos] = ch;
            }
        }
    }
    println!("    {}", label_row.into_iter().collect::<String>());

    const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for row in 0..7 {
        let mut line = String::new();
        for col in 0..columns {
            let idx = col * 7 + row;
            match grid.cells.get(idx) {
                Some(cell) => line.push_str(&cell_glyph(cell.level)),
                None => line.push_str("  "),
            }
        }
        println!("{} {}", WEEKDAYS[row].dimmed(), line);
    }
}

fn cell_glyph(level: CellLevel) -> String {
    match level {
        CellLevel::Placeholder => "  ".to_string(),
        CellLevel::Future => "· ".dimmed().to_string(),
        CellLevel::Data(0) => "■ ".truecolor(60, 60, 60).to_string(),
        CellLevel::Data(n) if n > 0 => {
            let g = 90 + (n.min(5) as u8) * 30;
            format!("{} ", "■".truecolor(40, g, 40))
        }
        CellLevel::Data(n) => {
            let r = 90 + (n.unsigned_abs().min(3)) * 40;
            format!("{} ", "■".truecolor(r, 40, 40))
        }
    }
}

fn show_goals(store: &SqliteStore) -> Result<()> {
    let profile = store.load_profile()?;
    let summaries = daily_summaries(store)?;
    let today = Local::now().date_naive();

    println!("\n{}", "Goals".bold().cyan());
    println!("{}", "─".repeat(50));

    let mut any = false;
    for metric in GoalMetric::ALL {
        let goal = profile.goals.get(metric);
        if let (Some(target), Some(end_date)) = (goal.target, goal.end_date) {
            any = true;
            let status = if end_date < today {
                "expired".yellow().to_string()
            } else {
                format!("until {}", end_date)
            };
            println!("  {:<22} {:>8.1}/day  {}", metric.as_str(), target, status);
        }
    }
    if !any {
        println!("  {}", "No goals set.".yellow());
        return Ok(());
    }

    let progress = goal_progress(&profile.goals, &summaries, today);
    if !progress.is_empty() {
        println!("\n{}", "Progress".bold());
        for p in progress {
            println!(
                "  {:<22} {:>8.1} / {:<8.1} {}",
                p.metric.as_str(),
                p.current,
                p.target,
                format!("{:.0}%", p.percentage).green()
            );
        }
    }
    Ok(())
}

fn set_goal(store: &SqliteStore, metric: &str, target: f64, end_date: &str) -> Result<()> {
    let metric =
        GoalMetric::from_str(metric).ok_or_else(|| anyhow!("unknown metric {:?}", metric))?;
    let end_date = parse_cli_date(end_date)?;

    let mut profile = store.load_profile()?;
    *profile.goals.get_mut(metric) = Goal {
        target: Some(target),
        end_date: Some(end_date),
    };
    store.save_profile(&profile)?;
    println!(
        "{}",
        format!("Goal set: {} {:.1}/day until {}", metric.as_str(), target, end_date).green()
    );
    Ok(())
}

fn clear_goal(store: &SqliteStore, metric: &str) -> Result<()> {
    let metric =
        GoalMetric::from_str(metric).ok_or_else(|| anyhow!("unknown metric {:?}", metric))?;
    let mut profile = store.load_profile()?;
    *profile.goals.get_mut(metric) = Goal::default();
    store.save_profile(&profile)?;
    println!("{}", format!("Cleared {} goal", metric.as_str()).green());
    Ok(())
}

fn show_formula(store: &SqliteStore) -> Result<()> {
    let formula = store.load_profile()?.formula;
    println!("\n{}", "Scoring Formula".bold().cyan());
    println!("  {} min of work per productivity point", formula.time_divisor);
    println!("  {} min of play per play point", formula.play_time_divisor);
    Ok(())
}

fn set_formula(
    store: &SqliteStore,
    time_divisor: Option<i64>,
    play_time_divisor: Option<i64>,
) -> Result<()> {
    let mut profile = store.load_profile()?;
    if let Some(d) = time_divisor {
        profile.formula.time_divisor = d;
    }
    if let Some(d) = play_time_divisor {
        profile.formula.play_time_divisor = d;
    }
    // A non-positive divisor fails validation here and nothing is persisted
    store.save_profile(&profile)?;
    println!("{}", "Formula updated".green());
    Ok(())
}

fn show_harmony(store: &SqliteStore) -> Result<()> {
    let summaries = daily_summaries(store)?;
    let total = score::harmony_score(&summaries);
    let (prod, play) = score::point_totals(&summaries);
    let zone = HarmonyZone::of(total);

    println!("\n{}", "Harmony".bold().cyan());
    println!("{}", "─".repeat(40));
    println!("  Productivity points: {:.2}", prod);
    println!("  Play points:         {:.2}", play);
    println!("  Harmony score:       {:+.2}", total);

    // Rail from deep play (left) to deep work (right)
    let position = (score::rail_position(total) / 100.0 * 30.0).round() as usize;
    let mut rail = vec!['─'; 31];
    rail[15] = '┼';
    rail[position.min(30)] = '●';
    println!("  play {} work", rail.into_iter().collect::<String>());
    println!("  {}", zone.message().bold());
    Ok(())
}

fn configure_display(
    store: &SqliteStore,
    date: Option<String>,
    time: Option<String>,
) -> Result<()> {
    let mut profile = store.load_profile()?;

    if date.is_none() && time.is_none() {
        println!("\n{}", "Display Settings".bold().cyan());
        println!("  Date format: {}", profile.display.date_format.as_str());
        println!("  Time format: {}", profile.display.time_format.as_str());
        return Ok(());
    }

    if let Some(date) = date {
        profile.display.date_format = format::DateFormat::parse(&date)
            .ok_or_else(|| anyhow!("unknown date format {:?} (use dmy, mdy, or ymd)", date))?;
    }
    if let Some(time) = time {
        profile.display.time_format = format::TimeFormat::parse(&time)
            .ok_or_else(|| anyhow!("unknown time format {:?} (use 24h or 12h)", time))?;
    }
    store.save_profile(&profile)?;
    println!("{}", "Display settings updated".green());
    Ok(())
}

fn configure_github(
    store: &SqliteStore,
    username: Option<String>,
    score_per_line: Option<f64>,
) -> Result<()> {
    let mut profile = store.load_profile()?;

    if username.is_none() && score_per_line.is_none() {
        println!("\n{}", "GitHub Scout".bold().cyan());
        match &profile.github {
            Some(github) => {
                println!("  Username:       {}", github.username);
                println!("  Score per line: {}", github.score_per_line);
                match github.last_scout {
                    Some(at) => println!("  Last scout:     {}", at.to_rfc3339()),
                    None => println!("  Last scout:     never"),
                }
            }
            None => println!("  {}", "No account linked.".yellow()),
        }
        return Ok(());
    }

    match profile.github.as_mut() {
        Some(github) => {
            if let Some(username) = username {
                github.username = username;
            }
            if let Some(rate) = score_per_line {
                github.score_per_line = rate;
            }
        }
        None => {
            let username =
                username.ok_or_else(|| anyhow!("--username is required to link an account"))?;
            profile.github = Some(GithubSettings {
                username,
                score_per_line: score_per_line.unwrap_or(0.1),
                last_scout: None,
            });
        }
    }
    store.save_profile(&profile)?;
    println!("{}", "GitHub settings updated".green());
    Ok(())
}

fn list_tasks(store: &SqliteStore) -> Result<()> {
    let tasks = store.list_tasks()?;
    if tasks.is_empty() {
        println!("\n{}", "No tasks defined yet.".yellow());
        return Ok(());
    }

    println!("\n{}", "Tasks".bold().cyan());
    let rows: Vec<TaskRow> = tasks
        .iter()
        .map(|t| TaskRow {
            id: t.id.map(|id| id.to_string()).unwrap_or_default(),
            name: t.name.clone(),
            score: t.score.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn edit_task(
    store: &SqliteStore,
    id: i64,
    name: Option<String>,
    score: Option<i64>,
) -> Result<()> {
    let tasks = store.list_tasks()?;
    let mut task = tasks
        .into_iter()
        .find(|t| t.id == Some(id))
        .ok_or_else(|| anyhow!("no task with id {}", id))?;

    if let Some(name) = name {
        task.name = name;
    }
    if let Some(score) = score {
        task.score = score;
    }
    store.update_task(&task)?;
    println!("{}", format!("Updated task #{}", id).green());
    Ok(())
}
