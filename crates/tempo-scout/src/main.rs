//! Tempo Scout
//!
//! One-shot GitHub activity importer: fetches the linked user's commits
//! since the last run, folds sanitized line counts into per-UTC-day totals,
//! and upserts one untimed productivity session per active day. Intended to
//! run from cron once a day; repeat runs for the same day are idempotent.

mod activity;
mod github;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tempo_core::{store::SessionStore, SqliteStore};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tempo-scout")]
#[command(about = "Imports GitHub commit activity as untimed sessions")]
#[command(version)]
struct Args {
    /// Database file (defaults to the standard data directory)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Fetch and fold activity without writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tempo=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let store = match &args.db {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_default()?,
    };

    let mut profile = store.load_profile()?;
    let settings = profile
        .github
        .clone()
        .context("no GitHub account linked in the profile")?;
    // The token never touches the profile; it comes from the environment
    let token = std::env::var("GITHUB_TOKEN").context("GITHUB_TOKEN is not set")?;

    info!(
        username = %settings.username,
        last_scout = ?settings.last_scout,
        "starting scout pass"
    );

    let client = github::GithubClient::new(&token)?;
    let repos = client.list_repos(&settings.username).await?;
    info!("found {} repositories", repos.len());

    let mut details = Vec::new();
    for repo in &repos {
        let commits = client
            .list_commits(&repo.full_name, &settings.username, settings.last_scout)
            .await?;
        for commit in commits {
            match client.commit_detail(&commit.url).await {
                Ok(detail) => details.push(detail),
                Err(err) => {
                    warn!(sha = %commit.sha, error = %err, "skipping commit without details")
                }
            }
        }
    }
    info!("processing {} new commit(s)", details.len());

    let days = activity::fold_commits(&details);
    if days.is_empty() {
        info!("no countable activity since the last scout");
    }

    for (day, stats) in &days {
        let session = activity::synthetic_session(*day, *stats, settings.score_per_line);
        if args.dry_run {
            info!(
                %day,
                lines = stats.lines_added,
                score = session.session_score,
                "dry run, not writing"
            );
            continue;
        }
        store.upsert_imported(&activity::import_key(*day), &session)?;
        info!(
            %day,
            lines = stats.lines_added,
            commits = stats.commit_count,
            score = session.session_score,
            "session upserted"
        );
    }

    // Advance the watermark even when nothing landed, so the next pass
    // doesn't re-walk the same commits
    if !args.dry_run {
        if let Some(github) = profile.github.as_mut() {
            github.last_scout = Some(Utc::now());
        }
        store.save_profile(&profile)?;
    }

    info!("scout pass finished: {} day(s) of activity", days.len());
    Ok(())
}
