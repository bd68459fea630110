//! Tempo Web Dashboard
//!
//! Local JSON API hosting the live timer plus the aggregated dashboard
//! surfaces. A background task re-runs the daily aggregation whenever the
//! session hub publishes a new snapshot, so read endpoints serve a cached
//! summary list instead of recomputing per request.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempo_core::{
    aggregate::{aggregate_daily, time_distribution, TimeDistribution},
    goals::{goal_progress, GoalProgress},
    heatmap::{build_heatmap, HeatmapGrid, HeatmapMetric, HeatmapWindow},
    score::{self, HarmonyZone},
    store::StoreError,
    timer::{PendingSession, TimerError, TimerSnapshot},
    DailySummary, Location, NewSession, Session, SessionHub, SessionKind, SessionStore,
    SqliteStore, Task, TaskSnapshot, TimerService, UserProfile,
};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

type Hub = SessionHub<SqliteStore>;

#[derive(Clone)]
struct AppState {
    hub: Arc<Mutex<Hub>>,
    timer: Arc<TimerService<SqliteStore>>,
    summaries: Arc<RwLock<Vec<DailySummary>>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("tempo=info,tower_http=info")
        .init();

    let store = SqliteStore::open_default()?;
    let hub = Arc::new(Mutex::new(Hub::new(store)?));
    let timer = Arc::new(TimerService::new(hub.clone()));
    let state = AppState {
        hub: hub.clone(),
        timer,
        summaries: Arc::new(RwLock::new(Vec::new())),
    };

    refresh_summaries(&state).await?;
    spawn_summary_refresher(state.clone()).await;

    let app = Router::new()
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/sessions/:id",
            get(get_session).put(update_session).delete(delete_session),
        )
        .route("/api/sessions/batch-delete", post(batch_delete))
        .route("/api/summary", get(summary_handler))
        .route("/api/distribution", get(distribution_handler))
        .route("/api/harmony", get(harmony_handler))
        .route("/api/goals", get(goals_handler))
        .route("/api/heatmap", get(heatmap_handler))
        .route("/api/profile", get(get_profile).put(save_profile))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/:id", get(get_task).put(update_task).delete(delete_task))
        .route("/api/timer", get(timer_status))
        .route("/api/timer/start", post(timer_start))
        .route("/api/timer/pause", post(timer_pause))
        .route("/api/timer/stop", post(timer_stop))
        .route("/api/timer/confirm", post(timer_confirm))
        .route("/api/timer/discard", post(timer_discard))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = "127.0.0.1:7870";
    info!("Starting dashboard API at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Re-aggregate the cached summaries whenever the hub publishes a new
/// session snapshot
async fn spawn_summary_refresher(state: AppState) {
    let mut rx = state.hub.lock().await.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            if let Err(err) = refresh_summaries(&state).await {
                error!("failed to refresh summaries: {}", err);
            }
        }
    });
}

async fn refresh_summaries(state: &AppState) -> Result<(), StoreError> {
    let (sessions, formula) = {
        let hub = state.hub.lock().await;
        (hub.sessions(), hub.store().load_profile()?.formula)
    };
    let summaries = aggregate_daily(&sessions, &formula, &Local);
    *state.summaries.write().await = summaries;
    Ok(())
}

fn store_status(err: StoreError) -> StatusCode {
    match err {
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::InvalidProfile(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<Session>> {
    Json(state.hub.lock().await.sessions().as_ref().clone())
}

async fn create_session(
    State(state): State<AppState>,
    Json(mut new): Json<NewSession>,
) -> Result<Json<Session>, StatusCode> {
    // The score is always the sum of the snapshots supplied at save time
    new.session_score = NewSession::score_of(&new.completed_tasks);
    let session = state
        .hub
        .lock()
        .await
        .create_session(&new)
        .map_err(store_status)?;
    Ok(Json(session))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Session>, StatusCode> {
    let session = state
        .hub
        .lock()
        .await
        .store()
        .get_session(id)
        .map_err(store_status)?;
    session.map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut session): Json<Session>,
) -> Result<Json<Session>, StatusCode> {
    if session.end_time < session.start_time {
        return Err(StatusCode::BAD_REQUEST);
    }
    session.id = Some(id);
    session.session_score = NewSession::score_of(&session.completed_tasks);
    // Timed sessions get their worked duration recomputed from the edited
    // bounds, clamping breaks to the new window; untimed entries keep the
    // duration they were logged with
    if session.start_time != session.end_time {
        session.rebound();
    }
    state
        .hub
        .lock()
        .await
        .update_session(&session)
        .map_err(store_status)?;
    Ok(Json(session))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    state
        .hub
        .lock()
        .await
        .delete_session(id)
        .map_err(store_status)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct BatchDeleteRequest {
    ids: Vec<i64>,
}

#[derive(Serialize)]
struct BatchDeleteResponse {
    removed: usize,
}

async fn batch_delete(
    State(state): State<AppState>,
    Json(payload): Json<BatchDeleteRequest>,
) -> Result<Json<BatchDeleteResponse>, StatusCode> {
    let removed = state
        .hub
        .lock()
        .await
        .delete_sessions(&payload.ids)
        .map_err(store_status)?;
    Ok(Json(BatchDeleteResponse { removed }))
}

async fn summary_handler(State(state): State<AppState>) -> Json<Vec<DailySummary>> {
    Json(state.summaries.read().await.clone())
}

async fn distribution_handler(State(state): State<AppState>) -> Json<TimeDistribution> {
    Json(time_distribution(&state.summaries.read().await))
}

#[derive(Serialize)]
struct HarmonyResponse {
    score: f64,
    productivity_points: f64,
    play_points: f64,
    rail_position: f64,
    message: &'static str,
}

async fn harmony_handler(State(state): State<AppState>) -> Json<HarmonyResponse> {
    let summaries = state.summaries.read().await;
    let total = score::harmony_score(&summaries);
    let (productivity_points, play_points) = score::point_totals(&summaries);
    Json(HarmonyResponse {
        score: total,
        productivity_points,
        play_points,
        rail_position: score::rail_position(total),
        message: HarmonyZone::of(total).message(),
    })
}

async fn goals_handler(State(state): State<AppState>) -> Result<Json<Vec<GoalProgress>>, StatusCode> {
    let goals = {
        let hub = state.hub.lock().await;
        hub.store().load_profile().map_err(store_status)?.goals
    };
    let summaries = state.summaries.read().await;
    let today = Local::now().date_naive();
    Ok(Json(goal_progress(&goals, &summaries, today)))
}

#[derive(Deserialize)]
struct HeatmapQuery {
    metric: Option<String>,
    window: Option<String>,
}

async fn heatmap_handler(
    State(state): State<AppState>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<HeatmapGrid>, StatusCode> {
    let metric = match query.metric.as_deref() {
        Some(s) => HeatmapMetric::from_str(s).ok_or(StatusCode::BAD_REQUEST)?,
        None => HeatmapMetric::WorkDuration,
    };
    let window = match query.window.as_deref() {
        Some("year") | Some("full_year") => HeatmapWindow::FullYear,
        _ => HeatmapWindow::Recent,
    };
    let summaries = state.summaries.read().await;
    let grid = build_heatmap(&summaries, metric, window, Local::now().date_naive());
    Ok(Json(grid))
}

async fn get_profile(State(state): State<AppState>) -> Result<Json<UserProfile>, StatusCode> {
    let profile = state
        .hub
        .lock()
        .await
        .store()
        .load_profile()
        .map_err(store_status)?;
    Ok(Json(profile))
}

async fn save_profile(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<UserProfile>, StatusCode> {
    state
        .hub
        .lock()
        .await
        .store()
        .save_profile(&profile)
        .map_err(store_status)?;
    // Summaries depend on the formula, so rebuild the cache
    refresh_summaries(&state)
        .await
        .map_err(store_status)?;
    Ok(Json(profile))
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, StatusCode> {
    let tasks = state
        .hub
        .lock()
        .await
        .store()
        .list_tasks()
        .map_err(store_status)?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<AppState>,
    Json(task): Json<Task>,
) -> Result<Json<Task>, StatusCode> {
    let created = state
        .hub
        .lock()
        .await
        .store()
        .create_task(&task)
        .map_err(store_status)?;
    Ok(Json(created))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, StatusCode> {
    let tasks = state
        .hub
        .lock()
        .await
        .store()
        .list_tasks()
        .map_err(store_status)?;
    tasks
        .into_iter()
        .find(|t| t.id == Some(id))
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut task): Json<Task>,
) -> Result<Json<Task>, StatusCode> {
    task.id = Some(id);
    state
        .hub
        .lock()
        .await
        .store()
        .update_task(&task)
        .map_err(store_status)?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    state
        .hub
        .lock()
        .await
        .store()
        .delete_task(id)
        .map_err(store_status)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct TimerStatus {
    snapshot: TimerSnapshot,
    pending: Option<PendingSession>,
}

async fn timer_status(State(state): State<AppState>) -> Json<TimerStatus> {
    Json(TimerStatus {
        snapshot: state.timer.snapshot().await,
        pending: state.timer.pending().await,
    })
}

#[derive(Deserialize)]
struct StartRequest {
    #[serde(default)]
    kind: SessionKind,
}

async fn timer_start(
    State(state): State<AppState>,
    Json(payload): Json<StartRequest>,
) -> Json<TimerSnapshot> {
    Json(state.timer.start(payload.kind).await)
}

async fn timer_pause(State(state): State<AppState>) -> Json<TimerSnapshot> {
    Json(state.timer.pause().await)
}

async fn timer_stop(State(state): State<AppState>) -> Json<Option<PendingSession>> {
    Json(state.timer.stop().await)
}

#[derive(Deserialize)]
struct ConfirmRequest {
    #[serde(default)]
    notes: String,
    #[serde(default)]
    completed_tasks: Vec<TaskSnapshot>,
    location: Option<Location>,
}

async fn timer_confirm(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmRequest>,
) -> Result<Json<Session>, StatusCode> {
    let session = state
        .timer
        .confirm(payload.notes, payload.completed_tasks, payload.location)
        .await
        .map_err(|err| match err {
            TimerError::NoPending => StatusCode::CONFLICT,
            TimerError::Store(err) => store_status(err),
        })?;
    Ok(Json(session))
}

#[derive(Serialize)]
struct DiscardResponse {
    discarded: bool,
}

async fn timer_discard(State(state): State<AppState>) -> Json<DiscardResponse> {
    Json(DiscardResponse {
        discarded: state.timer.discard().await,
    })
}
