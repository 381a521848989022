use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Query, State},
    http::Method,
    response::Html,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{debug, error, info};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::error::AppError;
use crate::source::ParticipantSource;
use crate::types::{Roster, Segment, WinnerResult};
use crate::wheel::{compute_segments, select_winner, total_tickets};

pub struct ApiState<S> {
    pub source: Arc<S>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub static_dir: PathBuf,
}

impl<S> ApiState<S> {
    pub fn new(source: S, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: Arc::new(source),
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
            static_dir: static_dir.into(),
        }
    }
}

// Manual impl: `S` itself need not be Clone.
impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            health: Arc::clone(&self.health),
            latency: Arc::clone(&self.latency),
            static_dir: self.static_dir.clone(),
        }
    }
}

pub fn router<S: ParticipantSource>(state: ApiState<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index::<S>))
        .route("/health", get(health::<S>))
        .route("/api/fetch", get(get_wheel_data::<S>))
        .route("/api/spin", get(spin_wheel::<S>))
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Query parameter naming a participant to leave off the wheel. Repeatable.
const EXCLUDE_PARAM: &str = "exclude";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub last_fetch_ok: Option<bool>,
    pub last_fetch_at_ns: Option<u64>,
    pub fetch_failures: u64,
    pub fetch_samples: u64,
    pub fetch_p50_ms: Option<f64>,
    pub fetch_p95_ms: Option<f64>,
    pub fetch_p99_ms: Option<f64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_wheel_data<S: ParticipantSource>(
    State(state): State<ApiState<S>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Segment>>, AppError> {
    let roster = load_roster(&state, &params).await?;
    let segments = compute_segments(&roster)?;
    info!(
        participants = segments.len(),
        total_tickets = %total_tickets(&roster),
        "Computed wheel segments"
    );
    Ok(Json(segments))
}

async fn spin_wheel<S: ParticipantSource>(
    State(state): State<ApiState<S>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<WinnerResult>, AppError> {
    let roster = load_roster(&state, &params).await?;
    let winner = select_winner(&roster, &mut rand::rng())?.to_string();
    info!(
        winner = %winner,
        total_tickets = %total_tickets(&roster),
        "Wheel spun"
    );
    Ok(Json(WinnerResult { winner }))
}

async fn health<S: ParticipantSource>(State(state): State<ApiState<S>>) -> Json<HealthResponse> {
    let last_fetch_ok = state.health.last_fetch_ok();
    let (fetch_p50_ms, fetch_p95_ms, fetch_p99_ms) = state.latency.percentiles_ms();
    Json(HealthResponse {
        status: if last_fetch_ok == Some(false) { "degraded" } else { "ok" },
        last_fetch_ok,
        last_fetch_at_ns: Some(state.health.last_fetch_at_ns()).filter(|&ns| ns > 0),
        fetch_failures: state.health.fetch_failures(),
        fetch_samples: state.latency.len(),
        fetch_p50_ms,
        fetch_p95_ms,
        fetch_p99_ms,
    })
}

async fn index<S: ParticipantSource>(State(state): State<ApiState<S>>) -> Result<Html<String>, AppError> {
    let path = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Ok(Html(page)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::NotFound("index.html".to_string()))
        }
        Err(e) => {
            error!("Failed to read {}: {e}", path.display());
            Err(AppError::Io(e))
        }
    }
}

/// One upstream fetch per request, minus every row whose name was excluded.
/// Failures are logged in full here and reach the client only as the generic
/// 500 message.
async fn load_roster<S: ParticipantSource>(
    state: &ApiState<S>,
    params: &[(String, String)],
) -> Result<Roster, AppError> {
    let started = Instant::now();
    let result = state.source.fetch().await;
    state.latency.record(started.elapsed());

    match result {
        Ok(mut roster) => {
            state.health.record_success(now_ns());
            let excluded = excluded_names(params);
            if !excluded.is_empty() {
                let before = roster.len();
                roster.retain(|p| !excluded.contains(p.name.as_str()));
                debug!(excluded = excluded.len(), removed = before - roster.len(), "Applied exclusions");
            }
            Ok(roster)
        }
        Err(e) => {
            error!("Error fetching participant data: {e}");
            state.health.record_failure(now_ns());
            Err(e.into())
        }
    }
}

/// Trimmed, non-blank values of every `exclude` parameter.
fn excluded_names(params: &[(String, String)]) -> HashSet<&str> {
    params
        .iter()
        .filter(|(key, _)| key == EXCLUDE_PARAM)
        .map(|(_, name)| name.trim())
        .filter(|name| !name.is_empty())
        .collect()
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
