//! Read-only HTTP query API.
//!
//! Every handler takes copies from the shared tracker under a read lock and
//! serializes those. Nothing here mutates tracker state.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::prelude::Result;
use crate::tracker::accuracy::AccuracySummary;
use crate::tracker::logging::targets;
use crate::tracker::metrics::TrackerMetrics;
use crate::tracker::phase::PhaseState;
use crate::tracker::predictor::Forecaster;
use crate::tracker::state::SharedTracker;
use crate::{Category, Error, Outcome, Prediction};

/// Handles shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub tracker: SharedTracker,
    pub metrics: Arc<TrackerMetrics>,
    /// Same forecaster the poll loop uses, for `/next-prediction` previews.
    pub forecaster: Forecaster,
    pub started: Instant,
}

impl AppState {
    pub fn new(tracker: SharedTracker, metrics: Arc<TrackerMetrics>, forecaster: Forecaster) -> Self {
        Self {
            tracker,
            metrics,
            forecaster,
            started: Instant::now(),
        }
    }
}

/// Body of `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Phase read on the last successful tick.
    pub phase: PhaseState,
    pub is_spinning: bool,
    /// Countdown left when spinning, in whole seconds.
    pub remaining_secs: Option<u64>,
    /// `"reactive"` or `"batch"`.
    pub mode: &'static str,
    /// Fresh outcomes collected toward the next batch. Omitted in reactive mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_collected: Option<usize>,
}

/// Body of `/next-prediction`.
#[derive(Debug, Clone, Serialize)]
pub struct NextPrediction {
    pub next_prediction: Category,
}

/// Body of `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server answers.
    pub status: &'static str,
    pub uptime_secs: u64,
}

async fn last_results(State(state): State<AppState>) -> Json<Vec<Outcome>> {
    Json(state.tracker.recent_outcomes())
}

async fn current_prediction(State(state): State<AppState>) -> Json<Option<Prediction>> {
    Json(state.tracker.current_prediction())
}

async fn prediction_history(State(state): State<AppState>) -> Json<Vec<Prediction>> {
    Json(state.tracker.predictions())
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.tracker.status();
    Json(StatusResponse {
        phase: status.phase,
        is_spinning: status.is_spinning,
        remaining_secs: status.remaining_secs,
        mode: state.forecaster.mode().as_str(),
        batch_collected: match state.forecaster {
            Forecaster::Batch(_) => Some(state.tracker.batch_len()),
            Forecaster::Reactive(_) => None,
        },
    })
}

async fn next_prediction(State(state): State<AppState>) -> Json<NextPrediction> {
    let mut rng = SmallRng::from_entropy();
    let forecast = state.tracker.preview(&state.forecaster, &mut rng);
    Json(NextPrediction {
        next_prediction: forecast.category,
    })
}

async fn accuracy(State(state): State<AppState>) -> Json<AccuracySummary> {
    Json(state.tracker.accuracy())
}

async fn metrics(State(state): State<AppState>) -> Json<Value> {
    Json(state.metrics.to_json())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/last-results", get(last_results))
        .route("/last40Plays", get(last_results))
        .route("/predictions", get(current_prediction))
        .route("/prediction-history", get(prediction_history))
        .route("/last10Predictions", get(prediction_history))
        .route("/status", get(status))
        .route("/next-prediction", get(next_prediction))
        .route("/proximaPrevisao", get(next_prediction))
        .route("/accuracy", get(accuracy))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
}

/// Serve the query API until `shutdown` flips to true.
pub async fn serve(state: AppState, addr: &str, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Startup(format!("failed to bind {addr}: {e}")))?;
    info!(target: targets::SERVER, addr = %addr, "Query API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| {
            warn!(target: targets::SERVER, error = %e, "Query API error");
            Error::GenericRequest(e.to_string())
        })?;

    info!(target: targets::SERVER, "Query API stopped");
    Ok(())
}
