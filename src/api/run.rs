use crate::error::{AppError, Result};
use crate::types::{RunPhase, RunSummary};
use crate::AppState;
use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Serialize;

/// Pipeline state as seen by collaborators.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub phase: RunPhase,
    pub running: bool,
    pub tickers: Vec<String>,
    pub update_interval_secs: u64,
    pub last_run: Option<RunSummary>,
}

/// POST /api/update
///
/// Runs the pipeline to completion and returns its summary. Answers 409 when
/// a run is already active. The run lives on its own task, so it finishes
/// even if the client goes away.
async fn trigger_update(State(state): State<AppState>) -> Result<Json<RunSummary>> {
    let pipeline = state.pipeline.clone();
    let summary = tokio::spawn(async move { pipeline.run().await })
        .await
        .map_err(|e| AppError::Internal(format!("pipeline task failed: {}", e)))??;
    Ok(Json(summary))
}

/// GET /api/status
async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let pipeline = &state.pipeline;
    Json(StatusResponse {
        phase: pipeline.phase().await,
        running: pipeline.is_running(),
        tickers: pipeline.tickers().to_vec(),
        update_interval_secs: state.config.update_interval.as_secs(),
        last_run: pipeline.last_run().await,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/update", get(trigger_update).post(trigger_update))
        .route("/api/status", get(get_status))
}
