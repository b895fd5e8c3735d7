use crate::error::Result;
use crate::types::{CacheEntry, ResultRow, RunSummary};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

/// Why a ticker has no cached series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataReason {
    NeverFetched,
    FetchFailed,
}

/// Lookup result for one ticker. A missing ticker is a normal answer, not an error.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickerLookup {
    Available {
        ticker: String,
        entry: CacheEntry,
    },
    NoData {
        ticker: String,
        reason: NoDataReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl TickerLookup {
    /// Classify a cache miss using the most recent run, if any.
    fn missing(ticker: String, last_run: Option<&RunSummary>) -> Self {
        match last_run.and_then(|run| run.skipped_reason(&ticker)) {
            Some(skipped) if skipped.fetch_failed => Self::NoData {
                ticker,
                reason: NoDataReason::FetchFailed,
                error: Some(skipped.reason.clone()),
            },
            _ => Self::NoData {
                ticker,
                reason: NoDataReason::NeverFetched,
                error: None,
            },
        }
    }
}

/// GET /api/stocks
async fn list_results(State(state): State<AppState>) -> Result<Json<Vec<ResultRow>>> {
    Ok(Json(state.store.load_results()?))
}

/// GET /api/stocks/:ticker
async fn get_ticker(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<TickerLookup>> {
    let ticker = ticker.trim().to_uppercase();
    let lookup = match state.store.cache_entry(&ticker)? {
        Some(entry) => TickerLookup::Available { ticker, entry },
        None => {
            let last_run = state.pipeline.last_run().await;
            TickerLookup::missing(ticker, last_run.as_ref())
        }
    };
    Ok(Json(lookup))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_results))
        .route("/:ticker", get(get_ticker))
}
