use crate::error::{AppError, Result};
use crate::types::AlertRecord;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
}

impl AlertsQuery {
    fn limit(&self) -> Result<usize> {
        match self.limit {
            None => Ok(DEFAULT_LIMIT),
            Some(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
            Some(n) => Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, n
            ))),
        }
    }
}

/// GET /api/alerts?limit=N
async fn recent_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<AlertRecord>>> {
    let limit = query.limit()?;
    Ok(Json(state.alerts.recent(limit).await))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(recent_alerts))
}
