pub mod alerts;
pub mod health;
pub mod run;
pub mod stocks;

use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(run::router())
        .nest("/api/stocks", stocks::router())
        .nest("/api/alerts", alerts::router())
}
