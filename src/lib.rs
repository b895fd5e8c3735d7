//! Squeeze Watch - short squeeze screening pipeline and read API

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use std::sync::Arc;

use config::Config;
use services::{AlertService, Pipeline, ResultStore};
use sources::MarketDataProvider;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<ResultStore>,
    pub alerts: Arc<AlertService>,
}

impl AppState {
    /// Wire the store, alert service and pipeline around `provider`.
    pub fn new(config: Config, provider: Arc<dyn MarketDataProvider>) -> Self {
        let store = Arc::new(ResultStore::new(config.cache_file(), config.results_file()));
        let alerts = Arc::new(AlertService::from_config(
            &config.alerts,
            config.alert_history_file(),
        ));
        let pipeline = Arc::new(Pipeline::new(
            &config,
            provider,
            store.clone(),
            Some(alerts.clone()),
        ));

        Self {
            config: Arc::new(config),
            pipeline,
            store,
            alerts,
        }
    }
}
