use axum::Router;
use squeeze_watch::config::Config;
use squeeze_watch::services::spawn_scheduler;
use squeeze_watch::sources::YahooFinanceClient;
use squeeze_watch::{api, AppState};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squeeze_watch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    config.ensure_directories()?;
    info!(
        "Starting Squeeze Watch on {}:{} for {} tickers",
        config.host,
        config.port,
        config.tickers.len()
    );

    let provider = Arc::new(YahooFinanceClient::new(config.provider_timeout)?);
    let state = AppState::new(config, provider);
    info!("Alerting on scores >= {:.2}", state.alerts.threshold());

    // Run immediately, then on the configured interval
    spawn_scheduler(state.pipeline.clone(), state.config.update_interval);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let addr = format!("{}:{}", state.config.host, state.config.port);

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Squeeze Watch listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
