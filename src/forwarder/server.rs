use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::handlers::{health_check, receive_alert, AppState};
use super::model::alerts_schema;
use super::setup::{OneTimeSetup, SetupScripts};
use crate::config::Config;
use crate::engine::{self, Engine};
use crate::poller::{metrics_schema, MetricsPoller, PrometheusClient};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Alertmanager webhook
        .route("/", post(receive_alert))
        // Health check
        .route("/health", get(health_check))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the handler state for the given engine session
pub fn app_state(config: &Config, engine: Arc<dyn Engine>) -> Arc<AppState> {
    Arc::new(AppState {
        engine,
        alerts_table: config.alerts_table.clone(),
        setup: OneTimeSetup::new(),
        setup_scripts: SetupScripts::render(
            &config.alerts_table,
            &config.metrics_table,
            &config.joined_table,
            config.join_bucket,
        ),
    })
}

/// Connect to the engine, start the poller and serve the webhook until Ctrl+C
pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Fatal if the engine never comes up
    let engine = engine::connect(&config).await?;

    engine
        .create_table(&metrics_schema(&config.metrics_table))
        .await?;
    engine
        .create_table(&alerts_schema(&config.alerts_table))
        .await?;

    // Start background poller
    let poller = Arc::new(MetricsPoller::new(
        PrometheusClient::new(&config.prometheus_url, config.http_timeout)?,
        Arc::clone(&engine),
        config.metrics_table.clone(),
        config.queries.clone(),
        config.poll_interval,
    ));
    let poller_handle = Arc::clone(&poller).start();

    let app = build_router(app_state(&config, engine));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting alert webhook on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&poller)))
        .await?;

    poller_handle.abort();

    tracing::info!("promhaven stopped");
    Ok(())
}

async fn shutdown_signal(poller: Arc<MetricsPoller>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, stopping poller...");
    poller.stop();
}
