//! promhaven server
//!
//! Run with: cargo run
//!
//! Polls Prometheus into the engine's metric table and serves the
//! Alertmanager webhook on PROMHAVEN_HOST:PROMHAVEN_PORT. See
//! `promhaven::config` for every environment variable; RUST_LOG sets the
//! log level (default: info).
//!
//! Exits with status 1 if the engine cannot be reached within the
//! connection retry budget.

use std::process::ExitCode;

use promhaven::{run_server, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "promhaven=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    config.log();

    match run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "promhaven failed");
            eprintln!("promhaven: {}", e);
            ExitCode::FAILURE
        }
    }
}
