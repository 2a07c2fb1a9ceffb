//! Client side of the external analytics engine
//!
//! The engine is an opaque collaborator: it stores rows in append-only
//! tables and executes scripts. This module exposes the narrow surface the
//! bridge needs from it:
//! - create a table from a fixed column schema
//! - append one typed row to a table
//! - run a script against the open session

pub mod http;
pub mod memory;
pub mod retry;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, EngineKind};

pub use http::HttpEngine;
pub use memory::MemoryEngine;
pub use retry::RetryPolicy;
pub use schema::{Column, DataType, Row, TableSchema, Value};

/// Session with the external engine.
///
/// Implementations are shared by the poller task and every HTTP handler,
/// so `append_row` must be safe to call concurrently.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Define an append-only table
    async fn create_table(&self, schema: &TableSchema) -> Result<(), EngineError>;

    /// Append a single row to a previously created table
    async fn append_row(&self, table: &str, row: Row) -> Result<(), EngineError>;

    /// Execute a script in the engine session
    async fn run_script(&self, script: &str) -> Result<(), EngineError>;
}

/// Open the engine session selected by the configuration
pub async fn connect(config: &Config) -> Result<Arc<dyn Engine>, EngineError> {
    match config.engine {
        EngineKind::Http => {
            let engine =
                HttpEngine::connect(&config.engine_url, config.http_timeout, &config.connect_retry)
                    .await?;
            Ok(Arc::new(engine))
        }
        EngineKind::Memory => {
            tracing::warn!("Using in-memory engine, rows are only logged");
            Ok(Arc::new(MemoryEngine::new()))
        }
    }
}

/// Engine errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Engine returned status {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Row does not match schema of '{table}': {reason}")]
    SchemaMismatch { table: String, reason: String },

    #[error("Failed to connect after {attempts} attempts: {last_error}")]
    ConnectFailed { attempts: u32, last_error: String },
}
