//! promhaven: Prometheus to analytics-engine bridge
//!
//! Two small components share one engine session:
//!
//! - **Metrics poller**: runs a fixed list of Prometheus instant queries on a
//!   short interval and appends every returned sample to the
//!   `prometheus_metrics` table.
//! - **Alert forwarder**: receives Alertmanager webhooks and appends each
//!   alert to the `prometheus_alerts` table, then joins the two tables and
//!   defines alert plots once per process.
//!
//! # Example
//!
//! ```no_run
//! use promhaven::engine::{Engine, MemoryEngine};
//! use promhaven::poller::{metrics_schema, parse_vector_response, MetricSample, METRICS_TABLE};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = MemoryEngine::new();
//! engine.create_table(&metrics_schema(METRICS_TABLE)).await?;
//!
//! let body = serde_json::json!({
//!     "data": {
//!         "resultType": "vector",
//!         "result": [{"metric": {"job": "a", "instance": "b"}, "value": [1700000000, "1"]}]
//!     }
//! });
//! for sample in parse_vector_response(&body) {
//!     let sample = MetricSample::new("up", sample, chrono::Utc::now());
//!     engine.append_row(METRICS_TABLE, sample.to_row()).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod forwarder;
pub mod poller;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Engine, EngineError};
pub use forwarder::run_server;
pub use poller::MetricsPoller;
