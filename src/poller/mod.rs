//! Metrics poller
//!
//! Periodically runs a fixed list of Prometheus instant queries and appends
//! every returned sample to the metric sink table.

pub mod prometheus;
pub mod sample;
pub mod worker;

pub use prometheus::{parse_vector_response, InstantSample, PrometheusClient};
pub use sample::{metrics_schema, MetricSample, METRICS_TABLE};
pub use worker::MetricsPoller;

/// Poller errors
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Prometheus returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
