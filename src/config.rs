//! Runtime configuration
//!
//! Environment variables:
//! - PROMHAVEN_PROMETHEUS_URL: Prometheus base URL (default: http://prometheus:9090)
//! - PROMHAVEN_QUERIES: Comma-separated query expressions
//! - PROMHAVEN_POLL_INTERVAL_MS: Pause between poll sweeps (default: 500, minimum: 10)
//! - PROMHAVEN_ENGINE: `http` or `memory` (default: http)
//! - PROMHAVEN_ENGINE_URL: Engine base URL (default: http://envoy:10000)
//! - PROMHAVEN_CONNECT_ATTEMPTS: Engine connection attempts (default: 5)
//! - PROMHAVEN_CONNECT_DELAY_MS: Delay after the first failed attempt (default: 2000)
//! - PROMHAVEN_HTTP_TIMEOUT_SECS: Timeout for outgoing requests (default: 10)
//! - PROMHAVEN_HOST: Webhook bind address (default: 0.0.0.0)
//! - PROMHAVEN_PORT: Webhook port (default: 5000)
//! - PROMHAVEN_JOIN_BUCKET_MS: Time bucket for the alerts/metrics join (default: 500)

use std::str::FromStr;
use std::time::Duration;

use crate::engine::RetryPolicy;
use crate::forwarder::setup::JOINED_TABLE;
use crate::forwarder::ALERTS_TABLE;
use crate::poller::METRICS_TABLE;

pub const DEFAULT_QUERIES: [&str; 3] = [
    "go_memstats_alloc_bytes",
    "go_memstats_heap_idle_bytes",
    "go_memstats_frees_total",
];

/// Lower bound for the pause between poll sweeps
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Which engine implementation to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Remote engine over HTTP
    Http,
    /// In-process engine, for dry runs
    Memory,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(EngineKind::Http),
            "memory" => Ok(EngineKind::Memory),
            other => Err(format!("unknown engine kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub prometheus_url: String,
    pub queries: Vec<String>,
    pub poll_interval: Duration,
    pub engine: EngineKind,
    pub engine_url: String,
    pub connect_retry: RetryPolicy,
    pub http_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub metrics_table: String,
    pub alerts_table: String,
    pub joined_table: String,
    pub join_bucket: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prometheus_url: "http://prometheus:9090".to_string(),
            queries: DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect(),
            poll_interval: Duration::from_millis(500),
            engine: EngineKind::Http,
            engine_url: "http://envoy:10000".to_string(),
            connect_retry: RetryPolicy::default(),
            http_timeout: Duration::from_secs(10),
            host: "0.0.0.0".to_string(),
            port: 5000,
            metrics_table: METRICS_TABLE.to_string(),
            alerts_table: ALERTS_TABLE.to_string(),
            joined_table: JOINED_TABLE.to_string(),
            join_bucket: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup; unset or unparseable
    /// values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let queries = lookup("PROMHAVEN_QUERIES")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.queries);

        let connect_retry = RetryPolicy {
            max_attempts: parsed("PROMHAVEN_CONNECT_ATTEMPTS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.connect_retry.max_attempts),
            base_delay: parsed("PROMHAVEN_CONNECT_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_retry.base_delay),
            ..defaults.connect_retry
        };

        Self {
            prometheus_url: lookup("PROMHAVEN_PROMETHEUS_URL").unwrap_or(defaults.prometheus_url),
            queries,
            poll_interval: parsed("PROMHAVEN_POLL_INTERVAL_MS")
                .map(|ms| Duration::from_millis(ms).max(MIN_POLL_INTERVAL))
                .unwrap_or(defaults.poll_interval),
            engine: lookup("PROMHAVEN_ENGINE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.engine),
            engine_url: lookup("PROMHAVEN_ENGINE_URL").unwrap_or(defaults.engine_url),
            connect_retry,
            http_timeout: parsed("PROMHAVEN_HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            host: lookup("PROMHAVEN_HOST").unwrap_or(defaults.host),
            port: lookup("PROMHAVEN_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            join_bucket: parsed("PROMHAVEN_JOIN_BUCKET_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.join_bucket),
            ..defaults
        }
    }

    /// Log the effective configuration
    pub fn log(&self) {
        tracing::info!("promhaven configuration:");
        tracing::info!("  Prometheus: {}", self.prometheus_url);
        tracing::info!("  Queries: {}", self.queries.join(", "));
        tracing::info!("  Poll interval: {:?}", self.poll_interval);
        tracing::info!("  Engine: {:?} @ {}", self.engine, self.engine_url);
        tracing::info!(
            "  Connect retry: {} attempts, base delay {:?}",
            self.connect_retry.max_attempts,
            self.connect_retry.base_delay
        );
        tracing::info!("  Webhook listener: {}:{}", self.host, self.port);
    }
}
