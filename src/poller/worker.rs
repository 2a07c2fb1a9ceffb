use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;

use super::prometheus::{try_parse_vector, PrometheusClient};
use super::sample::MetricSample;
use crate::engine::Engine;

/// Background worker that streams query results into the metric sink
pub struct MetricsPoller {
    client: PrometheusClient,
    engine: Arc<dyn Engine>,
    table: String,
    queries: Vec<String>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl MetricsPoller {
    pub fn new(
        client: PrometheusClient,
        engine: Arc<dyn Engine>,
        table: impl Into<String>,
        queries: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            engine,
            table: table.into(),
            queries,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background worker
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!(
                queries = self.queries.len(),
                url = %self.client.query_url(),
                "Metrics poller started with interval {:?}",
                self.interval
            );

            while self.running.load(Ordering::SeqCst) {
                let appended = self.sweep().await;
                tracing::trace!(appended, "Poll sweep finished");

                time::sleep(self.interval).await;
            }

            tracing::info!("Metrics poller stopped");
        })
    }

    /// Stop the worker after the current sweep
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if worker is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run every configured query once and append the results.
    ///
    /// Returns the number of rows appended. Failures are logged per query
    /// (or per row) and never abort the sweep.
    pub async fn sweep(&self) -> usize {
        let mut appended = 0;

        for query in &self.queries {
            let body = match self.client.query(query).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Prometheus query failed");
                    continue;
                }
            };

            let samples = match try_parse_vector(&body) {
                Ok(samples) => samples,
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Ignoring malformed query response");
                    continue;
                }
            };

            for sample in samples {
                let sample = MetricSample::new(query, sample, Utc::now());
                match self.engine.append_row(&self.table, sample.to_row()).await {
                    Ok(()) => appended += 1,
                    Err(e) => {
                        tracing::error!(
                            query = %query,
                            table = %self.table,
                            error = %e,
                            "Failed to append metric sample"
                        );
                    }
                }
            }
        }

        appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::poller::sample::{metrics_schema, METRICS_TABLE};
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn fake_prometheus(
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        match params.get("query").map(String::as_str) {
            Some("up") => Ok(Json(json!({
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [
                        {"metric": {"job": "a", "instance": "b"}, "value": [1700000000, "1"]}
                    ]
                }
            }))),
            Some("two") => Ok(Json(json!({
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [
                        {"metric": {"job": "j", "instance": "i1"}, "value": [1700000001, "2.5"]},
                        {"metric": {"job": "j", "instance": "i2"}, "value": [1700000001, "3.5"]}
                    ]
                }
            }))),
            Some("range") => Ok(Json(json!({
                "status": "success",
                "data": {"resultType": "matrix", "result": []}
            }))),
            _ => Err(StatusCode::BAD_REQUEST),
        }
    }

    async fn spawn_prometheus() -> String {
        let app = Router::new().route("/api/v1/query", get(fake_prometheus));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn make_poller(queries: &[&str]) -> (Arc<MetricsPoller>, Arc<MemoryEngine>) {
        let url = spawn_prometheus().await;
        let engine = Arc::new(MemoryEngine::new());
        engine
            .create_table(&metrics_schema(METRICS_TABLE))
            .await
            .unwrap();

        let poller = MetricsPoller::new(
            PrometheusClient::new(&url, Duration::from_secs(5)).unwrap(),
            Arc::clone(&engine) as Arc<dyn Engine>,
            METRICS_TABLE,
            queries.iter().map(|q| q.to_string()).collect(),
            Duration::from_millis(10),
        );
        (Arc::new(poller), engine)
    }

    #[tokio::test]
    async fn test_sweep_appends_one_sample() {
        let (poller, engine) = make_poller(&["up"]).await;

        let appended = poller.sweep().await;
        assert_eq!(appended, 1);

        let rows = engine.rows(METRICS_TABLE);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        match &row[0] {
            crate::engine::Value::DateTime(ts) => {
                assert_eq!(ts.timestamp_millis(), 1_700_000_000_000)
            }
            other => panic!("unexpected value: {:?}", other),
        }
        assert_eq!(row[1].as_str(), Some("up"));
        assert_eq!(row[2].as_str(), Some("a"));
        assert_eq!(row[3].as_str(), Some("b"));
        assert_eq!(row[4].as_f64(), Some(1.0));
    }

    #[tokio::test]
    async fn test_sweep_follows_query_then_result_order() {
        let (poller, engine) = make_poller(&["two", "up"]).await;

        assert_eq!(poller.sweep().await, 3);

        let instances: Vec<String> = engine
            .rows(METRICS_TABLE)
            .iter()
            .map(|r| r[3].as_str().unwrap().to_string())
            .collect();
        assert_eq!(instances, vec!["i1", "i2", "b"]);
    }

    #[tokio::test]
    async fn test_failed_and_non_vector_queries_are_skipped() {
        let (poller, engine) = make_poller(&["broken", "range", "up"]).await;

        assert_eq!(poller.sweep().await, 1);
        assert_eq!(engine.rows(METRICS_TABLE).len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_prometheus_does_not_halt() {
        let engine = Arc::new(MemoryEngine::new());
        engine
            .create_table(&metrics_schema(METRICS_TABLE))
            .await
            .unwrap();
        let poller = MetricsPoller::new(
            PrometheusClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap(),
            Arc::clone(&engine) as Arc<dyn Engine>,
            METRICS_TABLE,
            vec!["up".to_string()],
            Duration::from_millis(10),
        );

        assert_eq!(poller.sweep().await, 0);
        assert_eq!(poller.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (poller, engine) = make_poller(&["up"]).await;

        let handle = Arc::clone(&poller).start();
        assert!(poller.is_running());

        for _ in 0..200 {
            if engine.rows(METRICS_TABLE).len() >= 2 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert!(engine.rows(METRICS_TABLE).len() >= 2);

        poller.stop();
        assert!(!poller.is_running());
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
    }
}
