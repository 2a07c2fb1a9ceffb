use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

use super::retry::RetryPolicy;
use super::{Engine, EngineError, Row, TableSchema};

/// JSON-over-HTTP session with the external engine
#[derive(Debug)]
pub struct HttpEngine {
    http_client: reqwest::Client,
    base_url: String,
    /// Schemas of tables created through this session, used to name row cells
    schemas: RwLock<HashMap<String, TableSchema>>,
}

#[derive(Serialize)]
struct IngestRequest<'a> {
    table: &'a str,
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Serialize)]
struct ScriptRequest<'a> {
    script: &'a str,
}

impl HttpEngine {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            schemas: RwLock::new(HashMap::new()),
        })
    }

    /// Open a session, retrying while the engine is still coming up
    pub async fn connect(
        base_url: impl Into<String>,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<Self, EngineError> {
        let engine = Self::new(base_url, timeout)?;

        policy
            .retry("Connecting to engine", || engine.health_check())
            .await
            .map_err(|(attempts, e)| EngineError::ConnectFailed {
                attempts,
                last_error: e.to_string(),
            })?;

        tracing::info!(url = %engine.base_url, "Connected to engine");
        Ok(engine)
    }

    /// Check that the engine answers
    pub async fn health_check(&self) -> Result<(), EngineError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Self::check_status(response).await
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), EngineError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<(), EngineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(EngineError::Remote {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Engine for HttpEngine {
    async fn create_table(&self, schema: &TableSchema) -> Result<(), EngineError> {
        self.post("/tables", schema).await?;
        self.schemas
            .write()
            .insert(schema.name.clone(), schema.clone());

        tracing::info!(
            table = %schema.name,
            columns = schema.columns.len(),
            "Table created on engine"
        );
        Ok(())
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<(), EngineError> {
        let encoded = {
            let schemas = self.schemas.read();
            let schema = schemas
                .get(table)
                .ok_or_else(|| EngineError::TableNotFound(table.to_string()))?;
            schema.validate(&row)?;
            schema.row_to_json(&row)
        };

        self.post(
            "/ingest",
            &IngestRequest {
                table,
                rows: vec![encoded],
            },
        )
        .await
    }

    async fn run_script(&self, script: &str) -> Result<(), EngineError> {
        self.post("/script", &ScriptRequest { script }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DataType, Value};
    use axum::{
        extract::State,
        http::{StatusCode, Uri},
        routing::{get, post},
        Json, Router,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct FakeEngine {
        health_failures_left: AtomicU32,
        requests: Mutex<Vec<(String, serde_json::Value)>>,
    }

    async fn health(State(fake): State<Arc<FakeEngine>>) -> StatusCode {
        let left = fake.health_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            fake.health_failures_left.store(left - 1, Ordering::SeqCst);
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        }
    }

    async fn record(
        State(fake): State<Arc<FakeEngine>>,
        uri: Uri,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        fake.requests.lock().push((uri.path().to_string(), body));
        StatusCode::OK
    }

    async fn spawn_fake(fake: Arc<FakeEngine>) -> String {
        let app = Router::new()
            .route("/health", get(health))
            .route("/tables", post(record))
            .route("/ingest", post(record))
            .route("/script", post(record))
            .with_state(fake);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_delay: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_connect_retries_until_healthy() {
        let fake = Arc::new(FakeEngine::default());
        fake.health_failures_left.store(2, Ordering::SeqCst);
        let url = spawn_fake(Arc::clone(&fake)).await;

        let engine = HttpEngine::connect(url, Duration::from_secs(5), &fast_policy()).await;
        assert!(engine.is_ok());
        assert_eq!(fake.health_failures_left.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connect_gives_up() {
        let fake = Arc::new(FakeEngine::default());
        fake.health_failures_left.store(100, Ordering::SeqCst);
        let url = spawn_fake(fake).await;

        let err = HttpEngine::connect(url, Duration::from_secs(5), &fast_policy())
            .await
            .unwrap_err();
        match err {
            EngineError::ConnectFailed { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_table_row_and_script_requests() {
        let fake = Arc::new(FakeEngine::default());
        let url = spawn_fake(Arc::clone(&fake)).await;
        let engine = HttpEngine::new(url, Duration::from_secs(5)).unwrap();

        let schema = TableSchema::new("metrics")
            .with_column("Job", DataType::String)
            .with_column("Value", DataType::Double);
        engine.create_table(&schema).await.unwrap();
        engine
            .append_row("metrics", vec![Value::from("node"), Value::from(3.5)])
            .await
            .unwrap();
        engine.run_script("x = 1").await.unwrap();

        let requests = fake.requests.lock().clone();
        assert_eq!(requests.len(), 3);

        assert_eq!(requests[0].0, "/tables");
        assert_eq!(requests[0].1["name"], "metrics");
        assert_eq!(requests[0].1["columns"][1]["type"], "double");

        assert_eq!(requests[1].0, "/ingest");
        assert_eq!(requests[1].1["table"], "metrics");
        assert_eq!(requests[1].1["rows"][0]["Job"], "node");
        assert_eq!(requests[1].1["rows"][0]["Value"], 3.5);

        assert_eq!(requests[2].0, "/script");
        assert_eq!(requests[2].1["script"], "x = 1");
    }

    #[tokio::test]
    async fn test_append_to_unknown_table_is_local_error() {
        let engine = HttpEngine::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = engine
            .append_row("nope", vec![Value::from("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_remote_error_status() {
        let app = Router::new().route(
            "/script",
            post(|| async { (StatusCode::BAD_REQUEST, "syntax error") }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let engine = HttpEngine::new(format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let err = engine.run_script("bad(").await.unwrap_err();
        match err {
            EngineError::Remote { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "syntax error");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
