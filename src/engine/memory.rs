//! In-process engine that records everything it receives

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Engine, EngineError, Row, TableSchema};

#[derive(Debug, Default)]
struct Inner {
    schemas: HashMap<String, TableSchema>,
    rows: HashMap<String, Vec<Row>>,
    scripts: Vec<String>,
}

/// Engine backed by process memory.
///
/// Rows are validated against the registered schema exactly like a remote
/// table writer would, then kept in append order.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    inner: Mutex<Inner>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows appended to a table, in append order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner
            .lock()
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Scripts executed so far, in execution order
    pub fn scripts(&self) -> Vec<String> {
        self.inner.lock().scripts.clone()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn create_table(&self, schema: &TableSchema) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        inner.schemas.insert(schema.name.clone(), schema.clone());
        inner.rows.entry(schema.name.clone()).or_default();
        tracing::debug!(table = %schema.name, "Table created");
        Ok(())
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        let schema = inner
            .schemas
            .get(table)
            .ok_or_else(|| EngineError::TableNotFound(table.to_string()))?;
        schema.validate(&row)?;

        tracing::debug!(table = %table, row = ?row, "Row appended");
        inner.rows.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    async fn run_script(&self, script: &str) -> Result<(), EngineError> {
        tracing::debug!(bytes = script.len(), "Script executed");
        self.inner.lock().scripts.push(script.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DataType, Value};

    fn schema() -> TableSchema {
        TableSchema::new("events")
            .with_column("Name", DataType::String)
            .with_column("Value", DataType::Double)
    }

    #[tokio::test]
    async fn test_append_keeps_order() {
        let engine = MemoryEngine::new();
        engine.create_table(&schema()).await.unwrap();

        for i in 0..3 {
            engine
                .append_row("events", vec![Value::from("x"), Value::from(i as f64)])
                .await
                .unwrap();
        }

        let values: Vec<f64> = engine
            .rows("events")
            .iter()
            .map(|r| r[1].as_f64().unwrap())
            .collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_append_to_unknown_table() {
        let engine = MemoryEngine::new();
        let err = engine
            .append_row("missing", vec![Value::from("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_append_rejects_bad_row() {
        let engine = MemoryEngine::new();
        engine.create_table(&schema()).await.unwrap();

        let result = engine
            .append_row("events", vec![Value::from(1.0), Value::from("x")])
            .await;
        tokio_test::assert_err!(result);
        assert!(engine.rows("events").is_empty());
    }

    #[tokio::test]
    async fn test_scripts_recorded() {
        let engine = MemoryEngine::new();
        engine.run_script("a = 1").await.unwrap();
        engine.run_script("b = 2").await.unwrap();
        assert_eq!(engine.scripts(), vec!["a = 1", "b = 2"]);
    }
}
