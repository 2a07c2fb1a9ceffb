use chrono::{DateTime, Utc};

use super::prometheus::InstantSample;
use crate::engine::{DataType, Row, TableSchema, Value};

/// Default name of the metric sink table
pub const METRICS_TABLE: &str = "prometheus_metrics";

/// Schema of the metric sink table
pub fn metrics_schema(table: &str) -> TableSchema {
    TableSchema::new(table)
        .with_column("PrometheusDateTime", DataType::DateTime)
        .with_column("PrometheusQuery", DataType::String)
        .with_column("Job", DataType::String)
        .with_column("Instance", DataType::String)
        .with_column("Value", DataType::Double)
        .with_column("MetricIngestDateTime", DataType::DateTime)
}

/// A metric value as written to the sink
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub job: String,
    pub instance: String,
    pub value: f64,
    pub ingested_at: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(query: &str, sample: InstantSample, ingested_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: sample.timestamp,
            query: query.to_string(),
            job: sample.job,
            instance: sample.instance,
            value: sample.value,
            ingested_at,
        }
    }

    /// Row in the column order of [`metrics_schema`]
    pub fn to_row(&self) -> Row {
        vec![
            Value::DateTime(self.timestamp),
            Value::String(self.query.clone()),
            Value::String(self.job.clone()),
            Value::String(self.instance.clone()),
            Value::Double(self.value),
            Value::DateTime(self.ingested_at),
        ]
    }
}
