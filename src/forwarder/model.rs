//! Alertmanager webhook payloads and the alert rows derived from them

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::engine::{DataType, Row, TableSchema, Value};

/// Default name of the alert sink table
pub const ALERTS_TABLE: &str = "prometheus_alerts";

/// Schema of the alert sink table
pub fn alerts_schema(table: &str) -> TableSchema {
    TableSchema::new(table)
        .with_column("PrometheusDateTime", DataType::DateTime)
        .with_column("Job", DataType::String)
        .with_column("Instance", DataType::String)
        .with_column("AlertIdentifier", DataType::String)
        .with_column("Status", DataType::String)
        .with_column("AlertIngestDateTime", DataType::DateTime)
}

/// Webhook body. Entries are kept raw so that one bad alert does not
/// reject the alerts before it.
#[derive(Debug, Deserialize)]
pub struct AlertBatch {
    pub alerts: Vec<serde_json::Value>,
}

/// One alert entry; fields Alertmanager sends beyond these are ignored
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub status: String,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl AlertStatus {
    pub fn parse(s: &str) -> Result<Self, PayloadError> {
        match s {
            "firing" => Ok(AlertStatus::Firing),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(PayloadError::UnknownStatus(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rewrite `2024-01-01T00:00:00.000Z` as `2024-01-01T00:00:00.000 UTC`.
///
/// Purely textual: the input is assumed to already be UTC.
pub fn engine_timestamp(raw: &str) -> Result<String, PayloadError> {
    raw.strip_suffix('Z')
        .map(|stem| format!("{} UTC", stem))
        .ok_or_else(|| PayloadError::InvalidTimestamp(raw.to_string()))
}

fn parse_engine_timestamp(formatted: &str) -> Result<DateTime<Utc>, PayloadError> {
    let stem = formatted.strip_suffix(" UTC").unwrap_or(formatted);
    NaiveDateTime::parse_from_str(stem, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| PayloadError::InvalidTimestamp(formatted.to_string()))
}

/// An alert as written to the sink
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    /// Start time for firing alerts, end time for resolved ones, in engine form
    pub timestamp: String,
    pub timestamp_utc: DateTime<Utc>,
    pub job: String,
    pub instance: String,
    pub alert_identifier: String,
    pub status: AlertStatus,
    pub ingested_at: DateTime<Utc>,
}

impl AlertEvent {
    /// Build an event from a raw webhook entry
    pub fn from_json(
        entry: &serde_json::Value,
        ingested_at: DateTime<Utc>,
    ) -> Result<Self, PayloadError> {
        let payload = AlertPayload::deserialize(entry)
            .map_err(|e| PayloadError::Malformed(e.to_string()))?;
        Self::from_payload(&payload, ingested_at)
    }

    pub fn from_payload(
        payload: &AlertPayload,
        ingested_at: DateTime<Utc>,
    ) -> Result<Self, PayloadError> {
        let status = AlertStatus::parse(&payload.status)?;

        let raw_timestamp = match status {
            AlertStatus::Firing => payload
                .starts_at
                .as_deref()
                .ok_or(PayloadError::MissingField("startsAt"))?,
            AlertStatus::Resolved => payload
                .ends_at
                .as_deref()
                .ok_or(PayloadError::MissingField("endsAt"))?,
        };
        let timestamp = engine_timestamp(raw_timestamp)?;
        let timestamp_utc = parse_engine_timestamp(&timestamp)?;

        let label = |name: &str| {
            payload
                .labels
                .get(name)
                .cloned()
                .ok_or_else(|| PayloadError::MissingLabel(name.to_string()))
        };

        Ok(Self {
            timestamp,
            timestamp_utc,
            job: label("job")?,
            instance: label("instance")?,
            alert_identifier: label("alertname")?,
            status,
            ingested_at,
        })
    }

    /// Row in the column order of [`alerts_schema`]
    pub fn to_row(&self) -> Row {
        vec![
            Value::DateTime(self.timestamp_utc),
            Value::String(self.job.clone()),
            Value::String(self.instance.clone()),
            Value::String(self.alert_identifier.clone()),
            Value::String(self.status.as_str().to_string()),
            Value::DateTime(self.ingested_at),
        ]
    }
}

/// Errors in a single webhook alert entry
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Malformed alert: {0}")]
    Malformed(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Missing label: {0}")]
    MissingLabel(String),

    #[error("Unknown alert status: {0:?}")]
    UnknownStatus(String),

    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
}
