//! Prometheus instant-query client and response parsing

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use super::PollError;

/// Path of the instant query endpoint, relative to the Prometheus base URL
pub const QUERY_PATH: &str = "/api/v1/query";

/// Client for the Prometheus HTTP API
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http_client: reqwest::Client,
    query_url: String,
}

impl PrometheusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PollError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PollError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            query_url: format!("{}{}", base_url.trim_end_matches('/'), QUERY_PATH),
        })
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    /// Run an instant query and return the raw JSON body
    pub async fn query(&self, expr: &str) -> Result<serde_json::Value, PollError> {
        let response = self
            .http_client
            .get(&self.query_url)
            .query(&[("query", expr)])
            .send()
            .await
            .map_err(|e| PollError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PollError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PollError::Deserialization(e.to_string()))
    }
}

/// One labeled scalar taken from a vector result
#[derive(Debug, Clone, PartialEq)]
pub struct InstantSample {
    pub timestamp: DateTime<Utc>,
    pub job: String,
    pub instance: String,
    pub value: f64,
}

#[derive(Deserialize)]
struct QueryResponse {
    data: Option<QueryData>,
}

#[derive(Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: Option<String>,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Deserialize)]
struct VectorEntry {
    metric: EntryLabels,
    value: (f64, String),
}

#[derive(Deserialize)]
struct EntryLabels {
    job: String,
    instance: String,
}

/// Extract samples from an instant query response.
///
/// Anything that is not a well-formed vector result yields no samples.
pub fn parse_vector_response(body: &serde_json::Value) -> Vec<InstantSample> {
    try_parse_vector(body).unwrap_or_default()
}

/// Like [`parse_vector_response`], but reports why a malformed response was
/// rejected. A well-formed response of another result type is `Ok(vec![])`.
pub fn try_parse_vector(body: &serde_json::Value) -> Result<Vec<InstantSample>, PollError> {
    let response = QueryResponse::deserialize(body)
        .map_err(|e| PollError::Deserialization(e.to_string()))?;

    let data = match response.data {
        Some(data) => data,
        None => return Ok(Vec::new()),
    };
    if data.result_type.as_deref() != Some("vector") {
        return Ok(Vec::new());
    }

    let entries = Vec::<VectorEntry>::deserialize(&data.result)
        .map_err(|e| PollError::Deserialization(e.to_string()))?;

    entries.into_iter().map(VectorEntry::into_sample).collect()
}

impl VectorEntry {
    fn into_sample(self) -> Result<InstantSample, PollError> {
        let (seconds, raw_value) = self.value;
        let millis = (seconds * 1000.0) as i64;
        let timestamp = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| PollError::Deserialization(format!("timestamp out of range: {}", seconds)))?;
        let value = raw_value
            .parse::<f64>()
            .map_err(|_| PollError::Deserialization(format!("not a number: {:?}", raw_value)))?;

        Ok(InstantSample {
            timestamp,
            job: self.metric.job,
            instance: self.metric.instance,
            value,
        })
    }
}
