//! VictoriaMetrics-compatible remote sink.
//!
//! Samples are rendered as Prometheus exposition text and pushed in batches
//! to `/api/v1/import/prometheus`. The incremental probe runs an instant
//! query `timestamp(<metric>[<lookback>])` against `/api/v1/query` and picks
//! the result vector entry whose `dev_id` label matches the unit.

use crate::sink::text::render_family;
use crate::sink::{SampleSink, SinkError, SinkResult, UnitLabels};
use crate::DataType;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Buffered exposition text is pushed once it grows past this size.
const FLUSH_THRESHOLD_BYTES: usize = 1 << 20;

/// Pushes samples to a VictoriaMetrics-compatible endpoint and answers the
/// incremental probe from it.
pub struct VictoriaSink {
    http: reqwest::Client,
    base_url: String,
    buffer: String,
}

impl VictoriaSink {
    /// Create a sink for `host:port` (plain HTTP, as for a local ingester).
    pub fn new(dest: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("http://{dest}"),
            buffer: String::new(),
        }
    }

    async fn push_buffer(&mut self) -> SinkResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let body = std::mem::take(&mut self.buffer);
        let url = format!("{}/api/v1/import/prometheus", self.base_url);
        debug!(bytes = body.len(), "pushing exposition batch");

        let response = self
            .http
            .post(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Http(format!(
                "import returned status {}: {body}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SampleSink for VictoriaSink {
    async fn append(
        &mut self,
        labels: &UnitLabels,
        data_type: DataType,
        points: &[(i64, f64)],
    ) -> SinkResult<()> {
        if points.is_empty() {
            return Ok(());
        }
        render_family(&mut self.buffer, labels, data_type, points);
        if self.buffer.len() >= FLUSH_THRESHOLD_BYTES {
            self.push_buffer().await?;
        }
        Ok(())
    }

    async fn last_timestamp(
        &self,
        unit_id: &str,
        data_type: DataType,
        lookback: Duration,
    ) -> SinkResult<Option<i64>> {
        let url = format!("{}/api/v1/query", self.base_url);
        let query = format!(
            "timestamp({}[{}s])",
            data_type.metric_name(),
            lookback.as_secs()
        );
        let now = chrono::Utc::now().timestamp();

        let response = self
            .http
            .get(&url)
            .query(&[("query", query.as_str()), ("time", &now.to_string())])
            .send()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Query(format!(
                "query returned status {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| SinkError::Query(e.to_string()))?;
        last_timestamp_in_response(&parsed, unit_id)
    }

    async fn flush(&mut self) -> SinkResult<()> {
        self.push_buffer().await
    }
}

/// Instant-query response shape (Prometheus HTTP API).
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType", default)]
    result_type: String,
    #[serde(default)]
    result: Vec<VectorSample>,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    /// `[evaluation_time, "value"]`
    value: (f64, String),
}

/// Pick the sample for `unit_id` out of a query response.
///
/// The queried expression is `timestamp(...)`, so the sample VALUE is the
/// last written timestamp in unix seconds.
pub(crate) fn last_timestamp_in_response(
    response: &QueryResponse,
    unit_id: &str,
) -> SinkResult<Option<i64>> {
    if response.status != "success" {
        return Err(SinkError::Query(format!(
            "query status {}",
            response.status
        )));
    }
    let data = match &response.data {
        Some(data) => data,
        None => return Ok(None),
    };
    if data.result_type != "vector" {
        return Err(SinkError::Query(format!(
            "unexpected result type {}",
            data.result_type
        )));
    }

    for sample in &data.result {
        if sample.metric.get("dev_id").map(String::as_str) == Some(unit_id) {
            let seconds = sample
                .value
                .1
                .parse::<f64>()
                .map_err(|e| SinkError::Query(format!("sample value: {e}")))?;
            return Ok(Some(seconds as i64));
        }
    }
    Ok(None)
}
