//! Sample sinks.
//!
//! The sync engine only needs two capabilities from a sink: append a batch
//! of timestamped values for one data type, and report the last timestamp
//! already written for a unit (the incremental probe). Everything about the
//! wire format lives behind this boundary.

use crate::DataType;
use async_trait::async_trait;
use std::time::Duration;

pub mod text;
pub mod victoria;

pub use text::TextExport;
pub use victoria::VictoriaSink;

/// Sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// IO error while writing exposition text.
    #[error("IO error: {0}")]
    Io(String),

    /// HTTP failure pushing samples or querying the sink.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The sink's query API returned an unusable response.
    #[error("query error: {0}")]
    Query(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Label set identifying one sync unit in the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitLabels {
    /// Identifier of the unit: the module id for a module unit, otherwise
    /// the device id. Also the key the incremental probe matches on.
    pub dev_id: String,
    /// Home the unit belongs to.
    pub home_id: String,
    /// Name of that home.
    pub home_name: String,
    /// User-assigned name of the device or module.
    pub module_name: String,
    /// Hardware type of the device or module.
    pub module_type: String,
}

impl UnitLabels {
    /// Label pairs in a fixed, sorted order so exposition output is
    /// deterministic.
    pub fn pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("dev_id", &self.dev_id),
            ("home_id", &self.home_id),
            ("home_name", &self.home_name),
            ("module_name", &self.module_name),
            ("module_type", &self.module_type),
        ]
    }
}

/// Destination for exported samples.
#[async_trait]
pub trait SampleSink: Send {
    /// Append one batch of `(unix_seconds, value)` samples for `data_type`,
    /// labeled with the unit's label set. Called once per page per data
    /// type; safe to call repeatedly.
    async fn append(
        &mut self,
        labels: &UnitLabels,
        data_type: DataType,
        points: &[(i64, f64)],
    ) -> SinkResult<()>;

    /// The most recent timestamp already written for `unit_id` and
    /// `data_type`, looking back at most `lookback`. `None` when the sink
    /// holds no such sample (or cannot be queried, as for plain text
    /// output).
    async fn last_timestamp(
        &self,
        unit_id: &str,
        data_type: DataType,
        lookback: Duration,
    ) -> SinkResult<Option<i64>>;

    /// Flush buffered output. Called once at the end of a run.
    async fn flush(&mut self) -> SinkResult<()>;
}
