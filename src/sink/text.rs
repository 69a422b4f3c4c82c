//! Prometheus text exposition to a writer.
//!
//! Renders each appended batch as one gauge family:
//!
//! ```text
//! # TYPE netatmo_temperature gauge
//! netatmo_temperature{dev_id="...",home_id="...",...} 21.5 1700000000000
//! ```
//!
//! Timestamps are emitted in milliseconds, as the exposition format
//! requires. This sink cannot answer the incremental probe; it always
//! reports "no sample".

use crate::sink::{SampleSink, SinkError, SinkResult, UnitLabels};
use crate::DataType;
use async_trait::async_trait;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

/// Writes exposition text to any [`Write`] destination.
pub struct TextExport<W: Write + Send> {
    writer: W,
}

impl TextExport<BufWriter<io::Stdout>> {
    /// Export to standard output.
    pub fn stdout() -> Self {
        TextExport::new(BufWriter::new(io::stdout()))
    }
}

impl<W: Write + Send> TextExport<W> {
    /// Export to the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consume the exporter and hand back the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Render one gauge family for a batch of samples.
pub(crate) fn render_family(
    out: &mut String,
    labels: &UnitLabels,
    data_type: DataType,
    points: &[(i64, f64)],
) {
    let name = data_type.metric_name();
    out.push_str("# TYPE ");
    out.push_str(name);
    out.push_str(" gauge\n");

    let mut label_text = String::new();
    for (i, (key, value)) in labels.pairs().iter().enumerate() {
        if i > 0 {
            label_text.push(',');
        }
        label_text.push_str(key);
        label_text.push_str("=\"");
        label_text.push_str(&escape_label_value(value));
        label_text.push('"');
    }

    for (time, value) in points {
        out.push_str(name);
        out.push('{');
        out.push_str(&label_text);
        out.push_str("} ");
        out.push_str(&format_value(*value));
        out.push(' ');
        out.push_str(&(time * 1000).to_string());
        out.push('\n');
    }
}

fn format_value(value: f64) -> String {
    // Display drops a trailing ".0"; both spellings are valid exposition.
    value.to_string()
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[async_trait]
impl<W: Write + Send + Sync> SampleSink for TextExport<W> {
    async fn append(
        &mut self,
        labels: &UnitLabels,
        data_type: DataType,
        points: &[(i64, f64)],
    ) -> SinkResult<()> {
        if points.is_empty() {
            return Ok(());
        }
        let mut out = String::new();
        render_family(&mut out, labels, data_type, points);
        self.writer
            .write_all(out.as_bytes())
            .map_err(|e| SinkError::Io(e.to_string()))
    }

    async fn last_timestamp(
        &self,
        _unit_id: &str,
        _data_type: DataType,
        _lookback: Duration,
    ) -> SinkResult<Option<i64>> {
        Ok(None)
    }

    async fn flush(&mut self) -> SinkResult<()> {
        self.writer.flush().map_err(|e| SinkError::Io(e.to_string()))
    }
}
