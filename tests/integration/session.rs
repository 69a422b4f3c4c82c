//! Integration tests for the sync session
//!
//! Drive the full per-unit flow (resume decision, pagination, sink fan-out)
//! against a scripted measure source and an in-memory sink.

use async_trait::async_trait;
use netatmo_sync::api::protocol::MeasureGroup;
use netatmo_sync::api::{ApiResult, MeasureQuery, MeasureSource};
use netatmo_sync::sink::{SampleSink, SinkError, SinkResult, UnitLabels};
use netatmo_sync::sync::{ResumeToken, SyncError, SyncOptions, SyncSession, SyncUnit};
use netatmo_sync::{DataType, DeviceId, ModuleId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Serves scripted pages per device and records every query.
#[derive(Default)]
struct ScriptedSource {
    pages: Mutex<HashMap<String, Vec<Vec<MeasureGroup>>>>,
    queries: Mutex<Vec<(String, Option<i64>)>>,
}

impl ScriptedSource {
    fn with_pages(device: &str, pages: Vec<Vec<MeasureGroup>>) -> Self {
        let source = Self::default();
        source.pages.lock().unwrap().insert(device.into(), pages);
        source
    }

    fn fetch_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    fn queries_for(&self, device: &str) -> Vec<Option<i64>> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(dev, _)| dev == device)
            .map(|(_, begin)| *begin)
            .collect()
    }
}

#[async_trait]
impl MeasureSource for ScriptedSource {
    async fn fetch_measure(&self, query: &MeasureQuery) -> ApiResult<Vec<MeasureGroup>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.device.to_string(), query.date_begin));
        let mut pages = self.pages.lock().unwrap();
        match pages.get_mut(query.device.as_str()) {
            Some(script) if !script.is_empty() => Ok(script.remove(0)),
            _ => Ok(Vec::new()),
        }
    }
}

/// Records appended batches; optionally scripted to fail or to answer the
/// incremental probe.
#[derive(Default)]
struct MemorySink {
    appended: Vec<(String, DataType, Vec<(i64, f64)>)>,
    last_by_unit: HashMap<String, i64>,
    fail_appends: bool,
    flushes: usize,
}

#[async_trait]
impl SampleSink for MemorySink {
    async fn append(
        &mut self,
        labels: &UnitLabels,
        data_type: DataType,
        points: &[(i64, f64)],
    ) -> SinkResult<()> {
        if self.fail_appends {
            return Err(SinkError::Http("sink rejected the batch".into()));
        }
        self.appended
            .push((labels.dev_id.clone(), data_type, points.to_vec()));
        Ok(())
    }

    async fn last_timestamp(
        &self,
        unit_id: &str,
        _data_type: DataType,
        _lookback: Duration,
    ) -> SinkResult<Option<i64>> {
        Ok(self.last_by_unit.get(unit_id).copied())
    }

    async fn flush(&mut self) -> SinkResult<()> {
        self.flushes += 1;
        Ok(())
    }
}

fn group(beg_time: i64, step_time: i64, value: Vec<Vec<f64>>) -> MeasureGroup {
    MeasureGroup {
        beg_time,
        step_time,
        value,
    }
}

fn unit(device: &str, module: Option<&str>, data_types: Vec<DataType>) -> SyncUnit {
    SyncUnit::new(
        DeviceId::new(device),
        module.map(ModuleId::new),
        data_types,
        UnitLabels {
            dev_id: module.unwrap_or(device).to_string(),
            home_id: "home1".into(),
            home_name: "Home".into(),
            module_name: "unit".into(),
            module_type: "NAMain".into(),
        },
    )
}

fn full_history_options() -> SyncOptions {
    SyncOptions {
        incremental: false,
        incremental_lookback: Duration::from_secs(3600),
        lookback: Duration::ZERO,
        resume: None,
    }
}

#[tokio::test]
async fn full_history_walk_emits_every_point_exactly_once() {
    // One page of two samples, then an empty page: the run must emit
    // exactly two points and stop.
    let source = ScriptedSource::with_pages(
        "deviceD",
        vec![vec![group(500, 60, vec![vec![10.0], vec![11.0]])]],
    );
    let mut sink = MemorySink::default();

    let mut session = SyncSession::new(&source, &mut sink, full_history_options());
    session
        .run(&[unit("deviceD", None, vec![DataType::Temperature])])
        .await
        .unwrap();
    let stats = session.stats();

    assert_eq!(stats.units_synced, 1);
    assert_eq!(stats.pages, 1);
    assert_eq!(stats.points, 2);

    // Full history: the first request has no cursor, the second carries
    // last point + 1s.
    assert_eq!(source.queries_for("deviceD"), vec![None, Some(561)]);

    assert_eq!(sink.appended.len(), 1);
    let (dev_id, data_type, points) = &sink.appended[0];
    assert_eq!(dev_id, "deviceD");
    assert_eq!(*data_type, DataType::Temperature);
    assert_eq!(points, &vec![(500, 10.0), (560, 11.0)]);
    assert_eq!(sink.flushes, 1);
}

#[tokio::test]
async fn page_batches_fan_out_per_data_type_in_request_order() {
    let source = ScriptedSource::with_pages(
        "dev",
        vec![vec![group(1000, 300, vec![vec![20.0, 50.0], vec![21.0, 49.0]])]],
    );
    let mut sink = MemorySink::default();

    let mut session = SyncSession::new(&source, &mut sink, full_history_options());
    session
        .run(&[unit(
            "dev",
            None,
            vec![DataType::Temperature, DataType::Humidity],
        )])
        .await
        .unwrap();

    assert_eq!(sink.appended.len(), 2);
    assert_eq!(sink.appended[0].1, DataType::Temperature);
    assert_eq!(sink.appended[0].2, vec![(1000, 20.0), (1300, 21.0)]);
    assert_eq!(sink.appended[1].1, DataType::Humidity);
    assert_eq!(sink.appended[1].2, vec![(1000, 50.0), (1300, 49.0)]);
}

#[tokio::test]
async fn mismatched_resume_token_skips_the_unit_without_requests() {
    let source = ScriptedSource::default();
    let mut sink = MemorySink::default();

    let mut options = full_history_options();
    options.resume = Some(ResumeToken::new(
        DeviceId::new("other-device"),
        None,
        1_700_000_000,
    ));

    let mut session = SyncSession::new(&source, &mut sink, options);
    session
        .run(&[unit("deviceD", None, vec![DataType::Temperature])])
        .await
        .unwrap();
    let stats = session.stats();

    assert_eq!(stats.units_skipped, 1);
    assert_eq!(stats.units_synced, 0);
    assert_eq!(source.fetch_count(), 0);
    assert!(sink.appended.is_empty());
}

#[tokio::test]
async fn matching_resume_token_is_consumed_and_later_units_run_normally() {
    let source = ScriptedSource::default();
    let mut sink = MemorySink::default();
    // The sink knows a last sample for the second unit; with the token
    // already consumed, that unit must fall through to the incremental
    // probe.
    sink.last_by_unit.insert("devB".into(), 40_000);

    let mut options = full_history_options();
    options.incremental = true;
    options.resume = Some(ResumeToken::new(DeviceId::new("devA"), None, 1_700_000_000));

    let mut session = SyncSession::new(&source, &mut sink, options);
    session
        .run(&[
            unit("devA", None, vec![DataType::Temperature]),
            unit("devB", None, vec![DataType::Temperature]),
        ])
        .await
        .unwrap();

    // devA starts exactly at the token's epoch.
    assert_eq!(source.queries_for("devA"), vec![Some(1_700_000_000)]);
    // devB starts one second after its last written sample.
    assert_eq!(source.queries_for("devB"), vec![Some(40_001)]);
}

#[tokio::test]
async fn sink_failure_aborts_before_the_cursor_advances() {
    // Two pages are scripted; the sink rejects the very first batch, so
    // the second page must never be requested.
    let source = ScriptedSource::with_pages(
        "dev",
        vec![
            vec![group(100, 10, vec![vec![1.0]])],
            vec![group(200, 10, vec![vec![2.0]])],
        ],
    );
    let mut sink = MemorySink {
        fail_appends: true,
        ..MemorySink::default()
    };

    let mut session = SyncSession::new(&source, &mut sink, full_history_options());
    let err = session
        .run(&[unit("dev", None, vec![DataType::Temperature])])
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Sink(_)));
    assert_eq!(source.fetch_count(), 1);
    assert_eq!(session.stats().pages, 0);
}

#[tokio::test]
async fn module_units_query_with_their_module_id() {
    let source = ScriptedSource::default();
    let mut sink = MemorySink::default();
    // Incremental probe is keyed by the module id, not the device id.
    sink.last_by_unit.insert("mod1".into(), 9_999);

    let mut options = full_history_options();
    options.incremental = true;

    let mut session = SyncSession::new(&source, &mut sink, options);
    session
        .run(&[unit("dev", Some("mod1"), vec![DataType::Rain])])
        .await
        .unwrap();

    assert_eq!(source.queries_for("dev"), vec![Some(10_000)]);
}
