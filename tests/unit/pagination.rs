//! Unit tests for the measure pager

use async_trait::async_trait;
use netatmo_sync::api::protocol::MeasureGroup;
use netatmo_sync::api::{ApiError, ApiResult, MeasurePager, MeasureQuery, MeasureSource};
use netatmo_sync::{DataType, DeviceId, ModuleId};
use std::sync::Mutex;

/// Serves a scripted sequence of pages and records every query it sees.
struct ScriptedSource {
    pages: Mutex<Vec<Vec<MeasureGroup>>>,
    queries: Mutex<Vec<Option<i64>>>,
}

impl ScriptedSource {
    fn new(pages: Vec<Vec<MeasureGroup>>) -> Self {
        Self {
            pages: Mutex::new(pages),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn fetch_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    fn cursors_seen(&self) -> Vec<Option<i64>> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeasureSource for ScriptedSource {
    async fn fetch_measure(&self, query: &MeasureQuery) -> ApiResult<Vec<MeasureGroup>> {
        self.queries.lock().unwrap().push(query.date_begin);
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(pages.remove(0))
        }
    }
}

fn group(beg_time: i64, step_time: i64, value: Vec<Vec<f64>>) -> MeasureGroup {
    MeasureGroup {
        beg_time,
        step_time,
        value,
    }
}

fn query(data_types: Vec<DataType>, start: i64) -> MeasureQuery {
    MeasureQuery::new(DeviceId::new("dev"), None, data_types, start)
}

#[tokio::test]
async fn walk_flattens_groups_and_advances_the_cursor() {
    let source = ScriptedSource::new(vec![vec![group(
        1000,
        300,
        vec![vec![20.0, 50.0], vec![21.0, 49.0]],
    )]]);
    let mut pager = MeasurePager::new(
        &source,
        query(vec![DataType::Temperature, DataType::Humidity], 0),
    );

    let page = pager.next_page().await.unwrap().unwrap();
    assert_eq!(page.points.len(), 2);
    assert_eq!(page.points[0].time, 1000);
    assert_eq!(page.points[0].values, vec![20.0, 50.0]);
    assert_eq!(page.points[1].time, 1300);
    assert_eq!(page.points[1].values, vec![21.0, 49.0]);
    assert_eq!(page.next_begin, 1301);

    assert!(pager.next_page().await.unwrap().is_none());
    // First request had no cursor; the second carried the advanced one.
    assert_eq!(source.cursors_seen(), vec![None, Some(1301)]);
}

#[tokio::test]
async fn walk_stops_on_the_first_empty_page_and_never_fetches_again() {
    let source = ScriptedSource::new(vec![vec![group(500, 60, vec![vec![10.0], vec![11.0]])]]);
    let mut pager = MeasurePager::new(&source, query(vec![DataType::Temperature], 0));

    let page = pager.next_page().await.unwrap().unwrap();
    assert_eq!(page.next_begin, 561);

    assert!(pager.next_page().await.unwrap().is_none());
    assert_eq!(source.fetch_count(), 2);

    // The walk is finished; further polls issue no requests.
    assert!(pager.next_page().await.unwrap().is_none());
    assert!(pager.next_page().await.unwrap().is_none());
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn cursors_are_monotonically_non_decreasing() {
    let source = ScriptedSource::new(vec![
        vec![group(100, 10, vec![vec![1.0], vec![2.0]])],
        vec![group(111, 10, vec![vec![3.0]])],
        vec![group(200, 10, vec![vec![4.0], vec![5.0], vec![6.0]])],
    ]);
    let mut pager = MeasurePager::new(&source, query(vec![DataType::Temperature], 50));

    let mut cursors = Vec::new();
    while let Some(page) = pager.next_page().await.unwrap() {
        cursors.push(page.next_begin);
    }
    assert_eq!(cursors, vec![111, 112, 221]);
    assert!(cursors.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn pages_without_value_rows_still_advance() {
    let source = ScriptedSource::new(vec![vec![group(700, 60, vec![])]]);
    let mut pager = MeasurePager::new(&source, query(vec![DataType::Temperature], 0));

    let page = pager.next_page().await.unwrap().unwrap();
    assert!(page.points.is_empty());
    assert_eq!(page.next_begin, 701);

    assert!(pager.next_page().await.unwrap().is_none());
    assert_eq!(source.cursors_seen(), vec![None, Some(701)]);
}

#[tokio::test]
async fn module_queries_carry_the_module_id() {
    let source = ScriptedSource::new(vec![]);
    let mut pager = MeasurePager::new(
        &source,
        MeasureQuery::new(
            DeviceId::new("dev"),
            Some(ModuleId::new("mod")),
            vec![DataType::Rain],
            42,
        ),
    );
    assert!(pager.next_page().await.unwrap().is_none());
    assert_eq!(source.cursors_seen(), vec![Some(42)]);
}

#[tokio::test]
async fn arity_mismatch_is_a_decode_error() {
    let source = ScriptedSource::new(vec![vec![group(100, 10, vec![vec![1.0, 2.0]])]]);
    let mut pager = MeasurePager::new(&source, query(vec![DataType::Temperature], 0));

    let err = pager.next_page().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

/// A source that never runs dry, for exercising the runaway safety valve.
struct BottomlessSource;

#[async_trait]
impl MeasureSource for BottomlessSource {
    async fn fetch_measure(&self, query: &MeasureQuery) -> ApiResult<Vec<MeasureGroup>> {
        let begin = query.date_begin.unwrap_or(0);
        Ok(vec![group(begin, 1, vec![vec![0.0]])])
    }
}

#[tokio::test]
async fn runaway_walks_trip_the_page_limit() {
    let source = BottomlessSource;
    let mut pager = MeasurePager::new(&source, query(vec![DataType::Temperature], 1));

    let mut pages = 0usize;
    let err = loop {
        match pager.next_page().await {
            Ok(Some(_)) => pages += 1,
            Ok(None) => panic!("bottomless source should never end cleanly"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, ApiError::PageLimit(_)));
    assert_eq!(pages, netatmo_sync::api::pagination::MAX_PAGES);
}
