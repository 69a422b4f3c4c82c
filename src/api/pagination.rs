//! Paginated measure fetch.
//!
//! The measure endpoint returns step-encoded groups in time order. The pager
//! walks the endpoint forward from a starting timestamp: each page is
//! flattened into ordered data points, the cursor advances to one second
//! past the last point, and the walk ends on the first empty page.
//!
//! The pager is an explicit iterator ([`MeasurePager::next_page`] with an
//! end sentinel) rather than a callback, so a consumer failure is a
//! first-class stop: the caller simply stops pulling and the cursor is never
//! advanced past unconsumed data.

use crate::api::protocol::MeasureGroup;
use crate::api::{ApiError, ApiResult};
use crate::{DataPoint, DataType, DeviceId, ModuleId};
use async_trait::async_trait;
use tracing::debug;

/// Safety valve against a server that never returns an empty page.
pub const MAX_PAGES: usize = 10_000;

/// Query state for one measure walk.
#[derive(Debug, Clone)]
pub struct MeasureQuery {
    /// Station to query.
    pub device: DeviceId,
    /// Module to query, or the station itself when absent.
    pub module: Option<ModuleId>,
    /// Requested data types; response vectors follow this order.
    pub data_types: Vec<DataType>,
    /// Cursor: next timestamp to request, unix seconds. `None` means
    /// "earliest available".
    pub date_begin: Option<i64>,
}

impl MeasureQuery {
    /// Build a query starting at `start` (0 means full history).
    pub fn new(
        device: DeviceId,
        module: Option<ModuleId>,
        data_types: Vec<DataType>,
        start: i64,
    ) -> Self {
        Self {
            device,
            module,
            data_types,
            date_begin: (start != 0).then_some(start),
        }
    }

    /// Render the query parameters for the measure endpoint.
    ///
    /// Requests maximum resolution (`scale=max`) in the compact format
    /// (`optimize=true`); `date_begin` is omitted when starting from the
    /// earliest available sample.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("device_id", self.device.to_string())];
        if let Some(module) = &self.module {
            params.push(("module_id", module.to_string()));
        }
        params.push(("scale", "max".to_string()));
        let type_csv = self
            .data_types
            .iter()
            .map(DataType::wire_name)
            .collect::<Vec<_>>()
            .join(",");
        params.push(("type", type_csv));
        params.push(("optimize", "true".to_string()));
        params.push(("real_time", "true".to_string()));
        if let Some(begin) = self.date_begin {
            params.push(("date_begin", begin.to_string()));
        }
        params
    }
}

/// Fetches one page of measure groups for a query.
///
/// The seam between the pager and the HTTP client; tests drive the pager
/// with scripted pages through this trait.
#[async_trait]
pub trait MeasureSource: Send + Sync {
    /// Fetch the groups for the query's current cursor.
    async fn fetch_measure(&self, query: &MeasureQuery) -> ApiResult<Vec<MeasureGroup>>;
}

/// One flattened page.
#[derive(Debug, Clone)]
pub struct MeasurePage {
    /// Time-ordered points, one value per requested data type each.
    pub points: Vec<DataPoint>,
    /// The cursor after this page: `last point time + 1` second. This is
    /// also the epoch a resume token for the next page would carry.
    pub next_begin: i64,
}

/// Walks the measure endpoint page by page.
pub struct MeasurePager<'a, S: ?Sized> {
    source: &'a S,
    query: MeasureQuery,
    pages_fetched: usize,
    done: bool,
}

impl<'a, S: MeasureSource + ?Sized> MeasurePager<'a, S> {
    /// Create a pager over `source` for the given query.
    pub fn new(source: &'a S, query: MeasureQuery) -> Self {
        Self {
            source,
            query,
            pages_fetched: 0,
            done: false,
        }
    }

    /// Fetch and flatten the next page.
    ///
    /// Returns `Ok(None)` once a fetched page is empty; after that no
    /// further requests are issued. Page N+1's query depends on page N's
    /// last point, so pages are strictly sequential.
    pub async fn next_page(&mut self) -> ApiResult<Option<MeasurePage>> {
        if self.done {
            return Ok(None);
        }
        if self.pages_fetched >= MAX_PAGES {
            self.done = true;
            return Err(ApiError::PageLimit(MAX_PAGES));
        }

        let groups = self.source.fetch_measure(&self.query).await?;
        self.pages_fetched += 1;

        if groups.is_empty() {
            debug!(pages = self.pages_fetched, "measure walk complete");
            self.done = true;
            return Ok(None);
        }

        let points = flatten_groups(&groups, self.query.data_types.len())?;
        let next_begin = match points.last() {
            Some(last) => last.time + 1,
            // Groups without value rows carry no points; still advance past
            // the last group so the walk cannot spin in place.
            None => groups.last().map(|g| g.beg_time).unwrap_or_default() + 1,
        };

        debug!(
            page = self.pages_fetched,
            points = points.len(),
            next_begin,
            "fetched measure page"
        );

        self.query.date_begin = Some(next_begin);
        Ok(Some(MeasurePage { points, next_begin }))
    }
}

/// Expand step-encoded groups into a flat, time-ordered point sequence.
///
/// A group `{beg_time, step_time, value}` yields one point per inner vector
/// at `beg_time`, `beg_time + step_time`, and so on. Every inner vector must
/// have exactly `arity` elements (one per requested data type).
pub fn flatten_groups(groups: &[MeasureGroup], arity: usize) -> ApiResult<Vec<DataPoint>> {
    let mut points = Vec::with_capacity(groups.iter().map(|g| g.value.len()).sum());
    for group in groups {
        let mut time = group.beg_time;
        for row in &group.value {
            if row.len() != arity {
                return Err(ApiError::Decode(format!(
                    "measure row at {time} has {} values, expected {arity}",
                    row.len()
                )));
            }
            points.push(DataPoint {
                time,
                values: row.clone(),
            });
            time += group.step_time;
        }
    }
    Ok(points)
}
