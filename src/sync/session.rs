//! Per-unit sync orchestration.
//!
//! A session walks its units strictly one at a time: resolve the start
//! decision, then drive the measure pager, forwarding every page to the
//! sink one data type at a time. Any pager or sink error is fatal to the
//! run; pages already handed to the sink stay committed, and the logged
//! resume token lets the next invocation pick up exactly where this one
//! stopped.

use crate::api::pagination::{MeasurePager, MeasureQuery, MeasureSource};
use crate::api::protocol::Station;
use crate::sink::{SampleSink, UnitLabels};
use crate::sync::config::DEFAULT_INCREMENTAL_LOOKBACK;
use crate::sync::resume::{ResumeCoordinator, ResumeToken, StartDecision};
use crate::sync::SyncError;
use crate::{DataType, DeviceId, ModuleId};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One (device, optional module) pair with its fixed, ordered data types
/// and its sink label set.
#[derive(Debug, Clone)]
pub struct SyncUnit {
    /// Station the unit belongs to.
    pub device: DeviceId,
    /// Module, or `None` for the station's own sensors.
    pub module: Option<ModuleId>,
    /// Data types to fetch, in request order, fixed for the whole run.
    pub data_types: Vec<DataType>,
    /// Labels attached to every exported sample of this unit.
    pub labels: UnitLabels,
}

impl SyncUnit {
    /// Build a unit.
    pub fn new(
        device: DeviceId,
        module: Option<ModuleId>,
        data_types: Vec<DataType>,
        labels: UnitLabels,
    ) -> Self {
        Self {
            device,
            module,
            data_types,
            labels,
        }
    }

    /// The identifier the sink files this unit under: the module id when
    /// present, otherwise the device id.
    pub fn unit_id(&self) -> &str {
        match &self.module {
            Some(module) => module.as_str(),
            None => self.device.as_str(),
        }
    }
}

impl fmt::Display for SyncUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}/{}", self.device, module),
            None => write!(f, "{}", self.device),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Probe the sink for the last written sample before fetching.
    pub incremental: bool,
    /// How far back the incremental probe searches.
    pub incremental_lookback: Duration,
    /// Fixed fallback window from now; zero means full history.
    pub lookback: Duration,
    /// Operator-supplied resume override, consumed at most once per run.
    pub resume: Option<ResumeToken>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            incremental: true,
            incremental_lookback: DEFAULT_INCREMENTAL_LOOKBACK,
            lookback: Duration::ZERO,
            resume: None,
        }
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncStats {
    /// Units fully synced.
    pub units_synced: u64,
    /// Units bypassed by a non-matching resume token.
    pub units_skipped: u64,
    /// Pages consumed.
    pub pages: u64,
    /// Points exported.
    pub points: u64,
}

/// Drives the sync of a list of units against one source and one sink.
pub struct SyncSession<'a, S, K> {
    source: &'a S,
    sink: &'a mut K,
    coordinator: ResumeCoordinator,
    resume: Option<ResumeToken>,
    stats: SyncStats,
}

impl<'a, S, K> SyncSession<'a, S, K>
where
    S: MeasureSource,
    K: SampleSink + Sync,
{
    /// Create a session.
    pub fn new(source: &'a S, sink: &'a mut K, options: SyncOptions) -> Self {
        Self {
            source,
            sink,
            coordinator: ResumeCoordinator {
                incremental: options.incremental,
                incremental_lookback: options.incremental_lookback,
                lookback: options.lookback,
            },
            resume: options.resume,
            stats: SyncStats::default(),
        }
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Sync every unit in order, then flush the sink.
    pub async fn run(&mut self, units: &[SyncUnit]) -> Result<(), SyncError> {
        for unit in units {
            self.sync_unit(unit).await?;
        }
        self.sink.flush().await?;
        info!(
            units_synced = self.stats.units_synced,
            units_skipped = self.stats.units_skipped,
            pages = self.stats.pages,
            points = self.stats.points,
            "sync complete"
        );
        Ok(())
    }

    /// Sync a single unit.
    pub async fn sync_unit(&mut self, unit: &SyncUnit) -> Result<(), SyncError> {
        let now = chrono::Utc::now().timestamp();
        let decision = self
            .coordinator
            .resolve_start(&mut self.resume, unit, &*self.sink, now)
            .await?;

        let start = match decision {
            StartDecision::Skip => {
                debug!(%unit, "resume token names another unit, skipping");
                self.stats.units_skipped += 1;
                return Ok(());
            }
            StartDecision::StartAt(start) => start,
        };

        info!(%unit, start, data_types = unit.data_types.len(), "syncing unit");
        let query = MeasureQuery::new(
            unit.device.clone(),
            unit.module.clone(),
            unit.data_types.clone(),
            start,
        );
        let mut pager = MeasurePager::new(self.source, query);

        while let Some(page) = pager.next_page().await? {
            for (index, data_type) in unit.data_types.iter().enumerate() {
                let series: Vec<(i64, f64)> = page
                    .points
                    .iter()
                    .map(|point| (point.time, point.values[index]))
                    .collect();
                self.sink.append(&unit.labels, *data_type, &series).await?;
            }
            self.stats.pages += 1;
            self.stats.points += page.points.len() as u64;

            // Logged so an operator can restart a failed run with --resume.
            let token = ResumeToken::new(unit.device.clone(), unit.module.clone(), page.next_begin);
            debug!(resume_token = %token, points = page.points.len(), "page committed");
        }

        self.stats.units_synced += 1;
        Ok(())
    }
}

/// Derive the unit list for a set of discovered stations: one device-level
/// unit per station plus one unit per attached module. Units reporting no
/// known data types are dropped.
pub fn units_for_stations(stations: &[Station]) -> Vec<SyncUnit> {
    let mut units = Vec::new();
    for station in stations {
        let data_types = station.known_data_types();
        if data_types.is_empty() {
            warn!(device = %station.id, "station reports no known data types, skipping");
        } else {
            units.push(SyncUnit::new(
                station.id.clone(),
                None,
                data_types,
                UnitLabels {
                    dev_id: station.id.to_string(),
                    home_id: station.home_id.clone(),
                    home_name: station.home_name.clone(),
                    module_name: station.name.clone(),
                    module_type: station.station_type.clone(),
                },
            ));
        }

        for module in &station.modules {
            let data_types = module.known_data_types();
            if data_types.is_empty() {
                warn!(module = %module.id, "module reports no known data types, skipping");
                continue;
            }
            units.push(SyncUnit::new(
                station.id.clone(),
                Some(module.id.clone()),
                data_types,
                UnitLabels {
                    dev_id: module.id.to_string(),
                    home_id: station.home_id.clone(),
                    home_name: station.home_name.clone(),
                    module_name: module.name.clone(),
                    module_type: module.module_type.clone(),
                },
            ));
        }
    }
    units
}
