//! Wire protocol types for the upstream API.
//!
//! Responses arrive wrapped in an envelope: `{ "body": ..., "error": ... }`.
//! An `error` object is a failure even when the HTTP status is 200.

use crate::{DataType, DeviceId, ModuleId};
use serde::Deserialize;
use tracing::debug;

/// Generic response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Payload, shape depends on the endpoint.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Populated on upstream logical errors.
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

/// Upstream logical error carried inside a 200 response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    /// Upstream error code.
    pub code: i64,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// Body of the station discovery endpoint.
#[derive(Debug, Deserialize)]
pub struct StationsBody {
    /// Discovered base stations.
    #[serde(rename = "devices", default)]
    pub stations: Vec<Station>,
}

/// One base station and its attached modules.
#[derive(Debug, Clone, Deserialize)]
pub struct Station {
    /// Station identifier.
    #[serde(rename = "_id")]
    pub id: DeviceId,
    /// Hardware type, e.g. `NAMain`.
    #[serde(rename = "type", default)]
    pub station_type: String,
    /// User-assigned name.
    #[serde(rename = "module_name", default)]
    pub name: String,
    /// Firmware revision.
    #[serde(default)]
    pub firmware: i64,
    /// Whether the station was reachable at discovery time.
    #[serde(default)]
    pub reachable: bool,
    /// Home the station belongs to.
    #[serde(default)]
    pub home_id: String,
    /// Name of that home.
    #[serde(default)]
    pub home_name: String,
    /// Measurement kinds the station itself reports (raw wire names).
    #[serde(rename = "data_type", default)]
    pub data_types: Vec<String>,
    /// Attached sensor modules.
    #[serde(default)]
    pub modules: Vec<StationModule>,
}

/// A sensor module attached to a station.
#[derive(Debug, Clone, Deserialize)]
pub struct StationModule {
    /// Module identifier.
    #[serde(rename = "_id")]
    pub id: ModuleId,
    /// Hardware type, e.g. `NAModule1`.
    #[serde(rename = "type", default)]
    pub module_type: String,
    /// User-assigned name.
    #[serde(rename = "module_name", default)]
    pub name: String,
    /// Whether the module was reachable at discovery time.
    #[serde(default)]
    pub reachable: bool,
    /// Firmware revision.
    #[serde(default)]
    pub firmware: i64,
    /// Battery charge, percent.
    #[serde(default)]
    pub battery_percent: Option<i64>,
    /// Measurement kinds the module reports (raw wire names).
    #[serde(rename = "data_type", default)]
    pub data_types: Vec<String>,
}

/// One group of step-encoded samples from the measure endpoint.
///
/// With `optimize=true` the server returns groups of consecutive samples:
/// a start time, a step, and one value vector per step.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasureGroup {
    /// Time of the first sample in the group, unix seconds.
    pub beg_time: i64,
    /// Seconds between consecutive samples.
    #[serde(default)]
    pub step_time: i64,
    /// One inner vector per sample, one element per requested data type.
    #[serde(default)]
    pub value: Vec<Vec<f64>>,
}

/// Parse raw `data_type` names into known [`DataType`]s, dropping names this
/// client does not model.
pub fn known_data_types(raw: &[String]) -> Vec<DataType> {
    raw.iter()
        .filter_map(|name| match name.parse::<DataType>() {
            Ok(dt) => Some(dt),
            Err(_) => {
                debug!(name, "ignoring unrecognized data type");
                None
            }
        })
        .collect()
}

impl Station {
    /// The station's data types this client knows how to export.
    pub fn known_data_types(&self) -> Vec<DataType> {
        known_data_types(&self.data_types)
    }
}

impl StationModule {
    /// The module's data types this client knows how to export.
    pub fn known_data_types(&self) -> Vec<DataType> {
        known_data_types(&self.data_types)
    }
}
