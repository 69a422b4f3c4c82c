//! # Netatmo Sync Library
//!
//! Incrementally exports the full measurement history of Netatmo weather
//! stations into a metrics sink, resuming safely after interruption without
//! re-downloading or duplicating data.
//!
//! ## Features
//!
//! - **Rate Limiting**: Shared token bucket keeps requests inside the
//!   upstream quota, with prompt cancellation on shutdown
//! - **Incremental Sync**: Queries the sink for the last written sample and
//!   continues from there
//! - **Resume Tokens**: Operator-supplied `device/module/epoch` tokens skip
//!   straight back to where a failed run stopped
//! - **Paginated Fetch**: Walks the measurement API forward in time page by
//!   page, flattening step-encoded groups into ordered data points
//! - **Pluggable Sinks**: Prometheus text exposition to stdout, or push to a
//!   VictoriaMetrics-compatible endpoint
//!
//! ## Architecture
//!
//! - [`api`] - Upstream API client: throttled transport, OAuth credentials,
//!   wire protocol, paginated measure fetch
//! - [`sync`] - The sync engine: rate limiter, resume-point decision,
//!   per-unit session orchestration
//! - [`sink`] - Sample sinks: Prometheus text exposition and
//!   VictoriaMetrics push/query
//! - [`cli`] - Command-line commands (`sync`, `stations`)
//! - [`config`] - Credential/config persistence in the user config dir
//! - [`shutdown`] - Graceful shutdown coordination

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream API client and wire protocol
pub mod api;

/// CLI command implementations
pub mod cli;

/// Configuration and credential persistence
pub mod config;

/// Graceful shutdown coordination
pub mod shutdown;

/// Sample sinks
pub mod sink;

/// The sync engine
pub mod sync;

/// Sensor measurement kinds reported by stations and modules.
///
/// The set and order of data types requested for a sync unit is fixed for the
/// whole run; measure responses carry one value per requested type, in
/// request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum DataType {
    /// Air temperature
    Temperature,
    /// Relative humidity
    Humidity,
    /// Carbon dioxide concentration
    CO2,
    /// Barometric pressure
    Pressure,
    /// Sound level
    Noise,
    /// Rainfall
    Rain,
    /// Wind speed
    Wind,
}

impl DataType {
    /// All known data types, in upstream display order.
    pub const ALL: [DataType; 7] = [
        DataType::Temperature,
        DataType::Humidity,
        DataType::CO2,
        DataType::Pressure,
        DataType::Noise,
        DataType::Rain,
        DataType::Wind,
    ];

    /// The name used in upstream `type=` query parameters and in station
    /// discovery payloads.
    pub fn wire_name(&self) -> &'static str {
        match self {
            DataType::Temperature => "Temperature",
            DataType::Humidity => "Humidity",
            DataType::CO2 => "CO2",
            DataType::Pressure => "Pressure",
            DataType::Noise => "Noise",
            DataType::Rain => "Rain",
            DataType::Wind => "Wind",
        }
    }

    /// Physical unit, UCUM-style.
    pub fn unit(&self) -> &'static str {
        match self {
            DataType::Temperature => "Cel",
            DataType::Humidity => "%",
            DataType::CO2 => "[ppm]",
            DataType::Pressure => "mbar",
            DataType::Noise => "dB[SPL]",
            DataType::Rain => "mm",
            DataType::Wind => "km/h",
        }
    }

    /// The metric family name this data type is exported under.
    pub fn metric_name(&self) -> &'static str {
        match self {
            DataType::Temperature => "netatmo_temperature",
            DataType::Humidity => "netatmo_humidity",
            DataType::CO2 => "netatmo_co2",
            DataType::Pressure => "netatmo_pressure",
            DataType::Noise => "netatmo_noise",
            DataType::Rain => "netatmo_rain",
            DataType::Wind => "netatmo_wind",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Error returned when a data type name is not recognized.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown data type: {0}")]
pub struct UnknownDataType(pub String);

impl FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|dt| dt.wire_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownDataType(s.to_string()))
    }
}

/// Opaque identifier of a weather station (the base device).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a raw identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a sensor module attached to a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Wrap a raw identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One flattened measurement sample.
///
/// `values` carries one reading per requested [`DataType`], in request order;
/// every point in a page has the same arity as the request.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Sample time, unix seconds.
    pub time: i64,
    /// One value per requested data type.
    pub values: Vec<f64>,
}
