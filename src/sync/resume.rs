//! Resume-point decision.
//!
//! For each sync unit the coordinator picks where to start fetching, in
//! strict precedence order:
//!
//! 1. An operator-supplied resume token. A token naming another unit skips
//!    the current unit outright (zero requests); a matching token is
//!    consumed and its epoch used verbatim.
//! 2. Incremental mode: the sink's last written sample for the unit's FIRST
//!    requested data type, plus one second.
//! 3. A fixed lookback from now.
//! 4. Zero, meaning "full history available upstream".
//!
//! The token is a caller-owned `Option` mutated in place, so the
//! consume-once rule is an explicit state transition rather than hidden
//! module state.

use crate::sink::{SampleSink, SinkResult};
use crate::sync::session::SyncUnit;
use crate::{DeviceId, ModuleId};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Where a unit's sync should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    /// Do not sync this unit at all in this run.
    Skip,
    /// Start fetching at this unix-seconds timestamp (0 = full history).
    StartAt(i64),
}

/// Resume token parse errors
#[derive(Debug, thiserror::Error)]
pub enum TokenParseError {
    /// Not of the form `device/module/epoch`.
    #[error("resume token must be device/module/epochSeconds")]
    Format,
    /// The epoch field is not an integer.
    #[error("invalid epoch in resume token: {0}")]
    Epoch(String),
}

/// Operator-supplied single-use resume override.
///
/// Textual form is `device/module/epochSeconds`, with an empty module field
/// for a device-level unit. The same form is logged after every consumed
/// page, so a failed run can be restarted exactly where it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeToken {
    /// Device the token applies to.
    pub device: DeviceId,
    /// Module the token applies to; `None` for a device-level unit.
    pub module: Option<ModuleId>,
    /// Unix seconds to resume from.
    pub epoch: i64,
}

impl ResumeToken {
    /// Build a token.
    pub fn new(device: DeviceId, module: Option<ModuleId>, epoch: i64) -> Self {
        Self {
            device,
            module,
            epoch,
        }
    }

    /// Whether this token names the given unit.
    pub fn matches(&self, unit: &SyncUnit) -> bool {
        self.device == unit.device && self.module == unit.module
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let module = self.module.as_ref().map(ModuleId::as_str).unwrap_or("");
        write!(f, "{}/{}/{}", self.device, module, self.epoch)
    }
}

impl FromStr for ResumeToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let (device, module, epoch) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(device), Some(module), Some(epoch), None) if !device.is_empty() => {
                (device, module, epoch)
            }
            _ => return Err(TokenParseError::Format),
        };
        let epoch = epoch
            .parse::<i64>()
            .map_err(|_| TokenParseError::Epoch(epoch.to_string()))?;
        let module = (!module.is_empty()).then(|| ModuleId::new(module));
        Ok(ResumeToken::new(DeviceId::new(device), module, epoch))
    }
}

/// Computes the starting timestamp for each sync unit.
#[derive(Debug, Clone)]
pub struct ResumeCoordinator {
    /// Whether to probe the sink for the last written sample.
    pub incremental: bool,
    /// How far back the incremental probe searches.
    pub incremental_lookback: Duration,
    /// Fixed fallback window; zero disables it in favor of full history.
    pub lookback: Duration,
}

impl ResumeCoordinator {
    /// Decide where `unit` should start, consuming `token` if it matches.
    ///
    /// `now` is the caller's wall clock (unix seconds); injected so the
    /// decision is reproducible in tests.
    pub async fn resolve_start<K>(
        &self,
        token: &mut Option<ResumeToken>,
        unit: &SyncUnit,
        sink: &K,
        now: i64,
    ) -> SinkResult<StartDecision>
    where
        K: SampleSink + ?Sized + Sync,
    {
        if let Some(pending) = token {
            if !pending.matches(unit) {
                // The token names some other unit; it stays set so that
                // unit can still claim it later in the run.
                return Ok(StartDecision::Skip);
            }
            let epoch = pending.epoch;
            *token = None;
            debug!(%unit, epoch, "resume token consumed");
            return Ok(StartDecision::StartAt(epoch));
        }

        if self.incremental {
            // Only the first requested data type is probed; the result
            // stands in for the whole unit.
            if let Some(first) = unit.data_types.first() {
                if let Some(last) = sink
                    .last_timestamp(unit.unit_id(), *first, self.incremental_lookback)
                    .await?
                {
                    debug!(%unit, last, "sink reports last written sample");
                    return Ok(StartDecision::StartAt(last + 1));
                }
            }
        }

        if !self.lookback.is_zero() {
            return Ok(StartDecision::StartAt(now - self.lookback.as_secs() as i64));
        }

        Ok(StartDecision::StartAt(0))
    }
}
