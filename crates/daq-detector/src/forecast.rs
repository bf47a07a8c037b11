//! Live projection of a running measurement's final reading.
//!
//! The master closest to its own preselection is the one that will end the
//! measurement, so its completion fraction bounds how far every channel can
//! still progress. Dividing each current value by that one fraction gives a
//! consistent end-of-measurement estimate for all channels at once.
//!
//! ```text
//! master:  25 / 100  → fraction 0.25
//! slave:    1        → forecast 1 / 0.25 = 4
//! ```
//!
//! Reads go through the cached path (`max_age` from
//! [`DetectorConfig::forecast_max_age`](crate::config::DetectorConfig)), so
//! polling the forecast does not add hardware traffic to a running count.

use crate::detector::{DetectorSnapshot, MultiChannelDetector};
use anyhow::Result;
use daq_core::data::ValueInfo;
use std::sync::Arc;
use std::time::Duration;

/// Read-only device projecting a detector's reading at completion.
#[derive(Debug, Clone)]
pub struct DetectorForecast {
    detector: Arc<MultiChannelDetector>,
    max_age: Duration,
}

impl DetectorForecast {
    pub fn new(detector: Arc<MultiChannelDetector>) -> Self {
        let max_age = detector.config().forecast_max_age;
        Self { detector, max_age }
    }

    /// Accept cached values up to `max_age` old instead of the configured age.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn detector(&self) -> &Arc<MultiChannelDetector> {
        &self.detector
    }

    /// Projected final values, in the detector's declared order.
    pub async fn read(&self) -> Result<Vec<f64>> {
        let snapshot = self.detector.snapshot(Some(self.max_age)).await?;
        Ok(project(&snapshot))
    }

    /// Same labels and order as the detector.
    pub fn value_info(&self) -> Vec<ValueInfo> {
        self.detector.value_info()
    }

    /// Progress of the most advanced master, clamped to `[0, 1]`.
    ///
    /// `0` while nothing is known (no masters, or no master counted yet).
    pub async fn completion_fraction(&self) -> Result<f64> {
        let snapshot = self.detector.snapshot(Some(self.max_age)).await?;
        Ok(raw_fraction(&snapshot).map_or(0.0, |f| f.clamp(0.0, 1.0)))
    }

    /// Linear estimate of the measuring time still needed, given the time
    /// already spent.
    ///
    /// `None` while nothing is known yet.
    pub async fn remaining_time(&self, elapsed: Duration) -> Result<Option<Duration>> {
        let snapshot = self.detector.snapshot(Some(self.max_age)).await?;
        Ok(remaining(raw_fraction(&snapshot), elapsed))
    }
}

/// Largest `value / preselection` over masters with a positive preselection.
///
/// `None` when no master qualifies or the result is zero or not finite.
fn raw_fraction(snapshot: &DetectorSnapshot) -> Option<f64> {
    snapshot
        .masters
        .iter()
        .filter(|m| m.preselection > 0.0)
        .map(|m| m.value / m.preselection)
        .filter(|f| f.is_finite())
        .fold(None, |best: Option<f64>, f| {
            Some(best.map_or(f, |b| b.max(f)))
        })
        .filter(|f| *f > 0.0)
}

fn project(snapshot: &DetectorSnapshot) -> Vec<f64> {
    let fraction = raw_fraction(snapshot).unwrap_or(1.0);
    snapshot.values.iter().map(|v| v / fraction).collect()
}

fn remaining(fraction: Option<f64>, elapsed: Duration) -> Option<Duration> {
    let fraction = fraction?;
    if fraction >= 1.0 {
        return Some(Duration::ZERO);
    }
    Duration::try_from_secs_f64(elapsed.as_secs_f64() * (1.0 / fraction - 1.0)).ok()
}
