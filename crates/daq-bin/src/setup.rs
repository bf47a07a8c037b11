//! Setup files: detector settings plus the channels of one simulated card.
//!
//! ```toml
//! poll_interval = "200ms"
//!
//! [detector]
//! name = "det"
//! unknown_presets = "warn"
//!
//! [timer]
//! name = "timer"
//!
//! [[monitors]]
//! name = "mon1"
//! count_rate = 1000.0
//!
//! [[counters]]
//! name = "det1"
//! count_rate = 80.0
//! ```
//!
//! `DAQ_DETECTOR_*` environment variables override the `[detector]` table.

use anyhow::{Context, Result};
use daq_core::{Channel, DaqError};
use daq_detector::config::ENV_PREFIX;
use daq_detector::{DetectorConfig, MultiChannelDetector};
use daq_driver_mock::{CounterKind, MockCounter, MockCounterConfig, MockGate, MockTimer, MockTimerConfig};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub timer: Option<MockTimerConfig>,
    #[serde(default)]
    pub monitors: Vec<MockCounterConfig>,
    #[serde(default)]
    pub counters: Vec<MockCounterConfig>,
    /// Time between status polls while counting.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            timer: None,
            monitors: Vec::new(),
            counters: Vec::new(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl SetupConfig {
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(SetupConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).map(|key| format!("detector.{key}").into()))
    }

    /// Load a setup file. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DaqError::Configuration(format!(
                "setup file not found: {}",
                path.display()
            ))
            .into());
        }
        let setup: SetupConfig = Self::figment(path)
            .extract()
            .map_err(DaqError::from)
            .with_context(|| format!("failed to load setup {}", path.display()))?;
        setup.validate()?;
        Ok(setup)
    }

    fn validate(&self) -> Result<(), DaqError> {
        for counter in self.monitors.iter().chain(&self.counters) {
            if !(counter.count_rate.is_finite() && counter.count_rate > 0.0) {
                return Err(DaqError::Configuration(format!(
                    "channel '{}': count_rate must be positive, got {}",
                    counter.name, counter.count_rate
                )));
            }
        }
        if self.poll_interval.is_zero() {
            return Err(DaqError::Configuration(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the detector with every channel on one shared card gate.
    pub fn build_detector(&self) -> Result<Arc<MultiChannelDetector>> {
        let gate = Arc::new(MockGate::new());
        let mut builder = MultiChannelDetector::builder().config(self.detector.clone());

        if let Some(timer) = &self.timer {
            builder = builder.timer(Arc::new(MockTimer::from_config(timer, Some(gate.clone()))));
        }
        for monitor in &self.monitors {
            builder = builder.monitor(counter(monitor, CounterKind::Monitor, &gate));
        }
        for counter_config in &self.counters {
            builder = builder.counter(counter(counter_config, CounterKind::Counter, &gate));
        }

        Ok(Arc::new(builder.build()?))
    }
}

fn counter(config: &MockCounterConfig, kind: CounterKind, gate: &Arc<MockGate>) -> Arc<dyn Channel> {
    Arc::new(MockCounter::from_config(config, kind, Some(gate.clone())))
}
