//! Detector configuration.
//!
//! Loaded with Figment from, in increasing priority:
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables prefixed with `DAQ_DETECTOR_`
//!
//! ```toml
//! name = "det"
//! unknown_presets = "reject"   # ignore | warn | reject
//! dispatch = "concurrent"      # sequential | concurrent
//! forecast_max_age = "500ms"
//! ```
//!
//! Example override: `DAQ_DETECTOR_DISPATCH=concurrent`.

use crate::preset::PresetPolicy;
use daq_core::error::AppResult;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for detector overrides.
pub const ENV_PREFIX: &str = "DAQ_DETECTOR_";

/// How a tier of channel calls is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One channel after the other, in declared order.
    #[default]
    Sequential,
    /// All channels of a tier at once, joined before the next tier starts.
    Concurrent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Detector name used in logs.
    pub name: String,
    /// Handling of preset names that match no channel.
    pub unknown_presets: PresetPolicy,
    /// Dispatch of start/stop/pause/resume calls within a tier.
    pub dispatch: DispatchMode,
    /// Oldest cached channel value the forecast accepts.
    #[serde(with = "humantime_serde")]
    pub forecast_max_age: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            name: "det".to_string(),
            unknown_presets: PresetPolicy::default(),
            dispatch: DispatchMode::default(),
            forecast_max_age: Duration::from_secs(1),
        }
    }
}

impl DetectorConfig {
    /// Figment with defaults, the TOML file at `path`, then environment overrides.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(DetectorConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load defaults, overlay the TOML file at `path`, then the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }
}
