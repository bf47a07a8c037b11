//! Preset names and the routing table that maps them onto channels.
//!
//! Callers configure a measurement with named thresholds such as
//! `{"t": 10.0, "mon1": 5000.0}`. The set of names a detector understands is
//! a closed set derived from its channel roles:
//!
//! | role          | preset names        |
//! |---------------|---------------------|
//! | timer         | `t`, `time`         |
//! | n-th monitor  | `mon<n>`            |
//! | n-th counter  | `det<n>`, `ctr<n>`  |
//!
//! Indices are 1-based and count channels of the same role in declaration
//! order. The table is built once when the detector is built and never
//! changes afterwards.

use daq_core::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Preset values keyed by preset name.
pub type PresetMap = BTreeMap<String, f64>;

/// Build a [`PresetMap`] from `(name, value)` pairs.
///
/// ```
/// use daq_detector::preset::preset_map;
///
/// let presets = preset_map([("t", 10.0), ("mon1", 5000.0)]);
/// assert_eq!(presets["mon1"], 5000.0);
/// ```
pub fn preset_map<I, K>(pairs: I) -> PresetMap
where
    I: IntoIterator<Item = (K, f64)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Role a channel plays inside a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    Timer,
    Monitor,
    Counter,
}

impl std::fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelRole::Timer => write!(f, "timer"),
            ChannelRole::Monitor => write!(f, "monitor"),
            ChannelRole::Counter => write!(f, "counter"),
        }
    }
}

/// A recognized preset, identified by channel role and 1-based index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PresetKey {
    Time,
    Monitor(usize),
    Counter(usize),
}

impl PresetKey {
    /// Every name this key answers to; the first one is canonical.
    pub fn names(&self) -> Vec<String> {
        match self {
            PresetKey::Time => vec!["t".to_string(), "time".to_string()],
            PresetKey::Monitor(n) => vec![format!("mon{n}")],
            PresetKey::Counter(n) => vec![format!("det{n}"), format!("ctr{n}")],
        }
    }
}

impl std::fmt::Display for PresetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PresetKey::Time => write!(f, "t"),
            PresetKey::Monitor(n) => write!(f, "mon{n}"),
            PresetKey::Counter(n) => write!(f, "det{n}"),
        }
    }
}

impl FromStr for PresetKey {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "t" || s == "time" {
            return Ok(PresetKey::Time);
        }
        let (prefix, digits) = s
            .find(|c: char| c.is_ascii_digit())
            .map(|pos| s.split_at(pos))
            .ok_or_else(|| DaqError::InvalidPresetName(s.to_string()))?;
        let index = digits
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| DaqError::InvalidPresetName(s.to_string()))?;
        match prefix {
            "mon" => Ok(PresetKey::Monitor(index)),
            "det" | "ctr" => Ok(PresetKey::Counter(index)),
            _ => Err(DaqError::InvalidPresetName(s.to_string())),
        }
    }
}

/// What to do with preset names that match no channel of the detector.
///
/// Presets are often passed down unchanged from a higher-level device that
/// also understands names this detector does not; other times an unknown
/// name is simply a typo. The detector cannot tell which, so the choice is
/// left to configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetPolicy {
    /// Drop unknown names without a trace.
    Ignore,
    /// Drop unknown names and log a warning.
    #[default]
    Warn,
    /// Fail the whole preset assignment.
    Reject,
}

/// Immutable map from preset names to channel indices.
#[derive(Debug, Clone, Default)]
pub struct PresetRoutingTable {
    routes: BTreeMap<String, usize>,
    keys: BTreeMap<PresetKey, usize>,
}

impl PresetRoutingTable {
    /// Build the table for channels with the given roles, in declared order.
    pub fn from_roles(roles: &[ChannelRole]) -> AppResult<Self> {
        let mut table = Self::default();
        let (mut timers, mut monitors, mut counters) = (0usize, 0usize, 0usize);

        for (index, role) in roles.iter().enumerate() {
            let key = match role {
                ChannelRole::Timer => {
                    timers += 1;
                    if timers > 1 {
                        return Err(DaqError::Configuration(
                            "a detector takes at most one timer".to_string(),
                        ));
                    }
                    PresetKey::Time
                }
                ChannelRole::Monitor => {
                    monitors += 1;
                    PresetKey::Monitor(monitors)
                }
                ChannelRole::Counter => {
                    counters += 1;
                    PresetKey::Counter(counters)
                }
            };
            for name in key.names() {
                table.routes.insert(name, index);
            }
            table.keys.insert(key, index);
        }

        Ok(table)
    }

    /// Channel index for a preset name.
    pub fn route(&self, name: &str) -> Option<usize> {
        self.routes.get(name).copied()
    }

    /// Channel index for a preset key.
    /// Preset key owning a channel index.
    pub fn key_of(&self, index: usize) -> Option<PresetKey> {
        self.keys
            .iter()
            .find_map(|(key, i)| (*i == index).then_some(*key))
    }

    /// All recognized preset names.
    pub fn names(&self) -> BTreeSet<String> {
        self.routes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Translate a preset map into `(channel index, preselection)` pairs.
    ///
    /// Unknown names are handled according to `policy`. When two aliases of
    /// the same channel are given (`t` and `time`), the one sorting last wins.
    pub fn resolve(&self, presets: &PresetMap, policy: PresetPolicy) -> AppResult<Vec<(usize, f64)>> {
        let mut assignments: BTreeMap<usize, f64> = BTreeMap::new();

        for (name, value) in presets {
            match self.route(name) {
                Some(index) => {
                    assignments.insert(index, *value);
                }
                None => match policy {
                    PresetPolicy::Ignore => {}
                    PresetPolicy::Warn => {
                        // A well-formed name means a channel of that role is missing.
                        let well_formed = name.parse::<PresetKey>().is_ok();
                        tracing::warn!(
                            preset = %name,
                            value,
                            well_formed,
                            "Ignoring unrecognized preset"
                        );
                    }
                    PresetPolicy::Reject => {
                        return Err(DaqError::UnrecognizedPreset {
                            key: name.clone(),
                            known: self.names().into_iter().collect(),
                        });
                    }
                },
            }
        }

        Ok(assignments.into_iter().collect())
    }
}
