//! `daq-detector`
//!
//! Coordination of counting channels into one detector device.
//!
//! - [`preset`]: preset names, channel roles and the routing table
//! - [`detector`]: [`MultiChannelDetector`], the master/slave coordinator
//! - [`forecast`]: [`DetectorForecast`], live projection of the final reading
//! - [`config`]: [`DetectorConfig`], Figment-loaded detector settings

pub mod config;
pub mod detector;
pub mod forecast;
pub mod preset;

pub use config::{DetectorConfig, DispatchMode};
pub use detector::{DetectorBuilder, DetectorSnapshot, MasterProgress, MultiChannelDetector};
pub use forecast::DetectorForecast;
pub use preset::{preset_map, ChannelRole, PresetKey, PresetMap, PresetPolicy, PresetRoutingTable};
