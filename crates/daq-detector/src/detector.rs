//! MultiChannelDetector - one measurable device made of many channels
//!
//! Combines an optional timer, any number of monitors and any number of
//! counters into a detector with a single start/stop/pause/resume lifecycle
//! and a single composite reading.
//!
//! # Masters and Slaves
//!
//! Every preset assigned through [`MultiChannelDetector::set_preset`] turns
//! its channel into a *master*: a channel in preselection mode whose
//! threshold ends the measurement. All other channels are *slaves* that
//! count alongside.
//!
//! ```text
//!            start()                         is_completed()
//!   ┌──────────────────────┐        ┌──────────────────────────────┐
//!   │ 1. stop()            │        │ any master completed?        │
//!   │ 2. set_preset(map)   │        │   (first to finish wins)     │
//!   │ 3. start all slaves  │──────▶ │ no masters → vacuously true  │
//!   │ 4. start all masters │        └──────────────────────────────┘
//!   └──────────────────────┘
//! ```
//!
//! Slaves start first so that every slave already counts when the gating
//! master begins; their values then cover exactly the gated interval.
//!
//! # Concurrency
//!
//! Method entry is serialized by one async mutex per detector. With
//! [`DispatchMode::Concurrent`] the calls inside one tier run concurrently,
//! but the master tier never begins before the slave tier has returned.
//!
//! # Example
//!
//! ```rust,ignore
//! let detector = MultiChannelDetector::builder()
//!     .timer(timer)
//!     .monitor(monitor)
//!     .counter(counter)
//!     .build()?;
//!
//! detector.start(Some(&preset_map([("t", 10.0)]))).await?;
//! while !detector.is_completed().await? {
//!     tokio::time::sleep(Duration::from_millis(100)).await;
//! }
//! let reading = detector.read(None).await?; // [t, mon1, det1]
//! ```

use crate::config::{DetectorConfig, DispatchMode};
use crate::preset::{ChannelRole, PresetKey, PresetMap, PresetRoutingTable};
use anyhow::Result;
use daq_core::capabilities::{Channel, ChannelState, ChannelStatus};
use daq_core::data::ValueInfo;
use daq_core::error::{AppResult, DaqError};
use futures::future::{join_all, BoxFuture};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A channel together with the role it was attached under.
struct AttachedChannel {
    role: ChannelRole,
    channel: Arc<dyn Channel>,
}

/// Master/slave split of the channel list, as indices in declared order.
///
/// Read from the channels' master flags on every call, never cached.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Partition {
    masters: Vec<usize>,
    slaves: Vec<usize>,
}

impl Partition {
    fn derive(channels: &[AttachedChannel]) -> Self {
        let (masters, slaves): (Vec<usize>, Vec<usize>) = (0..channels.len())
            .partition(|&i| channels[i].channel.params().is_master());
        Self { masters, slaves }
    }
}

/// Progress of one master, as seen by a single [`MultiChannelDetector::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterProgress {
    /// Position of the master in the declared channel order.
    pub index: usize,
    pub value: f64,
    pub preselection: f64,
}

/// All channel values plus master progress, read under one lock.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectorSnapshot {
    pub values: Vec<f64>,
    pub masters: Vec<MasterProgress>,
}

/// Builder for [`MultiChannelDetector`].
///
/// Channels are stored in the order timer, monitors, counters regardless of
/// the order the builder methods are called in.
#[derive(Default)]
pub struct DetectorBuilder {
    config: DetectorConfig,
    name: Option<String>,
    timers: Vec<Arc<dyn Channel>>,
    monitors: Vec<Arc<dyn Channel>>,
    counters: Vec<Arc<dyn Channel>>,
}

impl DetectorBuilder {
    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the name from the config.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn timer(mut self, channel: Arc<dyn Channel>) -> Self {
        self.timers.push(channel);
        self
    }

    pub fn monitor(mut self, channel: Arc<dyn Channel>) -> Self {
        self.monitors.push(channel);
        self
    }

    pub fn counter(mut self, channel: Arc<dyn Channel>) -> Self {
        self.counters.push(channel);
        self
    }

    /// Validate the channel set and build the routing table.
    pub fn build(self) -> AppResult<MultiChannelDetector> {
        let mut config = self.config;
        if let Some(name) = self.name {
            config.name = name;
        }

        let channels: Vec<AttachedChannel> = self
            .timers
            .into_iter()
            .map(|channel| AttachedChannel {
                role: ChannelRole::Timer,
                channel,
            })
            .chain(self.monitors.into_iter().map(|channel| AttachedChannel {
                role: ChannelRole::Monitor,
                channel,
            }))
            .chain(self.counters.into_iter().map(|channel| AttachedChannel {
                role: ChannelRole::Counter,
                channel,
            }))
            .collect();

        if channels.is_empty() {
            return Err(DaqError::Configuration(format!(
                "detector '{}' has no channels",
                config.name
            )));
        }

        let mut seen = HashSet::new();
        for attached in &channels {
            if !seen.insert(attached.channel.name()) {
                return Err(DaqError::Configuration(format!(
                    "detector '{}': duplicate channel name '{}'",
                    config.name,
                    attached.channel.name()
                )));
            }
        }

        let roles: Vec<ChannelRole> = channels.iter().map(|c| c.role).collect();
        let routes = PresetRoutingTable::from_roles(&roles)?;

        info!(
            detector = %config.name,
            channels = channels.len(),
            presets = ?routes.names(),
            "Built multi-channel detector"
        );

        Ok(MultiChannelDetector {
            config,
            channels,
            routes,
            entry: Mutex::new(()),
        })
    }
}

/// Detector composed of a timer, monitors and counters.
pub struct MultiChannelDetector {
    config: DetectorConfig,
    /// Declared order: timer, monitors, counters. Never changes.
    channels: Vec<AttachedChannel>,
    routes: PresetRoutingTable,
    /// Serializes method entry.
    entry: Mutex<()>,
}

impl std::fmt::Debug for MultiChannelDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiChannelDetector")
            .field("name", &self.config.name)
            .field(
                "channels",
                &self.channels.iter().map(|c| c.channel.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl MultiChannelDetector {
    pub fn builder() -> DetectorBuilder {
        DetectorBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Attached channels in declared order.
    pub fn channels(&self) -> impl Iterator<Item = &Arc<dyn Channel>> {
        self.channels.iter().map(|c| &c.channel)
    }

    /// Channel that a preset name routes to.
    pub fn channel_for(&self, preset: &str) -> Option<&Arc<dyn Channel>> {
        self.routes.route(preset).map(|i| &self.channels[i].channel)
    }

    /// Role of each channel, in declared order.
    pub fn roles(&self) -> Vec<ChannelRole> {
        self.channels.iter().map(|c| c.role).collect()
    }

    /// Preset key owning the channel with the given name.
    pub fn preset_key_of(&self, channel_name: &str) -> Option<PresetKey> {
        self.channels
            .iter()
            .position(|c| c.channel.name() == channel_name)
            .and_then(|i| self.routes.key_of(i))
    }

    // =========================================================================
    // Presets
    // =========================================================================

    /// Assign preselections, which redraws the master/slave split.
    ///
    /// Every current master reverts to a normal slave first; then each
    /// recognized key makes its channel a master with that preselection.
    pub async fn set_preset(&self, presets: &PresetMap) -> Result<()> {
        let _entry = self.entry.lock().await;
        self.apply_presets(presets)
    }

    fn apply_presets(&self, presets: &PresetMap) -> Result<()> {
        // Resolve before touching any channel so a rejected map changes nothing.
        let assignments = self.routes.resolve(presets, self.config.unknown_presets)?;

        for attached in &self.channels {
            let params = attached.channel.params();
            if params.is_master() {
                params.release();
            }
        }
        for (index, preselection) in assignments {
            self.channels[index].channel.params().assign_preset(preselection);
        }

        let partition = self.partition();
        debug!(
            detector = %self.config.name,
            masters = ?self.names_of(&partition.masters),
            slaves = ?self.names_of(&partition.slaves),
            "Presets assigned"
        );
        Ok(())
    }

    /// Recognized preset names.
    pub fn preset_info(&self) -> BTreeSet<String> {
        self.routes.names()
    }

    /// Names of the current masters, in declared order.
    pub async fn masters(&self) -> Vec<String> {
        let _entry = self.entry.lock().await;
        self.names_of(&self.partition().masters)
    }

    /// Names of the current slaves, in declared order.
    pub async fn slaves(&self) -> Vec<String> {
        let _entry = self.entry.lock().await;
        self.names_of(&self.partition().slaves)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start a measurement, optionally with new presets.
    ///
    /// A failure partway through leaves already started channels running;
    /// call [`Self::stop`] or [`Self::reset`] to clean up.
    pub async fn start(&self, presets: Option<&PresetMap>) -> Result<()> {
        let _entry = self.entry.lock().await;

        self.stop_masters(&self.partition()).await?;

        if let Some(presets) = presets.filter(|p| !p.is_empty()) {
            self.apply_presets(presets)?;
        }
        let partition = self.partition();

        if partition.masters.is_empty() {
            warn!(
                detector = %self.config.name,
                "Counting without master, use stop() to finish the counting"
            );
        }

        debug!(detector = %self.config.name, slaves = partition.slaves.len(), "Starting slaves");
        self.dispatch(&partition.slaves, |ch| ch.start()).await?;

        debug!(detector = %self.config.name, masters = partition.masters.len(), "Starting masters");
        self.dispatch(&partition.masters, |ch| ch.start()).await?;

        info!(
            detector = %self.config.name,
            masters = ?self.names_of(&partition.masters),
            "Measurement started"
        );
        Ok(())
    }

    /// Stop the masters. Safe at any time, including when idle.
    pub async fn stop(&self) -> Result<()> {
        let _entry = self.entry.lock().await;
        self.stop_masters(&self.partition()).await
    }

    async fn stop_masters(&self, partition: &Partition) -> Result<()> {
        self.dispatch(&partition.masters, |ch| ch.stop()).await?;
        Ok(())
    }

    /// Pause the masters.
    ///
    /// Returns `false` if any master cannot pause. Masters that did pause
    /// stay paused; the caller should fall back to [`Self::stop`].
    pub async fn pause(&self) -> Result<bool> {
        let _entry = self.entry.lock().await;
        let partition = self.partition();
        let results = self.dispatch(&partition.masters, |ch| ch.pause()).await?;

        let refused: Vec<&str> = partition
            .masters
            .iter()
            .zip(&results)
            .filter(|(_, paused)| !**paused)
            .map(|(&i, _)| self.channels[i].channel.name())
            .collect();

        if refused.is_empty() {
            debug!(detector = %self.config.name, "Measurement paused");
            Ok(true)
        } else {
            warn!(
                detector = %self.config.name,
                refused = ?refused,
                "Pause not supported by all masters; measurement is not paused"
            );
            Ok(false)
        }
    }

    /// Resume the masters after a pause.
    pub async fn resume(&self) -> Result<()> {
        let _entry = self.entry.lock().await;
        self.dispatch(&self.partition().masters, |ch| ch.resume()).await?;
        debug!(detector = %self.config.name, "Measurement resumed");
        Ok(())
    }

    /// Reset every channel, whatever its role.
    pub async fn reset(&self) -> Result<()> {
        let _entry = self.entry.lock().await;
        for attached in &self.channels {
            attached.channel.reset().await?;
        }
        debug!(detector = %self.config.name, "Detector reset");
        Ok(())
    }

    // =========================================================================
    // Readout
    // =========================================================================

    /// Composite reading: timer, monitors, counters in declared order.
    pub async fn read(&self, max_age: Option<Duration>) -> Result<Vec<f64>> {
        let _entry = self.entry.lock().await;
        self.read_all(max_age).await
    }

    async fn read_all(&self, max_age: Option<Duration>) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(self.channels.len());
        for attached in &self.channels {
            values.push(attached.channel.read(max_age).await?);
        }
        Ok(values)
    }

    /// Aggregate status of the masters.
    ///
    /// The first busy master in declared order wins; without any busy master
    /// the first master in error is reported; otherwise `(Ok, "idle")`.
    /// Slave states never show up here.
    pub async fn status(&self, max_age: Option<Duration>) -> Result<ChannelStatus> {
        let _entry = self.entry.lock().await;
        let mut first_error = None;

        for i in self.partition().masters {
            let status = self.channels[i].channel.status(max_age).await?;
            match status.state {
                ChannelState::Busy => return Ok(status),
                ChannelState::Error => {
                    first_error.get_or_insert(status);
                }
                ChannelState::Ok => {}
            }
        }

        Ok(first_error.unwrap_or_else(ChannelStatus::idle))
    }

    /// Whether any master reached its preselection.
    ///
    /// Vacuously true without masters.
    pub async fn is_completed(&self) -> Result<bool> {
        let _entry = self.entry.lock().await;
        let masters = self.partition().masters;
        if masters.is_empty() {
            return Ok(true);
        }
        for i in masters {
            if self.channels[i].channel.is_completed().await? {
                debug!(
                    detector = %self.config.name,
                    channel = %self.channels[i].channel.name(),
                    "Master reached preselection"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Value metadata in declared order.
    pub fn value_info(&self) -> Vec<ValueInfo> {
        self.channels
            .iter()
            .map(|c| c.channel.value_info())
            .collect()
    }

    /// Read every channel once and collect master progress, atomically with
    /// respect to other detector calls.
    pub async fn snapshot(&self, max_age: Option<Duration>) -> Result<DetectorSnapshot> {
        let _entry = self.entry.lock().await;
        let values = self.read_all(max_age).await?;
        let masters = self
            .partition()
            .masters
            .iter()
            .map(|&i| MasterProgress {
                index: i,
                value: values[i],
                preselection: self.channels[i].channel.params().preselection(),
            })
            .collect();
        Ok(DetectorSnapshot { values, masters })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn partition(&self) -> Partition {
        Partition::derive(&self.channels)
    }

    fn names_of(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|&i| self.channels[i].channel.name().to_string())
            .collect()
    }

    /// Run `op` on every channel of a tier according to the dispatch mode.
    ///
    /// Sequential dispatch stops at the first error. Concurrent dispatch
    /// waits for every call of the tier, then reports the first error in
    /// declared order.
    async fn dispatch<'a, T, F>(&'a self, tier: &[usize], op: F) -> Result<Vec<T>>
    where
        F: Fn(&'a dyn Channel) -> BoxFuture<'a, Result<T>>,
    {
        match self.config.dispatch {
            DispatchMode::Sequential => {
                let mut results = Vec::with_capacity(tier.len());
                for &i in tier {
                    results.push(op(self.channels[i].channel.as_ref()).await?);
                }
                Ok(results)
            }
            DispatchMode::Concurrent => {
                join_all(tier.iter().map(|&i| op(self.channels[i].channel.as_ref())))
                    .await
                    .into_iter()
                    .collect()
            }
        }
    }
}
