//! Mock counter and monitor channel.
//!
//! Accumulates events at a constant count rate (1000 cts/s unless configured)
//! while its card gate is open. Realistic mode draws the rate for each run
//! from 90-100% of the nominal rate. Readings are whole counts.

use crate::common::{ErrorConfig, MockMode, TimingConfig};
use crate::gate::MockGate;
use crate::register::{CountingRegister, RegisterSettings};
use anyhow::Result;
use async_trait::async_trait;
use daq_core::{Channel, ChannelParams, ChannelStatus, ValueInfo, ValueType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DRIVER_TYPE: &str = "mock_counter";

/// Whether a counter watches the beam or the sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    Monitor,
    #[default]
    Counter,
}

impl CounterKind {
    pub fn value_type(self) -> ValueType {
        match self {
            CounterKind::Monitor => ValueType::Monitor,
            CounterKind::Counter => ValueType::Counter,
        }
    }
}

/// Configuration for a [`MockCounter`] in a setup file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockCounterConfig {
    pub name: String,
    /// Counts per second (default: 1000)
    #[serde(default = "default_count_rate")]
    pub count_rate: f64,
    /// Whether the register supports pause (default: true)
    #[serde(default = "default_pausable")]
    pub pausable: bool,
    #[serde(default)]
    pub mode: MockMode,
    /// Seed for realistic-mode rate jitter
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_count_rate() -> f64 {
    1000.0
}

fn default_pausable() -> bool {
    true
}

/// Simulated counter register
pub struct MockCounter {
    name: String,
    kind: CounterKind,
    params: ChannelParams,
    register: CountingRegister,
}

impl MockCounter {
    pub fn new(name: impl Into<String>, kind: CounterKind) -> Self {
        Self::builder(name).kind(kind).build()
    }

    pub fn builder(name: impl Into<String>) -> MockCounterBuilder {
        MockCounterBuilder::new(name)
    }

    pub fn from_config(
        config: &MockCounterConfig,
        kind: CounterKind,
        gate: Option<Arc<MockGate>>,
    ) -> Self {
        let mut builder = Self::builder(&config.name)
            .kind(kind)
            .count_rate(config.count_rate)
            .pausable(config.pausable)
            .mode(config.mode);
        if let Some(seed) = config.seed {
            builder = builder.seed(seed);
        }
        if let Some(gate) = gate {
            builder = builder.gate(gate);
        }
        builder.build()
    }

    pub fn kind(&self) -> CounterKind {
        self.kind
    }

    /// Nominal counts per second.
    pub fn count_rate(&self) -> f64 {
        self.register.nominal_rate()
    }

    pub fn gate(&self) -> Arc<MockGate> {
        self.register.gate().clone()
    }
}

impl std::fmt::Debug for MockCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCounter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("count_rate", &self.count_rate())
            .field("params", &self.params.snapshot())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Channel for MockCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &ChannelParams {
        &self.params
    }

    fn value_info(&self) -> ValueInfo {
        ValueInfo::counts(&self.name, self.kind.value_type())
    }

    async fn start(&self) -> Result<()> {
        self.register.start(&self.name, &self.params).await
    }

    async fn stop(&self) -> Result<()> {
        self.register.stop(&self.name, &self.params).await
    }

    async fn pause(&self) -> Result<bool> {
        self.register.pause(&self.name, &self.params).await
    }

    async fn resume(&self) -> Result<()> {
        self.register.resume(&self.name, &self.params).await
    }

    async fn read(&self, max_age: Option<Duration>) -> Result<f64> {
        self.register.read(&self.params, max_age).await
    }

    async fn status(&self, _max_age: Option<Duration>) -> Result<ChannelStatus> {
        self.register.status().await
    }

    async fn is_completed(&self) -> Result<bool> {
        self.register.is_completed().await
    }

    async fn reset(&self) -> Result<()> {
        self.register.reset(&self.name, &self.params).await
    }
}

/// Builder for [`MockCounter`]
pub struct MockCounterBuilder {
    name: String,
    kind: CounterKind,
    count_rate: f64,
    pausable: bool,
    mode: MockMode,
    timing: Option<TimingConfig>,
    error_config: ErrorConfig,
    gate: Option<Arc<MockGate>>,
    seed: Option<u64>,
}

impl MockCounterBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CounterKind::default(),
            count_rate: default_count_rate(),
            pausable: true,
            mode: MockMode::default(),
            timing: None,
            error_config: ErrorConfig::none(),
            gate: None,
            seed: None,
        }
    }

    pub fn kind(mut self, kind: CounterKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn count_rate(mut self, counts_per_second: f64) -> Self {
        self.count_rate = counts_per_second;
        self
    }

    pub fn pausable(mut self, pausable: bool) -> Self {
        self.pausable = pausable;
        self
    }

    pub fn mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn error_config(mut self, config: ErrorConfig) -> Self {
        self.error_config = config;
        self
    }

    pub fn gate(mut self, gate: Arc<MockGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Seed the realistic-mode rate jitter
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> MockCounter {
        let register = CountingRegister::new(RegisterSettings {
            driver_type: DRIVER_TYPE,
            rate: self.count_rate,
            integral: true,
            pausable: self.pausable,
            mode: self.mode,
            timing: self.timing.unwrap_or_else(TimingConfig::counter),
            error_config: self.error_config,
            gate: self.gate,
            seed: self.seed,
        });
        MockCounter {
            name: self.name,
            kind: self.kind,
            params: ChannelParams::new(),
            register,
        }
    }
}
