//! Mock timer channel.
//!
//! Counts seconds of gate time. As a master it stops the card after `t`
//! seconds; as a slave it measures how long the gate stayed open.
//!
//! # Example
//!
//! ```rust,ignore
//! use daq_driver_mock::{MockGate, MockTimer};
//!
//! let card = Arc::new(MockGate::new());
//! let timer = MockTimer::builder("timer").gate(card.clone()).build();
//! timer.params().assign_preset(10.0);
//! timer.start().await?;
//! ```

use crate::common::{ErrorConfig, MockMode, TimingConfig};
use crate::gate::MockGate;
use crate::register::{CountingRegister, RegisterSettings};
use anyhow::Result;
use async_trait::async_trait;
use daq_core::{Channel, ChannelParams, ChannelStatus, ValueInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DRIVER_TYPE: &str = "mock_timer";

/// Configuration for a [`MockTimer`] in a setup file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockTimerConfig {
    pub name: String,
    #[serde(default)]
    pub mode: MockMode,
}

/// Simulated timer register
pub struct MockTimer {
    name: String,
    params: ChannelParams,
    register: CountingRegister,
}

impl MockTimer {
    /// Timer on its own card, instant mode.
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn builder(name: impl Into<String>) -> MockTimerBuilder {
        MockTimerBuilder::new(name)
    }

    pub fn from_config(config: &MockTimerConfig, gate: Option<Arc<MockGate>>) -> Self {
        let mut builder = Self::builder(&config.name).mode(config.mode);
        if let Some(gate) = gate {
            builder = builder.gate(gate);
        }
        builder.build()
    }

    /// Card gate this timer counts on.
    pub fn gate(&self) -> Arc<MockGate> {
        self.register.gate().clone()
    }
}

impl std::fmt::Debug for MockTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTimer")
            .field("name", &self.name)
            .field("params", &self.params.snapshot())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Channel for MockTimer {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &ChannelParams {
        &self.params
    }

    fn value_info(&self) -> ValueInfo {
        ValueInfo::time(&self.name)
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

/// Builder for [`MockTimer`]
pub struct MockTimerBuilder {
    name: String,
    mode: MockMode,
    timing: Option<TimingConfig>,
    error_config: ErrorConfig,
    gate: Option<Arc<MockGate>>,
}

impl MockTimerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: MockMode::default(),
            timing: None,
            error_config: ErrorConfig::none(),
            gate: None,
        }
    }

    pub fn mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the bus latency used outside instant mode
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn error_config(mut self, config: ErrorConfig) -> Self {
        self.error_config = config;
        self
    }

    /// Count on a shared card gate instead of a private one
    pub fn gate(mut self, gate: Arc<MockGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn build(self) -> MockTimer {
        let register = CountingRegister::new(RegisterSettings {
            driver_type: DRIVER_TYPE,
            rate: 1.0,
            integral: false,
            pausable: true,
            mode: self.mode,
            timing: self.timing.unwrap_or_else(TimingConfig::timer),
            error_config: self.error_config,
            gate: self.gate,
            seed: None,
        });
        MockTimer {
            name: self.name,
            params: ChannelParams::new(),
            register,
        }
    }
}
