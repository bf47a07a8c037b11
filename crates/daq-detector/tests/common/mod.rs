//! Scripted channels that record every call into a shared log.

#![allow(dead_code)]

use async_trait::async_trait;
use anyhow::Result;
use daq_core::{Channel, ChannelParams, ChannelStatus, DriverError, DriverErrorKind, ValueInfo, ValueType};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Calls recorded as `"<channel>.<operation>"`, in call order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Recorded operations of one kind, e.g. every `start`.
pub fn calls_of(log: &CallLog, operation: &str) -> Vec<String> {
    let suffix = format!(".{operation}");
    log.lock()
        .iter()
        .filter(|entry| entry.ends_with(&suffix))
        .cloned()
        .collect()
}

#[derive(Debug)]
struct Script {
    value: f64,
    status: ChannelStatus,
    completed: bool,
    pausable: bool,
    fail_on: Option<&'static str>,
}

pub struct SpyChannel {
    name: String,
    value_type: ValueType,
    params: ChannelParams,
    log: CallLog,
    script: Mutex<Script>,
    /// Delay before `start` returns, to observe tier ordering under concurrency.
    start_delay: Duration,
}

impl SpyChannel {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            value_type: ValueType::Counter,
            params: ChannelParams::new(),
            log: log.clone(),
            script: Mutex::new(Script {
                value: 0.0,
                status: ChannelStatus::idle(),
                completed: false,
                pausable: true,
                fail_on: None,
            }),
            start_delay: Duration::ZERO,
        }
    }

    pub fn timer(name: &str, log: &CallLog) -> Self {
        Self {
            value_type: ValueType::Time,
            ..Self::new(name, log)
        }
    }

    pub fn monitor(name: &str, log: &CallLog) -> Self {
        Self {
            value_type: ValueType::Monitor,
            ..Self::new(name, log)
        }
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn not_pausable(self) -> Self {
        self.script.lock().pausable = false;
        self
    }

    pub fn failing_on(self, operation: &'static str) -> Self {
        self.script.lock().fail_on = Some(operation);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn set_value(&self, value: f64) {
        self.script.lock().value = value;
    }

    pub fn set_status(&self, status: ChannelStatus) {
        self.script.lock().status = status;
    }

    pub fn set_completed(&self, completed: bool) {
        self.script.lock().completed = completed;
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        self.log.lock().push(format!("{}.{operation}", self.name));
        if self.script.lock().fail_on == Some(operation) {
            return Err(DriverError::new(
                "spy",
                DriverErrorKind::Communication,
                format!("{} lost during {operation}", self.name),
            )
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for SpyChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &ChannelParams {
        &self.params
    }

    fn value_info(&self) -> ValueInfo {
        match self.value_type {
            ValueType::Time => ValueInfo::time(&self.name),
            other => ValueInfo::counts(&self.name, other),
        }
    }

    async fn start(&self) -> Result<()> {
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        self.record("start")
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop")
    }

    async fn pause(&self) -> Result<bool> {
        self.record("pause")?;
        Ok(self.script.lock().pausable)
    }

    async fn resume(&self) -> Result<()> {
        self.record("resume")
    }

    async fn read(&self, _max_age: Option<Duration>) -> Result<f64> {
        self.record("read")?;
        Ok(self.script.lock().value)
    }

    async fn status(&self, _max_age: Option<Duration>) -> Result<ChannelStatus> {
        self.record("status")?;
        Ok(self.script.lock().status.clone())
    }

    async fn is_completed(&self) -> Result<bool> {
        self.record("is_completed")?;
        Ok(self.script.lock().completed)
    }

    async fn reset(&self) -> Result<()> {
        self.record("reset")
    }
}

/// Timer, two monitors and two counters sharing one log.
pub struct SpyRig {
    pub log: CallLog,
    pub timer: Arc<SpyChannel>,
    pub mon1: Arc<SpyChannel>,
    pub mon2: Arc<SpyChannel>,
    pub det1: Arc<SpyChannel>,
    pub det2: Arc<SpyChannel>,
}

impl SpyRig {
    pub fn new() -> Self {
        let log = call_log();
        Self {
            timer: SpyChannel::timer("timer", &log).shared(),
            mon1: SpyChannel::monitor("mon1", &log).shared(),
            mon2: SpyChannel::monitor("mon2", &log).shared(),
            det1: SpyChannel::new("det1", &log).shared(),
            det2: SpyChannel::new("det2", &log).shared(),
            log,
        }
    }

    pub fn builder(&self) -> daq_detector::DetectorBuilder {
        daq_detector::MultiChannelDetector::builder()
            .counter(self.det1.clone())
            .timer(self.timer.clone())
            .monitor(self.mon1.clone())
            .counter(self.det2.clone())
            .monitor(self.mon2.clone())
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }
}
