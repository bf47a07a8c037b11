//! Counting register behind [`MockTimer`](crate::MockTimer) and
//! [`MockCounter`](crate::MockCounter).
//!
//! A register accumulates `rate * gate time` while counting. When it is the
//! master in preselection mode it arms its card gate to close when the
//! preselection is reached, so every register on the card stops together.

use crate::common::{ops, ErrorConfig, MockMode, MockRng, TimingConfig};
use crate::gate::MockGate;
use anyhow::Result;
use daq_core::{ChannelMode, ChannelParams, ChannelState, ChannelStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Lower bound of the realistic count-rate jitter, as a fraction of the nominal rate.
const RATE_JITTER_LOW: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Counting,
    Paused,
}

#[derive(Debug)]
struct RegisterState {
    phase: Phase,
    /// Gate time counted in finished segments
    accumulated: Duration,
    /// Gate clock when the current segment began
    segment_start: Duration,
    /// Gate time after which the preselection is reached
    target: Option<Duration>,
    rate: f64,
    cache: Option<(Instant, f64)>,
}

pub(crate) struct RegisterSettings {
    pub driver_type: &'static str,
    pub rate: f64,
    pub integral: bool,
    pub pausable: bool,
    pub mode: MockMode,
    pub timing: TimingConfig,
    pub error_config: ErrorConfig,
    pub gate: Option<Arc<MockGate>>,
    pub seed: Option<u64>,
}

pub(crate) struct CountingRegister {
    driver_type: &'static str,
    nominal_rate: f64,
    integral: bool,
    pausable: bool,
    mode: MockMode,
    timing: TimingConfig,
    error_config: ErrorConfig,
    gate: Arc<MockGate>,
    rng: MockRng,
    state: Mutex<RegisterState>,
}

impl CountingRegister {
    pub fn new(settings: RegisterSettings) -> Self {
        Self {
            driver_type: settings.driver_type,
            nominal_rate: settings.rate,
            integral: settings.integral,
            pausable: settings.pausable,
            mode: settings.mode,
            timing: settings.timing,
            error_config: settings.error_config,
            gate: settings.gate.unwrap_or_default(),
            rng: MockRng::new(settings.seed),
            state: Mutex::new(RegisterState {
                phase: Phase::Idle,
                accumulated: Duration::ZERO,
                segment_start: Duration::ZERO,
                target: None,
                rate: settings.rate,
                cache: None,
            }),
        }
    }

    pub fn gate(&self) -> &Arc<MockGate> {
        &self.gate
    }

    pub fn nominal_rate(&self) -> f64 {
        self.nominal_rate
    }

    async fn access(&self, operation: &'static str) -> Result<()> {
        if self.mode.has_latency() {
            let delay = match operation {
                ops::START | ops::STOP | ops::PAUSE | ops::RESUME => self.timing.arm_delay(),
                _ => self.timing.communication_delay(),
            };
            tokio::time::sleep(delay).await;
        }
        self.error_config.check_operation(self.driver_type, operation)?;
        Ok(())
    }

    fn sample_rate(&self) -> f64 {
        if self.mode.has_latency() {
            self.rng.jitter(self.nominal_rate, RATE_JITTER_LOW)
        } else {
            self.nominal_rate
        }
    }

    fn elapsed(&self, state: &RegisterState, now: Instant) -> Duration {
        match state.phase {
            Phase::Counting => {
                state.accumulated + self.gate.clock(now).saturating_sub(state.segment_start)
            }
            Phase::Idle | Phase::Paused => state.accumulated,
        }
    }

    fn completed(&self, state: &RegisterState, now: Instant) -> bool {
        state
            .target
            .is_some_and(|target| self.elapsed(state, now) >= target)
    }

    fn arm(&self, state: &RegisterState, now: Instant) {
        if let Some(target) = state.target {
            self.gate
                .limit(now, target.saturating_sub(self.elapsed(state, now)));
        }
    }

    pub async fn start(&self, name: &str, params: &ChannelParams) -> Result<()> {
        self.access(ops::START).await?;
        let now = Instant::now();
        let rate = self.sample_rate();
        let mut state = self.state.lock();

        self.gate.open(now);
        state.phase = Phase::Counting;
        state.accumulated = Duration::ZERO;
        state.segment_start = self.gate.clock(now);
        state.cache = None;
        state.rate = rate;
        state.target = if params.is_master() {
            params
                .active_preselection()
                .map(|preselection| gate_time_for(preselection, rate))
        } else {
            None
        };
        self.arm(&state, now);

        tracing::debug!(
            channel = name,
            rate,
            target = ?state.target,
            "{}: counting started",
            self.driver_type
        );
        Ok(())
    }

    pub async fn stop(&self, name: &str, params: &ChannelParams) -> Result<()> {
        self.access(ops::STOP).await?;
        let now = Instant::now();
        let mut state = self.state.lock();

        if params.is_master() {
            self.gate.release(now);
            self.gate.close(now);
        }
        if state.phase == Phase::Counting {
            state.accumulated = self.elapsed(&state, now);
        }
        state.phase = Phase::Idle;

        tracing::debug!(channel = name, "{}: stopped", self.driver_type);
        Ok(())
    }

    pub async fn pause(&self, name: &str, params: &ChannelParams) -> Result<bool> {
        self.access(ops::PAUSE).await?;
        if !self.pausable {
            tracing::debug!(channel = name, "{}: pause not supported", self.driver_type);
            return Ok(false);
        }
        let now = Instant::now();
        let mut state = self.state.lock();

        if state.phase == Phase::Counting {
            state.accumulated = self.elapsed(&state, now);
            state.phase = Phase::Paused;
            if params.is_master() {
                self.gate.hold(now);
            }
        }
        Ok(true)
    }

    pub async fn resume(&self, name: &str, params: &ChannelParams) -> Result<()> {
        self.access(ops::RESUME).await?;
        let now = Instant::now();
        let mut state = self.state.lock();

        if state.phase != Phase::Paused {
            return Ok(());
        }
        if params.is_master() {
            self.gate.release(now);
        }
        state.segment_start = self.gate.clock(now);
        state.phase = Phase::Counting;
        if params.is_master() {
            self.arm(&state, now);
        }

        tracing::debug!(channel = name, "{}: resumed", self.driver_type);
        Ok(())
    }

    pub async fn read(&self, params: &ChannelParams, max_age: Option<Duration>) -> Result<f64> {
        self.access(ops::READ).await?;
        let now = Instant::now();
        let mut state = self.state.lock();

        if let (Some(max_age), Some((taken, value))) = (max_age, state.cache) {
            if now.saturating_duration_since(taken) <= max_age {
                return Ok(value);
            }
        }

        let value = match params.mode() {
            ChannelMode::Ratemeter => {
                let running = state.phase == Phase::Counting && !self.gate.is_closed(now);
                if running {
                    state.rate
                } else {
                    0.0
                }
            }
            ChannelMode::Normal | ChannelMode::Preselection => {
                let mut value = state.rate * self.elapsed(&state, now).as_secs_f64();
                if params.is_master() {
                    if let Some(preselection) = params.active_preselection() {
                        // The gate closes on a whole nanosecond, which can
                        // land a fraction of a count short of the target.
                        value = if self.completed(&state, now) {
                            preselection
                        } else {
                            value.min(preselection)
                        };
                    }
                }
                if self.integral {
                    value = value.floor();
                }
                value
            }
        };
        state.cache = Some((now, value));
        Ok(value)
    }

    pub async fn status(&self) -> Result<ChannelStatus> {
        self.access(ops::STATUS).await?;
        let now = Instant::now();
        let state = self.state.lock();

        let status = match state.phase {
            Phase::Paused => ChannelStatus::new(ChannelState::Ok, "paused"),
            Phase::Counting if self.gate.is_held() => {
                ChannelStatus::new(ChannelState::Ok, "paused")
            }
            Phase::Counting if !self.gate.is_closed(now) && !self.completed(&state, now) => {
                ChannelStatus::busy("counting")
            }
            _ => ChannelStatus::idle(),
        };
        Ok(status)
    }

    pub async fn is_completed(&self) -> Result<bool> {
        self.access(ops::STATUS).await?;
        let state = self.state.lock();
        Ok(self.completed(&state, Instant::now()))
    }

    pub async fn reset(&self, name: &str, params: &ChannelParams) -> Result<()> {
        self.access(ops::RESET).await?;
        let now = Instant::now();
        let mut state = self.state.lock();

        if params.is_master() {
            self.gate.release(now);
            self.gate.close(now);
        }
        state.phase = Phase::Idle;
        state.accumulated = Duration::ZERO;
        state.target = None;
        state.cache = None;

        tracing::debug!(channel = name, "{}: reset", self.driver_type);
        Ok(())
    }
}

/// Gate time a register at `rate` needs to reach `preselection`.
fn gate_time_for(preselection: f64, rate: f64) -> Duration {
    if preselection <= 0.0 {
        return Duration::ZERO;
    }
    if rate <= 0.0 {
        return Duration::MAX;
    }
    Duration::try_from_secs_f64(preselection / rate).unwrap_or(Duration::MAX)
}
