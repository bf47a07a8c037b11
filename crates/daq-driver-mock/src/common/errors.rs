//! Fault injection for mock channels.
//!
//! Every channel operation calls [`ErrorConfig::check_operation`] before
//! touching its register. Injected faults surface as [`DriverError`]s so the
//! detector sees exactly what a real counter card would report.

use super::rng::MockRng;
use daq_core::error::{DriverError, DriverErrorKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Operation names checked by the mock channels.
pub mod ops {
    pub const START: &str = "start";
    pub const STOP: &str = "stop";
    pub const PAUSE: &str = "pause";
    pub const RESUME: &str = "resume";
    pub const READ: &str = "read";
    pub const STATUS: &str = "status";
    pub const RESET: &str = "reset";
}

/// Fault injection configuration shared by clones of a channel
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    /// Per-operation failure probability, `"*"` applies to every operation
    failure_rates: Arc<HashMap<&'static str, f64>>,
    scenarios: Arc<Vec<ErrorScenario>>,
    rng: Arc<MockRng>,
    state: Arc<Mutex<FaultState>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorScenario {
    /// Operation succeeds `count` times, then fails every time after
    FailAfterN { operation: &'static str, count: u32 },
    /// Operation always times out
    Timeout { operation: &'static str },
    /// First call of any operation drops the link, and it stays down
    CommunicationLoss,
    /// First call latches a hardware fault code
    HardwareFault { code: u32 },
}

#[derive(Default, Debug)]
struct FaultState {
    calls: HashMap<&'static str, u32>,
    link_down: bool,
    fault_code: Option<u32>,
}

impl ErrorConfig {
    /// No injected faults
    pub fn none() -> Self {
        Self::build(HashMap::new(), Vec::new(), None)
    }

    /// Every operation fails with probability `rate`
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        Self::build(HashMap::from([("*", rate)]), Vec::new(), seed)
    }

    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self::build(HashMap::new(), scenarios, None)
    }

    /// Failure probability per operation name
    pub fn with_rates(rates: HashMap<&'static str, f64>) -> Self {
        Self::build(rates, Vec::new(), None)
    }

    fn build(
        failure_rates: HashMap<&'static str, f64>,
        scenarios: Vec<ErrorScenario>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            failure_rates: Arc::new(failure_rates),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(FaultState::default())),
        }
    }

    /// Decide whether `operation` on `driver_type` fails this time.
    pub fn check_operation(
        &self,
        driver_type: &str,
        operation: &'static str,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();

        if state.link_down {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Communication,
                "Communication lost",
            ));
        }
        if let Some(code) = state.fault_code {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Hardware fault: {code}"),
            ));
        }

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN { operation: op, count } if *op == operation => {
                    let calls = state.calls.entry(operation).or_insert(0);
                    *calls += 1;
                    if *calls > *count {
                        return Err(DriverError::new(
                            driver_type,
                            DriverErrorKind::Hardware,
                            format!("Injected failure after {count} '{operation}' calls"),
                        ));
                    }
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Timeout,
                        format!("Operation '{operation}' timed out"),
                    ));
                }
                ErrorScenario::CommunicationLoss => {
                    state.link_down = true;
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Communication,
                        "Communication lost",
                    ));
                }
                ErrorScenario::HardwareFault { code } => {
                    state.fault_code = Some(*code);
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Hardware,
                        format!("Hardware fault: {code}"),
                    ));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);
        if self.rng.should_fail(rate) {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Random failure on operation '{operation}'"),
            ));
        }

        Ok(())
    }

    /// Clear call counters and latched faults.
    pub fn reset(&self) {
        *self.state.lock() = FaultState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}
