//! Bus latency used in realistic mode.

use std::time::Duration;

/// Simulated bus latencies for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Round trip of a plain register access (read, status) in milliseconds
    pub communication_delay_ms: u64,
    /// Extra time to arm or disarm the register (start, stop, pause) in milliseconds
    pub arm_delay_ms: u64,
}

impl TimingConfig {
    /// Timer register on a counter card
    pub fn timer() -> Self {
        Self {
            communication_delay_ms: 2,
            arm_delay_ms: 5,
        }
    }

    /// Counter or monitor register on a counter card
    pub fn counter() -> Self {
        Self {
            communication_delay_ms: 2,
            arm_delay_ms: 3,
        }
    }

    pub fn communication_delay(&self) -> Duration {
        Duration::from_millis(self.communication_delay_ms)
    }

    pub fn arm_delay(&self) -> Duration {
        Duration::from_millis(self.communication_delay_ms + self.arm_delay_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            communication_delay_ms: 0,
            arm_delay_ms: 0,
        }
    }
}
