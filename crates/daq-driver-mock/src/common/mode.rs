//! Operational modes for mock channels.
//!
//! - **Instant**: no bus latency, exact count rates; for unit tests
//! - **Realistic**: bus latency per call and count-rate jitter; for integration runs
//! - **Chaos**: like Realistic, meant to be paired with error injection

use serde::{Deserialize, Serialize};

/// Operational modes for mock channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockMode {
    /// Zero delays, deterministic - for unit tests
    #[default]
    Instant,
    /// Hardware-like latency and rate jitter
    Realistic,
    /// Realistic plus configurable failures
    Chaos,
}

impl MockMode {
    /// Whether calls should wait for the simulated bus.
    pub fn has_latency(&self) -> bool {
        !matches!(self, MockMode::Instant)
    }
}
