//! Mock counting channels for daq-detector
//!
//! Simulated counter-card registers for running a detector without hardware.
//! All waits use `tokio::time`, so tests can pause the runtime clock and
//! advance it to get exact counts.
//!
//! # Available Mock Channels
//!
//! - [`MockTimer`] - gate-time register in seconds
//! - [`MockCounter`] - monitor or detector register counting at a fixed rate
//! - [`MockGate`] - card gate shared by registers that must stop together
//!
//! # Behavior
//!
//! - Count rate: 1000 cts/s by default, 90-100% of nominal in realistic mode
//! - A master in preselection mode closes its card gate when the preselection is reached
//! - Pausing or stopping a master holds or closes the gate for every register on the card

pub mod common;
mod gate;
mod mock_counter;
mod mock_timer;
mod register;

pub use common::{ErrorConfig, ErrorScenario, MockMode, MockRng, TimingConfig};

pub use gate::MockGate;
pub use mock_counter::{CounterKind, MockCounter, MockCounterBuilder, MockCounterConfig};
pub use mock_timer::{MockTimer, MockTimerBuilder, MockTimerConfig};
