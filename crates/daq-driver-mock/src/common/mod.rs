//! Shared building blocks for the mock channels.
//!
//! - **mode**: Instant, Realistic and Chaos behavior
//! - **timing**: simulated bus latency
//! - **errors**: fault injection
//! - **rng**: seeded random source for jitter and faults

pub mod errors;
pub mod mode;
pub mod rng;
pub mod timing;

pub use errors::{ops, ErrorConfig, ErrorScenario};
pub use mode::MockMode;
pub use rng::MockRng;
pub use timing::TimingConfig;
