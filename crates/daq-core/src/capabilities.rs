//! Channel Capability
//!
//! One [`Channel`] is one hardware counting or timing register: a timer, a
//! beam monitor, a detector counter. Each hardware family (virtual cards,
//! TACO counter cards, TANGO/EPICS scalers) implements only these raw
//! primitives; the master/slave orchestration on top lives once, in the
//! detector coordinator.
//!
//! # Design Philosophy
//!
//! Like the other capability traits in this workspace, `Channel`:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Takes `&self`; drivers keep their state behind interior mutability
//!
//! Hardware failures should be reported as [`crate::error::DriverError`]
//! so callers can tell them apart after propagation.
//!
//! # Example
//!
//! ```rust,ignore
//! struct ScalerChannel {
//!     params: ChannelParams,
//!     bus: ScalerBus,
//!     index: u8,
//! }
//!
//! #[async_trait]
//! impl Channel for ScalerChannel {
//!     fn name(&self) -> &str { "det1" }
//!     fn params(&self) -> &ChannelParams { &self.params }
//!     fn value_info(&self) -> ValueInfo { ValueInfo::counts("det1", ValueType::Counter) }
//!
//!     async fn start(&self) -> Result<()> {
//!         let preset = self.params.active_preselection();
//!         self.bus.arm(self.index, preset).await
//!     }
//!     async fn stop(&self) -> Result<()> { self.bus.halt(self.index).await }
//!     async fn resume(&self) -> Result<()> { self.bus.resume(self.index).await }
//!     async fn read(&self, _max_age: Option<Duration>) -> Result<f64> {
//!         self.bus.counts(self.index).await
//!     }
//!     async fn status(&self, _max_age: Option<Duration>) -> Result<ChannelStatus> {
//!         Ok(if self.bus.counting(self.index).await? {
//!             ChannelStatus::busy("counting")
//!         } else {
//!             ChannelStatus::idle()
//!         })
//!     }
//!     async fn is_completed(&self) -> Result<bool> {
//!         self.bus.preset_reached(self.index).await
//!     }
//!     async fn reset(&self) -> Result<()> { self.bus.clear(self.index).await }
//! }
//! ```

use crate::data::ValueInfo;
use crate::parameter::ChannelParams;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Channel Status
// =============================================================================

/// Coarse channel state.
///
/// Ordered by severity: `Ok < Busy < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Idle or paused; not counting.
    Ok,
    /// Counting.
    Busy,
    /// The register or its bus reports a fault.
    Error,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Ok => write!(f, "ok"),
            ChannelState::Busy => write!(f, "busy"),
            ChannelState::Error => write!(f, "error"),
        }
    }
}

/// State plus a short human-readable message, e.g. `(Busy, "counting")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub state: ChannelState,
    pub message: String,
}

impl ChannelStatus {
    pub fn new(state: ChannelState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }

    /// `(Ok, "idle")`
    pub fn idle() -> Self {
        Self::new(ChannelState::Ok, "idle")
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(ChannelState::Busy, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ChannelState::Error, message)
    }

    pub fn is_busy(&self) -> bool {
        self.state == ChannelState::Busy
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.state, self.message)
    }
}

// =============================================================================
// Channel Trait
// =============================================================================

/// Capability: Counting / Timing Register
///
/// # Contract
/// - `start()` arms the register; it honours the current [`ChannelParams`]
///   (a master in preselection mode stops by itself at its threshold)
/// - `stop()` is safe at any time; stopping an idle channel is a no-op
/// - `pause()` keeps the accumulated value; returns `Ok(false)` when the
///   backend cannot pause, in which case nothing happened
/// - `read(max_age)` may serve a cached value no older than `max_age`;
///   `None` asks for a fresh hardware read
/// - `is_completed()` is only meaningful in preselection mode and is
///   `false` otherwise
/// - `reset()` leaves the channel idle, stopping it first if needed
///
/// # Blocking
/// Every operation may wait on a hardware bus. Timeouts and retries belong
/// to the implementation, not to the caller.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, used for value labels and logs.
    fn name(&self) -> &str;

    /// Settable mode / master / preselection parameters.
    fn params(&self) -> &ChannelParams;

    /// Metadata describing the value returned by [`Channel::read`].
    fn value_info(&self) -> ValueInfo;

    /// Begin counting or timing.
    async fn start(&self) -> Result<()>;

    /// Halt counting. Never an error when already idle.
    async fn stop(&self) -> Result<()>;

    /// Suspend counting without losing the accumulated value.
    ///
    /// # Default Implementation
    /// Reports that pausing is not supported.
    async fn pause(&self) -> Result<bool> {
        Ok(false)
    }

    /// Continue after a successful [`Channel::pause`].
    async fn resume(&self) -> Result<()>;

    /// Current accumulated value.
    async fn read(&self, max_age: Option<Duration>) -> Result<f64>;

    /// Current state and message.
    async fn status(&self, max_age: Option<Duration>) -> Result<ChannelStatus>;

    /// Whether this channel's own stopping condition has been met.
    async fn is_completed(&self) -> Result<bool>;

    /// Force the channel to a known idle state.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ValueType;

    struct FixedChannel {
        params: ChannelParams,
    }

    #[async_trait]
    impl Channel for FixedChannel {
        fn name(&self) -> &str {
            "fixed"
        }
        fn params(&self) -> &ChannelParams {
            &self.params
        }
        fn value_info(&self) -> ValueInfo {
            ValueInfo::counts("fixed", ValueType::Counter)
        }
        async fn start(&self) -> Result<()> {
            Ok(())
        }
        async fn stop(&self) -> Result<()> {
            Ok(())
        }
        async fn resume(&self) -> Result<()> {
            Ok(())
        }
        async fn read(&self, _max_age: Option<Duration>) -> Result<f64> {
            Ok(42.0)
        }
        async fn status(&self, _max_age: Option<Duration>) -> Result<ChannelStatus> {
            Ok(ChannelStatus::idle())
        }
        async fn is_completed(&self) -> Result<bool> {
            Ok(false)
        }
        async fn reset(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_pause_is_unsupported() {
        let channel = FixedChannel {
            params: ChannelParams::new(),
        };
        assert!(!channel.pause().await.unwrap());
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let channel: Box<dyn Channel> = Box::new(FixedChannel {
            params: ChannelParams::new(),
        });
        assert_eq!(channel.read(None).await.unwrap(), 42.0);
        assert_eq!(channel.status(None).await.unwrap(), ChannelStatus::idle());
    }

    #[test]
    fn test_state_severity_order() {
        assert!(ChannelState::Ok < ChannelState::Busy);
        assert!(ChannelState::Busy < ChannelState::Error);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ChannelStatus::busy("counting").to_string(), "busy: counting");
    }
}
