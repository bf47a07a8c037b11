//! `daq-core`
//!
//! Core trait definitions and types for multi-channel counting detectors.
//!
//! ## Key Types
//!
//! - [`Channel`]: capability trait for one counting/timing register
//! - [`ChannelParams`]: mode / master flag / preselection block every channel embeds
//! - [`ChannelStatus`]: `(state, message)` pair reported by channels and detectors
//! - [`ValueInfo`]: name, unit, type and format of a reported value
//! - [`DaqError`] and [`DriverError`]: coordinator and hardware error types

pub mod capabilities;
pub mod data;
pub mod error;
pub mod parameter;

// Re-export commonly used types
pub use anyhow::{anyhow, Result};
pub use capabilities::{Channel, ChannelState, ChannelStatus};
pub use data::{ErrorModel, ValueInfo, ValueType};
pub use error::{AppResult, DaqError, DriverError, DriverErrorKind};
pub use parameter::{ChannelMode, ChannelParams, ParamsSnapshot};
