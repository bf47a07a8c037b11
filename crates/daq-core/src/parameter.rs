//! Channel parameters: counting mode, master flag, preselection threshold.
//!
//! These three values are what the detector coordinator writes when it
//! assigns presets. They are plain settable fields: no hardware write-through
//! and no validation beyond the type. A channel driver embeds one
//! [`ChannelParams`] and hands it out through [`crate::capabilities::Channel::params`],
//! then reads it back when its hardware decides whether to stop on its own.
//!
//! Guarded by a `parking_lot::RwLock` that is never held across an `.await`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// How a channel treats its preselection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// Plain accumulation; the preselection is ignored.
    #[default]
    Normal,
    /// Rate measurement; the channel reports counts per second.
    Ratemeter,
    /// The channel stops its own counting once the preselection is reached.
    Preselection,
}

impl std::fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelMode::Normal => write!(f, "normal"),
            ChannelMode::Ratemeter => write!(f, "ratemeter"),
            ChannelMode::Preselection => write!(f, "preselection"),
        }
    }
}

/// Snapshot of a channel's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamsSnapshot {
    pub mode: ChannelMode,
    pub is_master: bool,
    pub preselection: f64,
}

/// Settable parameter block embedded in every channel driver.
#[derive(Debug, Default)]
pub struct ChannelParams {
    inner: RwLock<ParamsSnapshot>,
}

impl ChannelParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ChannelMode {
        self.inner.read().mode
    }

    pub fn set_mode(&self, mode: ChannelMode) {
        self.inner.write().mode = mode;
    }

    pub fn is_master(&self) -> bool {
        self.inner.read().is_master
    }

    pub fn set_master(&self, is_master: bool) {
        self.inner.write().is_master = is_master;
    }

    pub fn preselection(&self) -> f64 {
        self.inner.read().preselection
    }

    pub fn set_preselection(&self, preselection: f64) {
        self.inner.write().preselection = preselection;
    }

    /// Turn this channel into a master that stops at `preselection`.
    pub fn assign_preset(&self, preselection: f64) {
        let mut params = self.inner.write();
        params.is_master = true;
        params.mode = ChannelMode::Preselection;
        params.preselection = preselection;
    }

    /// Drop the master role and fall back to normal counting.
    ///
    /// The preselection value is left in place; it is meaningless outside
    /// preselection mode.
    pub fn release(&self) {
        let mut params = self.inner.write();
        params.is_master = false;
        params.mode = ChannelMode::Normal;
    }

    /// Preselection threshold, if this channel currently stops on its own.
    pub fn active_preselection(&self) -> Option<f64> {
        let params = self.inner.read();
        (params.mode == ChannelMode::Preselection).then_some(params.preselection)
    }

    pub fn snapshot(&self) -> ParamsSnapshot {
        *self.inner.read()
    }
}
