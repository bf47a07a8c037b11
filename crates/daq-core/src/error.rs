//! Error types shared by channels and the detector coordinator.
//!
//! Two layers, mirroring how errors actually flow during a measurement:
//!
//! - **`DriverError`**: raised by a channel implementation when talking to its
//!   hardware register fails (bus timeout, communication loss, hardware fault).
//!   Channels return it inside `anyhow::Error`; the coordinator propagates it
//!   unmodified so callers can `downcast_ref::<DriverError>()`.
//! - **`DaqError`**: raised by the coordinator itself, for problems in how the
//!   detector was built, configured, or asked to count.
//!
//! A backend that cannot pause is not an error at all: `Channel::pause`
//! returns `Ok(false)` and the caller falls back to `stop()`.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    Initialization,
    Configuration,
    Communication,
    Hardware,
    Timeout,
    InvalidParameter,
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Initialization => "initialization",
            DriverErrorKind::Configuration => "configuration",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Hardware communication failure reported by a channel driver.
#[derive(Error, Debug, Clone)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    pub driver_type: String,
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }

    /// Whether retrying the same operation may succeed.
    ///
    /// Communication losses and timeouts are usually transient; hardware
    /// faults and configuration problems are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            DriverErrorKind::Communication | DriverErrorKind::Timeout
        )
    }
}

/// Convenience alias for results using the coordinator error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Coordinator-level error type.
///
/// # Error Categories
///
/// 1. **Configuration Errors** - `Config`, `Configuration`
///    - Occur while loading a setup or building a detector
///    - Permanent: fix the setup and rebuild the detector
///
/// 2. **Preset Errors** - `UnrecognizedPreset`
///    - Only raised under the `reject` preset policy
///    - Raised before any channel is touched, so the detector is unchanged
///
/// 3. **Hardware Errors** - `Driver`
///    - Wrapped here only when a caller needs a single error type; the
///      coordinator itself passes channel errors through untouched
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration file parsing failed.
    ///
    /// **Source**: Wraps `figment::Error` (TOML syntax, type mismatch,
    /// malformed environment override).
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Detector construction failed validation.
    ///
    /// Examples: a detector without any channel, two channels sharing a name.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// A preset key did not match any channel of the detector.
    #[error("Unrecognized preset '{key}' (known presets: {})", known.join(", "))]
    UnrecognizedPreset { key: String, known: Vec<String> },

    /// A preset key names a role that is syntactically valid but was not
    /// parseable (for example `mon0` or `detx`).
    #[error("Invalid preset name '{0}'")]
    InvalidPresetName(String),

    /// Channel driver failure.
    #[error("{0}")]
    Driver(#[from] DriverError),
}

impl From<figment::Error> for DaqError {
    fn from(err: figment::Error) -> Self {
        DaqError::Config(Box::new(err))
    }
}
