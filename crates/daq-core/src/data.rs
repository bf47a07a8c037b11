//! Measurement value metadata.
//!
//! Every channel describes the single number it reports with a
//! [`ValueInfo`]. A detector's composite reading is the concatenation of its
//! channels' values, so its metadata is the concatenation of their
//! `ValueInfo`s in the same order.

use serde::{Deserialize, Serialize};

/// What kind of quantity a value represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Elapsed (gated) time.
    Time,
    /// Beam monitor counts, used for normalisation.
    Monitor,
    /// Detector counts.
    Counter,
    /// Anything else.
    Other,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ValueType::Time => "time",
            ValueType::Monitor => "monitor",
            ValueType::Counter => "counter",
            ValueType::Other => "other",
        };
        f.pad(label)
    }
}

/// Statistical error model attached to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorModel {
    #[default]
    None,
    /// Poisson counting statistics: error is the square root of the value.
    Sqrt,
}

/// Name, unit, type and display format of one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueInfo {
    pub name: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// printf-style format, e.g. `%.3f` or `%d`.
    pub format: String,
    #[serde(default)]
    pub errors: ErrorModel,
}

impl ValueInfo {
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        value_type: ValueType,
        format: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            value_type,
            format: format.into(),
            errors: ErrorModel::None,
        }
    }

    /// Metadata for a timer channel: seconds, three decimals.
    pub fn time(name: impl Into<String>) -> Self {
        Self::new(name, "s", ValueType::Time, "%.3f")
    }

    /// Metadata for a counting channel: integer counts with sqrt errors.
    pub fn counts(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, "cts", value_type, "%d").with_errors(ErrorModel::Sqrt)
    }

    pub fn with_errors(mut self, errors: ErrorModel) -> Self {
        self.errors = errors;
        self
    }

    /// Render `value` according to [`Self::format`].
    ///
    /// Understands the formats channels actually use (`%d`, `%.Nf`, `%s`,
    /// `%g`); anything else falls back to the default float formatting.
    pub fn format_value(&self, value: f64) -> String {
        let fmt = self.format.as_str();
        if fmt == "%d" {
            return format!("{}", value.round() as i64);
        }
        if let Some(precision) = fmt
            .strip_prefix("%.")
            .and_then(|rest| rest.strip_suffix('f'))
            .and_then(|digits| digits.parse::<usize>().ok())
        {
            return format!("{:.*}", precision, value);
        }
        format!("{}", value)
    }
}
