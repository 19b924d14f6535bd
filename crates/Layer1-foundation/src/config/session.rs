//! Session state - the user choices that feed parameter assembly
//!
//! Everything the numeric transform depends on that does not come from the
//! loaded data lives here, so assembling a request bag never reads hidden
//! state.

use serde::{Deserialize, Serialize};

/// Where dead-time corrections come from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DeadTimeSource {
    /// No correction
    #[default]
    None,
    /// Table stored in the loaded run file
    FromFile,
    /// A user-supplied table, referenced by name
    FromTable { table: String },
}

/// Rebin mode selected by the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebinMode {
    #[default]
    None,
    /// Multiply the original bin width by a factor
    Fixed,
    /// Explicit rebin parameter string
    Variable,
}

/// Rebin configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RebinSpec {
    #[serde(default)]
    pub mode: RebinMode,

    /// Bin-width factor for [`RebinMode::Fixed`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_factor: Option<f64>,

    /// Rebin parameters for [`RebinMode::Variable`], e.g. `"0,0.1,10"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
}

impl RebinSpec {
    /// Whether a rebinned variant should be produced at all
    pub fn is_enabled(&self) -> bool {
        match self.mode {
            RebinMode::None => false,
            RebinMode::Fixed => self.fixed_factor.is_some_and(|f| f != 0.0),
            RebinMode::Variable => self.variable.as_deref().is_some_and(|v| !v.is_empty()),
        }
    }

    pub fn fixed(factor: f64) -> Self {
        Self {
            mode: RebinMode::Fixed,
            fixed_factor: Some(factor),
            variable: None,
        }
    }

    pub fn variable(params: impl Into<String>) -> Self {
        Self {
            mode: RebinMode::Variable,
            fixed_factor: None,
            variable: Some(params.into()),
        }
    }
}

/// Analysis session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Use the first good data value stored in the run file
    #[serde(default = "default_true")]
    pub first_good_data_from_file: bool,

    /// User override, used when `first_good_data_from_file` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_good_data: Option<f64>,

    /// Use the end of the recorded time range as last good data
    #[serde(default = "default_true")]
    pub last_good_data_from_file: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_good_data: Option<f64>,

    /// Use the time zero stored in the run file
    #[serde(default = "default_true")]
    pub time_zero_from_file: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zero: Option<f64>,

    #[serde(default)]
    pub dead_time: DeadTimeSource,

    #[serde(default)]
    pub rebin: RebinSpec,

    /// Period arithmetic, only honored for multi-period data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summed_periods: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtracted_periods: Option<String>,

    /// Asymmetry estimation window for groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_range_min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_range_max: Option<f64>,
}

fn default_true() -> bool {
    true
}

impl Default for SessionState {
    fn default() -> Self {
        Self::from_file_defaults()
    }
}

impl SessionState {
    /// Everything taken from the run file, no dead-time correction, no rebin
    pub fn from_file_defaults() -> Self {
        Self {
            first_good_data_from_file: true,
            first_good_data: None,
            last_good_data_from_file: true,
            last_good_data: None,
            time_zero_from_file: true,
            time_zero: None,
            dead_time: DeadTimeSource::None,
            rebin: RebinSpec::default(),
            summed_periods: None,
            subtracted_periods: None,
            group_range_min: None,
            group_range_max: None,
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn first_good_data(mut self, value: f64) -> Self {
        self.first_good_data_from_file = false;
        self.first_good_data = Some(value);
        self
    }

    pub fn last_good_data(mut self, value: f64) -> Self {
        self.last_good_data_from_file = false;
        self.last_good_data = Some(value);
        self
    }

    pub fn time_zero(mut self, value: f64) -> Self {
        self.time_zero_from_file = false;
        self.time_zero = Some(value);
        self
    }

    pub fn dead_time(mut self, source: DeadTimeSource) -> Self {
        self.dead_time = source;
        self
    }

    pub fn rebin(mut self, rebin: RebinSpec) -> Self {
        self.rebin = rebin;
        self
    }

    pub fn periods(mut self, summed: impl Into<String>, subtracted: impl Into<String>) -> Self {
        self.summed_periods = Some(summed.into());
        self.subtracted_periods = Some(subtracted.into());
        self
    }

    pub fn group_range(mut self, min: f64, max: f64) -> Self {
        self.group_range_min = Some(min);
        self.group_range_max = Some(max);
        self
    }
}
