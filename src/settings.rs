use crate::error::{ConfigurationError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOLERANCE: f64 = 0.01;
pub const DEFAULT_SERIAL_DATE_MIN: f64 = 40_000.0;
pub const DEFAULT_SERIAL_DATE_MAX: f64 = 60_000.0;

/// Open interval of numbers treated as Excel date serials in period headers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SerialDateWindow {
    pub min: f64,
    pub max: f64,
}

impl SerialDateWindow {
    pub fn contains(&self, value: f64) -> bool {
        value > self.min && value < self.max
    }
}

impl Default for SerialDateWindow {
    fn default() -> Self {
        Self {
            min: DEFAULT_SERIAL_DATE_MIN,
            max: DEFAULT_SERIAL_DATE_MAX,
        }
    }
}

/// Process-wide engine settings. Built once and shared read-only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    #[schemars(description = "Maximum absolute difference accepted between stated and calculated figures")]
    pub tolerance: f64,

    #[schemars(description = "Numbers inside this open interval are read as Excel date serials in period headers")]
    pub serial_date_window: SerialDateWindow,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            serial_date_window: SerialDateWindow::default(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigurationError::InvalidSettings(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }

        let window = self.serial_date_window;
        if !window.min.is_finite() || !window.max.is_finite() || window.min >= window.max {
            return Err(ConfigurationError::InvalidSettings(format!(
                "serial date window ({}, {}) is empty",
                window.min, window.max
            )));
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }
}
