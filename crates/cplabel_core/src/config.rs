//! Labeling configuration.
//!
//! # Responsibility
//! - Hold the tunables of the interactive labeling loop (page size, click
//!   tolerance, plotting area, default confidence).
//! - Load them from JSON with per-field defaults.
//!
//! # Invariants
//! - A validated config has `page_size > 0`, a non-empty finite plot area and
//!   `default_confidence` in `[0, 1]`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Samples rendered per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Samples on either side of a click that still hit an existing mark.
pub const DEFAULT_TOGGLE_TOLERANCE: usize = 1;
/// Left edge of the plotting area in pixels.
pub const DEFAULT_PLOT_X0: f64 = 60.0;
/// Right edge of the plotting area in pixels.
pub const DEFAULT_PLOT_X1: f64 = 740.0;
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

/// Horizontal pixel interval of the plotting area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotAreaConfig {
    pub x0: f64,
    pub x1: f64,
}

impl Default for PlotAreaConfig {
    fn default() -> Self {
        Self {
            x0: DEFAULT_PLOT_X0,
            x1: DEFAULT_PLOT_X1,
        }
    }
}

/// Tunables of the labeling loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelingConfig {
    pub page_size: usize,
    pub toggle_tolerance: usize,
    pub plot_area: PlotAreaConfig,
    pub default_confidence: f64,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            toggle_tolerance: DEFAULT_TOGGLE_TOLERANCE,
            plot_area: PlotAreaConfig::default(),
            default_confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl LabelingConfig {
    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be greater than 0"));
        }
        let area = self.plot_area;
        if !area.x0.is_finite() || !area.x1.is_finite() {
            return Err(ConfigError::Invalid("plot_area bounds must be finite"));
        }
        if area.x1 <= area.x0 {
            return Err(ConfigError::Invalid("plot_area.x1 must be greater than x0"));
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(ConfigError::Invalid(
                "default_confidence must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Config loading failures.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
