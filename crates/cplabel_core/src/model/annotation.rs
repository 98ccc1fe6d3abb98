//! Change-point mark model.
//!
//! # Responsibility
//! - Define the closed set of change-point types and their wire names.
//! - Define the in-progress mark owned by an annotation session.

use serde::{Deserialize, Serialize};

/// Kind of statistical change a reviewer marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangePointType {
    /// Shift in the series level/mean.
    Mean,
    /// Change of slope.
    Trend,
    /// Change of spread.
    Variance,
    /// Abrupt level step.
    Level,
}

impl ChangePointType {
    pub const ALL: [ChangePointType; 4] = [Self::Mean, Self::Trend, Self::Variance, Self::Level];

    /// Wire vocabulary used by evaluation request bodies.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Trend => "trend",
            Self::Variance => "variance",
            Self::Level => "level",
        }
    }

    /// Parses a wire name, case-insensitively.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mean" => Some(Self::Mean),
            "trend" => Some(Self::Trend),
            "variance" => Some(Self::Variance),
            "level" => Some(Self::Level),
            _ => None,
        }
    }
}

/// One change-point mark inside an annotation working set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePointAnnotation {
    /// Zero-based sample index into the owning dataset.
    pub position: usize,
    #[serde(rename = "type")]
    pub kind: ChangePointType,
    /// Sample value captured when the mark was committed or hydrated.
    pub value: f64,
    pub notes: String,
}

impl ChangePointAnnotation {
    pub fn new(position: usize, kind: ChangePointType, value: f64) -> Self {
        Self {
            position,
            kind,
            value,
            notes: String::new(),
        }
    }
}
