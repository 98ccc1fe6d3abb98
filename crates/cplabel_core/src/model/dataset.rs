//! Dataset domain model.
//!
//! # Responsibility
//! - Define the immutable time-series record produced by ingestion.
//! - Validate stored summary statistics against the sample sequence.
//!
//! # Invariants
//! - `length == data.len()` and `length > 0`.
//! - `min_value <= mean_value <= max_value`; all statistics are finite.
//! - `std_value` is the population standard deviation (divisor `length`).

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one dataset.
pub type DatasetId = Uuid;

/// One `(index, value)` pair. Serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(i64, f64)", into = "(i64, f64)")]
pub struct Sample {
    /// Index/time column value from the source file.
    pub index: i64,
    /// Parsed sample value.
    pub value: f64,
}

impl Sample {
    pub fn new(index: i64, value: f64) -> Self {
        Self { index, value }
    }
}

impl From<(i64, f64)> for Sample {
    fn from((index, value): (i64, f64)) -> Self {
        Self { index, value }
    }
}

impl From<Sample> for (i64, f64) {
    fn from(sample: Sample) -> Self {
        (sample.index, sample.value)
    }
}

/// Administrative lifecycle of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    /// Available for review.
    Active,
    /// Hidden from reviewers.
    Inactive,
    /// Review campaign finished.
    Completed,
}

impl DatasetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Canonical dataset record, shaped like the boundary JSON record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub data: Vec<Sample>,
    pub length: usize,
    pub min_value: f64,
    pub max_value: f64,
    pub mean_value: f64,
    /// Population standard deviation.
    pub std_value: f64,
    /// Reviewer-facing hint; never derived from the data.
    pub expected_change_points: Option<u32>,
    pub status: DatasetStatus,
    pub tags: Vec<String>,
}

impl Dataset {
    /// Returns the value of the sample at `position`, if in range.
    pub fn sample_value(&self, position: usize) -> Option<f64> {
        self.data.get(position).map(|sample| sample.value)
    }

    /// Returns sample values in order.
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().map(|sample| sample.value).collect()
    }

    /// Validates record-level invariants.
    pub fn validate(&self) -> Result<(), DatasetValidationError> {
        if self.name.trim().is_empty() {
            return Err(DatasetValidationError::EmptyName);
        }
        if self.data.is_empty() {
            return Err(DatasetValidationError::NoSamples);
        }
        if self.length != self.data.len() {
            return Err(DatasetValidationError::LengthMismatch {
                length: self.length,
                samples: self.data.len(),
            });
        }
        for (field, value) in [
            ("min_value", self.min_value),
            ("max_value", self.max_value),
            ("mean_value", self.mean_value),
            ("std_value", self.std_value),
        ] {
            if !value.is_finite() {
                return Err(DatasetValidationError::NonFiniteStatistic(field));
            }
        }
        if self.min_value > self.max_value {
            return Err(DatasetValidationError::InvalidRange {
                min: self.min_value,
                max: self.max_value,
            });
        }
        if self.mean_value < self.min_value || self.mean_value > self.max_value {
            return Err(DatasetValidationError::MeanOutOfRange {
                mean: self.mean_value,
                min: self.min_value,
                max: self.max_value,
            });
        }
        Ok(())
    }
}

/// Dataset validation failures.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetValidationError {
    EmptyName,
    NoSamples,
    LengthMismatch { length: usize, samples: usize },
    NonFiniteStatistic(&'static str),
    InvalidRange { min: f64, max: f64 },
    MeanOutOfRange { mean: f64, min: f64, max: f64 },
}

impl Display for DatasetValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "dataset name must not be blank"),
            Self::NoSamples => write!(f, "dataset must contain at least one sample"),
            Self::LengthMismatch { length, samples } => write!(
                f,
                "dataset length {length} does not match {samples} stored samples"
            ),
            Self::NonFiniteStatistic(field) => write!(f, "dataset {field} is not finite"),
            Self::InvalidRange { min, max } => {
                write!(f, "dataset min_value {min} exceeds max_value {max}")
            }
            Self::MeanOutOfRange { mean, min, max } => {
                write!(f, "dataset mean_value {mean} lies outside [{min}, {max}]")
            }
        }
    }
}

impl Error for DatasetValidationError {}

#[cfg(test)]
mod tests {
    use super::{Dataset, DatasetStatus, DatasetValidationError, Sample};
    use uuid::Uuid;

    fn dataset(data: Vec<Sample>) -> Dataset {
        Dataset {
            id: Uuid::new_v4(),
            name: "series".to_string(),
            description: None,
            category: None,
            difficulty: None,
            length: data.len(),
            data,
            min_value: 0.0,
            max_value: 1.0,
            mean_value: 0.5,
            std_value: 0.5,
            expected_change_points: None,
            status: DatasetStatus::Active,
            tags: Vec::new(),
        }
    }

    #[test]
    fn sample_serializes_as_pair() {
        let json = serde_json::to_string(&Sample::new(3, 1.5)).unwrap();
        assert_eq!(json, "[3,1.5]");
        let back: Sample = serde_json::from_str("[7,-2.0]").unwrap();
        assert_eq!(back, Sample::new(7, -2.0));
    }

    #[test]
    fn validate_rejects_length_mismatch() {
        let mut record = dataset(vec![Sample::new(0, 0.0), Sample::new(1, 1.0)]);
        record.length = 3;
        assert!(matches!(
            record.validate(),
            Err(DatasetValidationError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn validate_rejects_mean_outside_range() {
        let mut record = dataset(vec![Sample::new(0, 0.0), Sample::new(1, 1.0)]);
        assert!(record.validate().is_ok());
        record.mean_value = 1.5;
        assert!(matches!(
            record.validate(),
            Err(DatasetValidationError::MeanOutOfRange { .. })
        ));
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(DatasetStatus::parse(" Inactive "), Some(DatasetStatus::Inactive));
        assert_eq!(DatasetStatus::parse("archived"), None);
    }
}
