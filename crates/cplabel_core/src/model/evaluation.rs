//! Evaluation (label) domain model.
//!
//! # Responsibility
//! - Define one reviewer's persisted verdict for one dataset.
//! - Define the create/update request body used at the boundary.
//!
//! # Invariants
//! - `no_change_points == true` implies `change_points` is empty.
//! - `no_change_points == false` implies `change_points` is non-empty.
//! - Change-point positions are unique and kept in ascending order.
//! - `confidence` lies in `[0, 1]`.
//! - `time_spent` fits a signed 64-bit storage column.

use crate::model::annotation::ChangePointType;
use crate::model::dataset::DatasetId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one persisted evaluation.
pub type EvaluationId = Uuid;

/// Reviewer identity as issued by the external session service.
pub type UserId = String;

/// Draft/completed lifecycle of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Draft,
    Completed,
}

impl EvaluationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Committed change point in wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePointRecord {
    pub position: usize,
    #[serde(rename = "type")]
    pub kind: ChangePointType,
    pub confidence: f64,
    #[serde(default)]
    pub notes: String,
}

/// Evaluation create/update request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub dataset_id: DatasetId,
    #[serde(default)]
    pub change_points: Vec<ChangePointRecord>,
    #[serde(default)]
    pub no_change_points: bool,
    pub confidence: f64,
    /// Seconds spent on the review.
    #[serde(default)]
    pub time_spent: u64,
    pub status: EvaluationStatus,
}

/// Persisted evaluation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: EvaluationId,
    pub dataset_id: DatasetId,
    pub user_id: UserId,
    pub change_points: Vec<ChangePointRecord>,
    pub no_change_points: bool,
    pub confidence: f64,
    /// Seconds spent on the review.
    pub time_spent: u64,
    pub status: EvaluationStatus,
}

impl Evaluation {
    /// Builds a new evaluation with a generated id from a request body.
    ///
    /// Change points are sorted by position; validation is left to callers.
    pub fn from_request(user_id: impl Into<UserId>, request: EvaluationRequest) -> Self {
        Self::with_id(Uuid::new_v4(), user_id, request)
    }

    /// Builds an evaluation for an already-known identity.
    pub fn with_id(
        id: EvaluationId,
        user_id: impl Into<UserId>,
        request: EvaluationRequest,
    ) -> Self {
        let mut change_points = request.change_points;
        change_points.sort_by_key(|point| point.position);
        Self {
            id,
            dataset_id: request.dataset_id,
            user_id: user_id.into(),
            change_points,
            no_change_points: request.no_change_points,
            confidence: request.confidence,
            time_spent: request.time_spent,
            status: request.status,
        }
    }

    /// Validates the mutual-exclusion and uniqueness invariants.
    pub fn validate(&self) -> Result<(), EvaluationValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(EvaluationValidationError::EmptyUserId);
        }
        if self.no_change_points && !self.change_points.is_empty() {
            return Err(EvaluationValidationError::ConflictingNoChangePoints);
        }
        if !self.no_change_points && self.change_points.is_empty() {
            return Err(EvaluationValidationError::MissingChangePoints);
        }
        if !is_unit_interval(self.confidence) {
            return Err(EvaluationValidationError::ConfidenceOutOfRange(
                self.confidence,
            ));
        }
        if i64::try_from(self.time_spent).is_err() {
            return Err(EvaluationValidationError::TimeSpentOutOfRange(self.time_spent));
        }

        let mut seen = BTreeSet::new();
        for point in &self.change_points {
            if !seen.insert(point.position) {
                return Err(EvaluationValidationError::DuplicatePosition(point.position));
            }
            if !is_unit_interval(point.confidence) {
                return Err(EvaluationValidationError::ConfidenceOutOfRange(
                    point.confidence,
                ));
            }
        }
        Ok(())
    }
}

fn is_unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Evaluation validation failures.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationValidationError {
    EmptyUserId,
    /// Neither change points nor the "no change points" declaration.
    MissingChangePoints,
    /// Change points together with the "no change points" declaration.
    ConflictingNoChangePoints,
    DuplicatePosition(usize),
    ConfidenceOutOfRange(f64),
    TimeSpentOutOfRange(u64),
}

impl Display for EvaluationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUserId => write!(f, "evaluation user id must not be blank"),
            Self::MissingChangePoints => write!(
                f,
                "mark at least one change point or declare that there are none"
            ),
            Self::ConflictingNoChangePoints => write!(
                f,
                "evaluation cannot declare no change points while carrying change points"
            ),
            Self::DuplicatePosition(position) => {
                write!(f, "duplicate change point at position {position}")
            }
            Self::ConfidenceOutOfRange(value) => {
                write!(f, "confidence {value} must be within [0, 1]")
            }
            Self::TimeSpentOutOfRange(value) => {
                write!(f, "time spent {value} exceeds {} seconds", i64::MAX)
            }
        }
    }
}

impl Error for EvaluationValidationError {}
