//! Assignment work-item model.

use crate::model::dataset::DatasetId;
use crate::model::evaluation::UserId;
use serde::{Deserialize, Serialize};

/// Progress of one reviewer on one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Per (user, dataset) work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub user_id: UserId,
    pub dataset_id: DatasetId,
    pub status: AssignmentStatus,
    /// Unix epoch milliseconds.
    pub assigned_at: i64,
    /// Unix epoch milliseconds; set only while `status == Completed`.
    pub completed_at: Option<i64>,
}
