//! Pure annotation state and its transitions.

use crate::model::annotation::{ChangePointAnnotation, ChangePointType};
use crate::model::evaluation::ChangePointRecord;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejected annotation actions. The state is never mutated on error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// `commit_type` without a pending selection.
    NoPendingSelection,
    /// Save requested with no marks and no "no change points" declaration.
    NothingToSave,
    /// Operation targets a position that holds no mark.
    UnknownPosition(usize),
    /// Position lies beyond the dataset.
    PositionOutOfRange { position: usize, length: usize },
}

impl Display for StateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPendingSelection => write!(f, "select a position before choosing a type"),
            Self::NothingToSave => write!(
                f,
                "mark at least one change point or declare that there are none"
            ),
            Self::UnknownPosition(position) => {
                write!(f, "no change point at position {position}")
            }
            Self::PositionOutOfRange { position, length } => write!(
                f,
                "position {position} is outside dataset of length {length}"
            ),
        }
    }
}

impl Error for StateError {}

/// Working set of marks plus the "no change points" flag.
///
/// Every transition borrows `self` and returns the next state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationState {
    annotations: BTreeMap<usize, ChangePointAnnotation>,
    no_change_points: bool,
    pending_selection: Option<usize>,
}

impl AnnotationState {
    /// Empty marks, flag cleared, nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// State carrying the given marks. Later duplicates of a position win.
    pub fn with_annotations(annotations: impl IntoIterator<Item = ChangePointAnnotation>) -> Self {
        Self {
            annotations: annotations
                .into_iter()
                .map(|annotation| (annotation.position, annotation))
                .collect(),
            no_change_points: false,
            pending_selection: None,
        }
    }

    /// State declaring that the series has no change points.
    pub fn declared_none() -> Self {
        Self {
            no_change_points: true,
            ..Self::default()
        }
    }

    /// Marks in ascending position order.
    pub fn annotations(&self) -> impl Iterator<Item = &ChangePointAnnotation> {
        self.annotations.values()
    }

    pub fn annotation_at(&self, position: usize) -> Option<&ChangePointAnnotation> {
        self.annotations.get(&position)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn no_change_points(&self) -> bool {
        self.no_change_points
    }

    pub fn pending_selection(&self) -> Option<usize> {
        self.pending_selection
    }

    /// Nearest mark within `tolerance` samples of `index`; ties go to the
    /// lower position.
    pub fn nearest_within(&self, index: usize, tolerance: usize) -> Option<&ChangePointAnnotation> {
        let low = index.saturating_sub(tolerance);
        let high = index.saturating_add(tolerance);
        self.annotations
            .range(low..=high)
            .min_by_key(|(position, _)| position.abs_diff(index))
            .map(|(_, annotation)| annotation)
    }

    /// Removes the nearest mark within `tolerance`, or makes `index` the
    /// pending selection when there is none.
    pub fn toggle_at(&self, index: usize, tolerance: usize) -> Self {
        let mut next = self.clone();
        match self.nearest_within(index, tolerance) {
            Some(hit) => {
                next.annotations.remove(&hit.position);
                next.pending_selection = None;
            }
            None => next.pending_selection = Some(index),
        }
        next
    }

    /// Commits the pending selection as a mark of `kind` with the sample
    /// `value`, clearing the "no change points" flag first.
    pub fn commit_type(&self, kind: ChangePointType, value: f64) -> Result<Self, StateError> {
        let position = self
            .pending_selection
            .ok_or(StateError::NoPendingSelection)?;
        let mut next = self.clone();
        next.no_change_points = false;
        next.annotations
            .insert(position, ChangePointAnnotation::new(position, kind, value));
        next.pending_selection = None;
        Ok(next)
    }

    pub fn cancel_selection(&self) -> Self {
        Self {
            pending_selection: None,
            ..self.clone()
        }
    }

    /// Removes the mark at exactly `position`; unchanged if there is none.
    pub fn remove_at(&self, position: usize) -> Self {
        let mut next = self.clone();
        next.annotations.remove(&position);
        next
    }

    /// Setting the flag drops every mark and the pending selection.
    pub fn set_no_change_points(&self, value: bool) -> Self {
        if value {
            Self::declared_none()
        } else {
            Self {
                no_change_points: false,
                ..self.clone()
            }
        }
    }

    /// Replaces the notes of the mark at `position`.
    pub fn set_note(&self, position: usize, notes: impl Into<String>) -> Result<Self, StateError> {
        let mut next = self.clone();
        let annotation = next
            .annotations
            .get_mut(&position)
            .ok_or(StateError::UnknownPosition(position))?;
        annotation.notes = notes.into();
        Ok(next)
    }

    /// Changes the type of the mark at `position`, keeping value and notes.
    pub fn set_type(&self, position: usize, kind: ChangePointType) -> Result<Self, StateError> {
        let mut next = self.clone();
        let annotation = next
            .annotations
            .get_mut(&position)
            .ok_or(StateError::UnknownPosition(position))?;
        annotation.kind = kind;
        Ok(next)
    }

    pub fn reset(&self) -> Self {
        Self::default()
    }

    /// Client-side save check.
    pub fn ensure_savable(&self) -> Result<(), StateError> {
        if self.annotations.is_empty() && !self.no_change_points {
            return Err(StateError::NothingToSave);
        }
        Ok(())
    }

    /// Wire form of the marks, ascending by position; empty when the flag
    /// is set.
    pub fn to_records(&self, confidence: f64) -> Vec<ChangePointRecord> {
        if self.no_change_points {
            return Vec::new();
        }
        self.annotations
            .values()
            .map(|annotation| ChangePointRecord {
                position: annotation.position,
                kind: annotation.kind,
                confidence,
                notes: annotation.notes.clone(),
            })
            .collect()
    }
}
