//! Event-driven annotation session over one dataset.

use super::state::{AnnotationState, StateError};
use crate::config::{ConfigError, LabelingConfig};
use crate::mapping::SampleMapper;
use crate::model::annotation::{ChangePointAnnotation, ChangePointType};
use crate::model::dataset::Dataset;
use log::debug;

/// Receives the new state after every transition that changed it.
pub trait AnnotationObserver {
    fn on_state_changed(&self, state: &AnnotationState);
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Effect of a click or direct toggle.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// An existing mark within tolerance was deleted.
    Removed(ChangePointAnnotation),
    /// The index awaits a type choice.
    Pending(usize),
}

/// Reviewer session: samples, click mapping, current state, observers.
pub struct AnnotationSession {
    values: Vec<f64>,
    mapper: SampleMapper,
    tolerance: usize,
    state: AnnotationState,
    observers: Vec<(SubscriptionId, Box<dyn AnnotationObserver>)>,
    next_subscription: u64,
}

impl AnnotationSession {
    pub fn new(values: Vec<f64>, mapper: SampleMapper, tolerance: usize) -> Self {
        Self {
            values,
            mapper,
            tolerance,
            state: AnnotationState::new(),
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Builds a session over `dataset` using paging and tolerance from
    /// `config`.
    pub fn for_dataset(dataset: &Dataset, config: &LabelingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mapper = SampleMapper::from_config(dataset.length, config)
            .ok_or(ConfigError::Invalid("plot_area.x1 must be greater than x0"))?;
        Ok(Self::new(dataset.values(), mapper, config.toggle_tolerance))
    }

    pub fn state(&self) -> &AnnotationState {
        &self.state
    }

    pub fn mapper(&self) -> &SampleMapper {
        &self.mapper
    }

    /// Paging access. Marks are absolute and survive any page change.
    pub fn mapper_mut(&mut self) -> &mut SampleMapper {
        &mut self.mapper
    }

    pub fn tolerance(&self) -> usize {
        self.tolerance
    }

    pub fn sample_count(&self) -> usize {
        self.values.len()
    }

    pub fn subscribe(&mut self, observer: Box<dyn AnnotationObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, observer));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(current, _)| *current != id);
        self.observers.len() != before
    }

    /// Resolves a plotting-area click and toggles at the resolved sample.
    /// `None` when the click is outside the plotting area.
    pub fn click(&mut self, pixel_x: f64) -> Option<ClickOutcome> {
        let Some(index) = self.mapper.pixel_to_index(pixel_x) else {
            debug!("event=annotation_click module=annotation status=skipped reason=out_of_area");
            return None;
        };
        self.toggle_at(index)
    }

    /// Toggles at an absolute index. `None` when the index is beyond the
    /// dataset.
    pub fn toggle_at(&mut self, index: usize) -> Option<ClickOutcome> {
        if index >= self.values.len() {
            return None;
        }
        let outcome = match self.state.nearest_within(index, self.tolerance) {
            Some(hit) => ClickOutcome::Removed(hit.clone()),
            None => ClickOutcome::Pending(index),
        };
        let next = self.state.toggle_at(index, self.tolerance);
        self.apply(next);
        Some(outcome)
    }

    /// Commits the pending selection using the sample's current value.
    pub fn commit_type(&mut self, kind: ChangePointType) -> Result<(), StateError> {
        let position = self
            .state
            .pending_selection()
            .ok_or(StateError::NoPendingSelection)?;
        let value = self
            .values
            .get(position)
            .copied()
            .ok_or(StateError::PositionOutOfRange {
                position,
                length: self.values.len(),
            })?;
        let next = self.state.commit_type(kind, value)?;
        debug!(
            "event=annotation_commit module=annotation status=ok position={} type={}",
            position,
            kind.as_wire()
        );
        self.apply(next);
        Ok(())
    }

    pub fn cancel_selection(&mut self) {
        let next = self.state.cancel_selection();
        self.apply(next);
    }

    /// Removes the mark at exactly `position`; `false` if there was none.
    pub fn remove_at(&mut self, position: usize) -> bool {
        let existed = self.state.annotation_at(position).is_some();
        let next = self.state.remove_at(position);
        self.apply(next);
        existed
    }

    pub fn set_no_change_points(&mut self, value: bool) {
        let next = self.state.set_no_change_points(value);
        self.apply(next);
    }

    pub fn set_note(&mut self, position: usize, notes: impl Into<String>) -> Result<(), StateError> {
        let next = self.state.set_note(position, notes)?;
        self.apply(next);
        Ok(())
    }

    /// Retypes an existing mark; observers hear of it only when the type
    /// actually changed.
    pub fn set_type(&mut self, position: usize, kind: ChangePointType) -> Result<(), StateError> {
        let next = self.state.set_type(position, kind)?;
        debug!(
            "event=annotation_retype module=annotation status=ok position={} type={}",
            position,
            kind.as_wire()
        );
        self.apply(next);
        Ok(())
    }

    pub fn reset(&mut self) {
        let next = self.state.reset();
        self.apply(next);
    }

    /// Replaces the whole state, e.g. with a hydrated evaluation.
    pub fn replace_state(&mut self, state: AnnotationState) {
        self.apply(state);
    }

    fn apply(&mut self, next: AnnotationState) {
        if next == self.state {
            return;
        }
        self.state = next;
        for (_, observer) in &self.observers {
            observer.on_state_changed(&self.state);
        }
    }
}
