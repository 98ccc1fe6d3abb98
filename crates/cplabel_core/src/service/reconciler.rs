//! Evaluation reconciliation: hydrate prior work, decide create vs update.
//!
//! # Responsibility
//! - Load a reviewer's most recent evaluation for a dataset into an
//!   `AnnotationState`, re-reading sample values from the dataset.
//! - Save a state as a new or an existing evaluation and, on a completed
//!   save, mark the reviewer's assignment completed.
//!
//! # Invariants
//! - Identity is keyed by dataset id only.
//! - Update is issued only when an identity is known AND the target status
//!   is `completed`; every other save creates a record.
//! - The assignment write happens after the evaluation write succeeds; its
//!   failure is logged and never masks the saved evaluation.
//! - A failed save changes neither the caller's state nor the retained
//!   identity.

use crate::annotation::{AnnotationState, StateError};
use crate::config::LabelingConfig;
use crate::model::annotation::ChangePointAnnotation;
use crate::model::assignment::AssignmentStatus;
use crate::model::dataset::{Dataset, DatasetId};
use crate::model::evaluation::{
    Evaluation, EvaluationId, EvaluationRequest, EvaluationStatus, UserId,
};
use crate::repo::assignment_repo::AssignmentRepository;
use crate::repo::evaluation_repo::EvaluationRepository;
use crate::repo::RepoError;
use log::{error, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Whether a persisted evaluation is known for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationIdentity {
    New,
    Existing {
        id: EvaluationId,
        status: EvaluationStatus,
    },
}

/// Hydrated working state plus the identity retained for later saves.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEvaluation {
    pub state: AnnotationState,
    pub identity: EvaluationIdentity,
    /// Persisted positions beyond the dataset, dropped during hydration.
    pub dropped_positions: Vec<usize>,
    /// Stored record the state was hydrated from; `None` for a fresh start.
    pub source: Option<Evaluation>,
}

/// Evaluation-level fields that are not part of the annotation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaveMeta {
    pub confidence: f64,
    /// Seconds spent on the review.
    pub time_spent: u64,
}

impl SaveMeta {
    /// Meta carrying the configured default confidence.
    pub fn with_default_confidence(config: &LabelingConfig, time_spent: u64) -> Self {
        Self {
            confidence: config.default_confidence,
            time_spent,
        }
    }
}

/// Which write a save issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    Created,
    Updated,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub evaluation: Evaluation,
    pub action: SaveAction,
    /// `true` when the assignment was marked completed by this save.
    pub assignment_completed: bool,
}

/// Reconciler failures.
#[derive(Debug)]
pub enum ReconcileError {
    /// Rejected before any write; nothing changed.
    State(StateError),
    /// Evaluation store failure; message is surfaced verbatim.
    Persistence(RepoError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::State(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::State(err) => Some(err),
            Self::Persistence(err) => Some(err),
        }
    }
}

impl From<StateError> for ReconcileError {
    fn from(value: StateError) -> Self {
        Self::State(value)
    }
}

impl From<RepoError> for ReconcileError {
    fn from(value: RepoError) -> Self {
        Self::Persistence(value)
    }
}

/// Per-reviewer reconciler over evaluation and assignment stores.
///
/// `save` takes `&mut self`, so one reconciler never has two saves in
/// flight.
pub struct EvaluationReconciler<E: EvaluationRepository, A: AssignmentRepository> {
    evaluations: E,
    assignments: A,
    user_id: UserId,
    identities: HashMap<DatasetId, EvaluationIdentity>,
}

impl<E: EvaluationRepository, A: AssignmentRepository> EvaluationReconciler<E, A> {
    pub fn new(evaluations: E, assignments: A, user_id: impl Into<UserId>) -> Self {
        Self {
            evaluations,
            assignments,
            user_id: user_id.into(),
            identities: HashMap::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Identity retained for `dataset_id`; `New` until a load or save.
    pub fn identity(&self, dataset_id: DatasetId) -> EvaluationIdentity {
        self.identities
            .get(&dataset_id)
            .copied()
            .unwrap_or(EvaluationIdentity::New)
    }

    /// Loads the most recent evaluation for `dataset` and hydrates a state.
    pub fn load(&mut self, dataset: &Dataset) -> Result<LoadedEvaluation, ReconcileError> {
        let latest = match self.evaluations.latest_for(&self.user_id, dataset.id) {
            Ok(latest) => latest,
            Err(err) => {
                error!(
                    "event=evaluation_load module=reconciler status=error dataset_id={} error={}",
                    dataset.id, err
                );
                return Err(err.into());
            }
        };

        let Some(evaluation) = latest else {
            self.identities.insert(dataset.id, EvaluationIdentity::New);
            info!(
                "event=evaluation_load module=reconciler status=ok dataset_id={} identity=new",
                dataset.id
            );
            return Ok(LoadedEvaluation {
                state: AnnotationState::new(),
                identity: EvaluationIdentity::New,
                dropped_positions: Vec::new(),
                source: None,
            });
        };

        let (state, dropped_positions) = hydrate(&evaluation, dataset);
        if !dropped_positions.is_empty() {
            warn!(
                "event=evaluation_load module=reconciler status=partial dataset_id={} evaluation_id={} dropped_positions={}",
                dataset.id,
                evaluation.id,
                dropped_positions.len()
            );
        }

        let identity = EvaluationIdentity::Existing {
            id: evaluation.id,
            status: evaluation.status,
        };
        self.identities.insert(dataset.id, identity);
        info!(
            "event=evaluation_load module=reconciler status=ok dataset_id={} evaluation_id={} marks={}",
            dataset.id,
            evaluation.id,
            state.len()
        );
        Ok(LoadedEvaluation {
            state,
            identity,
            dropped_positions,
            source: Some(evaluation),
        })
    }

    /// Saves `state` for `dataset_id` with `target` status.
    ///
    /// # Errors
    /// - `State(NothingToSave)` when there are no marks and no declaration.
    /// - `Persistence` when the evaluation write fails.
    pub fn save(
        &mut self,
        dataset_id: DatasetId,
        state: &AnnotationState,
        target: EvaluationStatus,
        meta: SaveMeta,
    ) -> Result<SaveOutcome, ReconcileError> {
        state.ensure_savable()?;

        let request = EvaluationRequest {
            dataset_id,
            change_points: state.to_records(meta.confidence),
            no_change_points: state.no_change_points(),
            confidence: meta.confidence,
            time_spent: meta.time_spent,
            status: target,
        };

        let (evaluation, action) = match self.identity(dataset_id) {
            EvaluationIdentity::Existing { id, .. } if target == EvaluationStatus::Completed => {
                let evaluation = Evaluation::with_id(id, self.user_id.clone(), request);
                (evaluation, SaveAction::Updated)
            }
            _ => (
                Evaluation::from_request(self.user_id.clone(), request),
                SaveAction::Created,
            ),
        };

        let written = match action {
            SaveAction::Updated => self.evaluations.update_evaluation(&evaluation),
            SaveAction::Created => self.evaluations.create_evaluation(&evaluation).map(|_| ()),
        };
        if let Err(err) = written {
            error!(
                "event=evaluation_save module=reconciler status=error dataset_id={} action={} error={}",
                dataset_id,
                action.as_str(),
                err
            );
            return Err(err.into());
        }

        self.identities.insert(
            dataset_id,
            EvaluationIdentity::Existing {
                id: evaluation.id,
                status: target,
            },
        );
        info!(
            "event=evaluation_save module=reconciler status=ok dataset_id={} evaluation_id={} action={} target={} marks={}",
            dataset_id,
            evaluation.id,
            action.as_str(),
            target.as_str(),
            evaluation.change_points.len()
        );

        let assignment_completed =
            target == EvaluationStatus::Completed && self.complete_assignment(dataset_id);

        Ok(SaveOutcome {
            evaluation,
            action,
            assignment_completed,
        })
    }

    fn complete_assignment(&self, dataset_id: DatasetId) -> bool {
        match self
            .assignments
            .update_status(&self.user_id, dataset_id, AssignmentStatus::Completed)
        {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    "event=assignment_complete module=reconciler status=error dataset_id={} error={}",
                    dataset_id, err
                );
                false
            }
        }
    }
}

impl SaveAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "create",
            Self::Updated => "update",
        }
    }
}

fn hydrate(evaluation: &Evaluation, dataset: &Dataset) -> (AnnotationState, Vec<usize>) {
    if evaluation.no_change_points {
        return (AnnotationState::declared_none(), Vec::new());
    }

    let mut dropped = Vec::new();
    let mut annotations = Vec::with_capacity(evaluation.change_points.len());
    for record in &evaluation.change_points {
        match dataset.sample_value(record.position) {
            Some(value) => annotations.push(ChangePointAnnotation {
                position: record.position,
                kind: record.kind,
                value,
                notes: record.notes.clone(),
            }),
            None => dropped.push(record.position),
        }
    }
    (AnnotationState::with_annotations(annotations), dropped)
}

#[cfg(test)]
mod tests {
    use super::{
        EvaluationIdentity, EvaluationReconciler, ReconcileError, SaveAction, SaveMeta,
    };
    use crate::annotation::{AnnotationState, StateError};
    use crate::db::open_db_in_memory;
    use crate::model::annotation::{ChangePointAnnotation, ChangePointType};
    use crate::model::assignment::AssignmentStatus;
    use crate::model::dataset::{Dataset, DatasetId, DatasetStatus, Sample};
    use crate::model::evaluation::{Evaluation, EvaluationId, EvaluationStatus};
    use crate::repo::assignment_repo::{AssignmentRepository, SqliteAssignmentRepository};
    use crate::repo::dataset_repo::{DatasetRepository, SqliteDatasetRepository};
    use crate::repo::evaluation_repo::{EvaluationRepository, SqliteEvaluationRepository};
    use crate::repo::{RepoError, RepoResult};
    use rusqlite::Connection;
    use uuid::Uuid;

    const USER: &str = "reviewer-1";
    const META: SaveMeta = SaveMeta {
        confidence: 0.8,
        time_spent: 42,
    };

    fn dataset(length: usize) -> Dataset {
        let data: Vec<Sample> = (0..length)
            .map(|index| Sample::new(index as i64, index as f64 * 0.5))
            .collect();
        Dataset {
            id: Uuid::new_v4(),
            name: "series".to_string(),
            description: None,
            category: None,
            difficulty: None,
            length,
            data,
            min_value: 0.0,
            max_value: (length.saturating_sub(1)) as f64 * 0.5,
            mean_value: 1.0,
            std_value: 1.0,
            expected_change_points: None,
            status: DatasetStatus::Active,
            tags: Vec::new(),
        }
    }

    fn seeded(conn: &Connection, length: usize) -> Dataset {
        let dataset = dataset(length);
        SqliteDatasetRepository::try_new(conn)
            .unwrap()
            .create_dataset(&dataset)
            .unwrap();
        dataset
    }

    fn reconciler(
        conn: &Connection,
    ) -> EvaluationReconciler<SqliteEvaluationRepository<'_>, SqliteAssignmentRepository<'_>> {
        EvaluationReconciler::new(
            SqliteEvaluationRepository::try_new(conn).unwrap(),
            SqliteAssignmentRepository::try_new(conn).unwrap(),
            USER,
        )
    }

    fn marked(positions: &[usize]) -> AnnotationState {
        AnnotationState::with_annotations(
            positions
                .iter()
                .map(|&position| ChangePointAnnotation::new(position, ChangePointType::Mean, 0.0)),
        )
    }

    #[test]
    fn load_without_history_is_new_and_empty() {
        let conn = open_db_in_memory().unwrap();
        let dataset = seeded(&conn, 10);
        let mut reconciler = reconciler(&conn);

        let loaded = reconciler.load(&dataset).unwrap();
        assert_eq!(loaded.identity, EvaluationIdentity::New);
        assert!(loaded.state.is_empty());
        assert!(!loaded.state.no_change_points());
    }

    #[test]
    fn draft_saves_create_and_completed_save_updates() {
        let conn = open_db_in_memory().unwrap();
        let dataset = seeded(&conn, 10);
        SqliteAssignmentRepository::try_new(&conn)
            .unwrap()
            .assign(USER, dataset.id)
            .unwrap();
        let mut reconciler = reconciler(&conn);
        reconciler.load(&dataset).unwrap();

        let first = reconciler
            .save(dataset.id, &marked(&[3]), EvaluationStatus::Draft, META)
            .unwrap();
        assert_eq!(first.action, SaveAction::Created);
        assert!(!first.assignment_completed);

        let second = reconciler
            .save(dataset.id, &marked(&[3, 7]), EvaluationStatus::Completed, META)
            .unwrap();
        assert_eq!(second.action, SaveAction::Updated);
        assert_eq!(second.evaluation.id, first.evaluation.id);
        assert!(second.assignment_completed);

        let evaluations = SqliteEvaluationRepository::try_new(&conn).unwrap();
        let stored = evaluations.list_for_dataset(dataset.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, EvaluationStatus::Completed);

        let assignment = SqliteAssignmentRepository::try_new(&conn)
            .unwrap()
            .get_assignment(USER, dataset.id)
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Completed);
        assert!(assignment.completed_at.is_some());
    }

    #[test]
    fn repeated_draft_saves_each_create_a_record() {
        let conn = open_db_in_memory().unwrap();
        let dataset = seeded(&conn, 10);
        let mut reconciler = reconciler(&conn);

        reconciler
            .save(dataset.id, &marked(&[1]), EvaluationStatus::Draft, META)
            .unwrap();
        let second = reconciler
            .save(dataset.id, &marked(&[1, 2]), EvaluationStatus::Draft, META)
            .unwrap();
        assert_eq!(second.action, SaveAction::Created);

        let stored = SqliteEvaluationRepository::try_new(&conn)
            .unwrap()
            .list_for_dataset(dataset.id)
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn load_hydrates_values_and_drops_out_of_range_positions() {
        let conn = open_db_in_memory().unwrap();
        let long = seeded(&conn, 10);
        let mut reconciler = reconciler(&conn);
        reconciler
            .save(long.id, &marked(&[2, 9]), EvaluationStatus::Draft, META)
            .unwrap();

        let mut shorter = long.clone();
        shorter.data.truncate(5);
        shorter.length = 5;

        let loaded = reconciler.load(&shorter).unwrap();
        assert_eq!(loaded.dropped_positions, vec![9]);
        assert_eq!(loaded.state.len(), 1);
        let mark = loaded.state.annotation_at(2).unwrap();
        assert_eq!(mark.value, 1.0);
        assert!(matches!(
            loaded.identity,
            EvaluationIdentity::Existing {
                status: EvaluationStatus::Draft,
                ..
            }
        ));
    }

    #[test]
    fn declared_none_round_trips_through_load() {
        let conn = open_db_in_memory().unwrap();
        let dataset = seeded(&conn, 4);
        let mut reconciler = reconciler(&conn);
        reconciler
            .save(
                dataset.id,
                &AnnotationState::declared_none(),
                EvaluationStatus::Draft,
                META,
            )
            .unwrap();

        let loaded = reconciler.load(&dataset).unwrap();
        assert!(loaded.state.no_change_points());
        assert!(loaded.state.is_empty());
    }

    #[test]
    fn empty_state_is_rejected_before_any_write() {
        let conn = open_db_in_memory().unwrap();
        let dataset = seeded(&conn, 4);
        let mut reconciler = reconciler(&conn);

        let err = reconciler
            .save(dataset.id, &AnnotationState::new(), EvaluationStatus::Draft, META)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::State(StateError::NothingToSave)));
        assert_eq!(reconciler.identity(dataset.id), EvaluationIdentity::New);
    }

    #[test]
    fn missing_assignment_does_not_fail_completed_save() {
        let conn = open_db_in_memory().unwrap();
        let dataset = seeded(&conn, 4);
        let mut reconciler = reconciler(&conn);

        let outcome = reconciler
            .save(dataset.id, &marked(&[1]), EvaluationStatus::Completed, META)
            .unwrap();
        assert_eq!(outcome.action, SaveAction::Created);
        assert!(!outcome.assignment_completed);
    }

    struct RejectingEvaluations;

    impl EvaluationRepository for RejectingEvaluations {
        fn create_evaluation(&self, _evaluation: &Evaluation) -> RepoResult<EvaluationId> {
            Err(RepoError::InvalidData("store offline".to_string()))
        }

        fn update_evaluation(&self, _evaluation: &Evaluation) -> RepoResult<()> {
            Err(RepoError::InvalidData("store offline".to_string()))
        }

        fn get_evaluation(&self, _id: EvaluationId) -> RepoResult<Option<Evaluation>> {
            Ok(None)
        }

        fn latest_for(&self, _user_id: &str, _dataset_id: DatasetId) -> RepoResult<Option<Evaluation>> {
            Ok(None)
        }

        fn list_for_dataset(&self, _dataset_id: DatasetId) -> RepoResult<Vec<Evaluation>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn persistence_failure_keeps_identity_and_surfaces_message() {
        let conn = open_db_in_memory().unwrap();
        let dataset = seeded(&conn, 4);
        let mut reconciler = EvaluationReconciler::new(
            RejectingEvaluations,
            SqliteAssignmentRepository::try_new(&conn).unwrap(),
            USER,
        );
        let state = marked(&[1]);

        let err = reconciler
            .save(dataset.id, &state, EvaluationStatus::Completed, META)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Persistence(_)));
        assert!(err.to_string().contains("store offline"));
        assert_eq!(reconciler.identity(dataset.id), EvaluationIdentity::New);
        assert_eq!(state.len(), 1);
    }
}
