use cplabel_core::db::open_db_in_memory;
use cplabel_core::{
    AnnotationSession, AssignmentRepository, AssignmentService, AssignmentStatus,
    ChangePointType, ClickOutcome, Dataset, DatasetService, EvaluationIdentity,
    EvaluationReconciler, EvaluationRepository, EvaluationStatus, IngestOptions, LabelingConfig,
    ReconcileError, SaveAction, SaveMeta, SqliteAssignmentRepository, SqliteDatasetRepository,
    SqliteEvaluationRepository, StateError,
};
use rusqlite::Connection;

const REVIEWER: &str = "reviewer-7";
const META: SaveMeta = SaveMeta {
    confidence: 0.9,
    time_spent: 120,
};

fn ingest_series(conn: &Connection, samples: usize) -> Dataset {
    let mut raw = String::from("index,value\n");
    for index in 0..samples {
        raw.push_str(&format!("{index},{}\n", (index % 7) as f64));
    }
    let service = DatasetService::new(SqliteDatasetRepository::try_new(conn).unwrap());
    let mut report = service.ingest(&raw, &IngestOptions::default()).unwrap();
    report.datasets.remove(0)
}

fn reconciler(
    conn: &Connection,
) -> EvaluationReconciler<SqliteEvaluationRepository<'_>, SqliteAssignmentRepository<'_>> {
    EvaluationReconciler::new(
        SqliteEvaluationRepository::try_new(conn).unwrap(),
        SqliteAssignmentRepository::try_new(conn).unwrap(),
        REVIEWER,
    )
}

#[test]
fn draft_then_completed_updates_the_same_evaluation() {
    let conn = open_db_in_memory().unwrap();
    let dataset = ingest_series(&conn, 200);
    AssignmentService::new(SqliteAssignmentRepository::try_new(&conn).unwrap())
        .assign(REVIEWER, dataset.id)
        .unwrap();

    let mut session = AnnotationSession::for_dataset(&dataset, &LabelingConfig::default()).unwrap();
    let mut reconciler = reconciler(&conn);
    let loaded = reconciler.load(&dataset).unwrap();
    assert_eq!(loaded.identity, EvaluationIdentity::New);
    session.replace_state(loaded.state);

    assert_eq!(session.click(400.0), Some(ClickOutcome::Pending(50)));
    session.commit_type(ChangePointType::Mean).unwrap();

    let draft = reconciler
        .save(dataset.id, session.state(), EvaluationStatus::Draft, META)
        .unwrap();
    assert_eq!(draft.action, SaveAction::Created);
    assert_eq!(draft.evaluation.change_points[0].position, 50);

    session.mapper_mut().pager_mut().next_page();
    assert_eq!(session.click(400.0), Some(ClickOutcome::Pending(150)));
    session.commit_type(ChangePointType::Variance).unwrap();

    let completed = reconciler
        .save(dataset.id, session.state(), EvaluationStatus::Completed, META)
        .unwrap();
    assert_eq!(completed.action, SaveAction::Updated);
    assert_eq!(completed.evaluation.id, draft.evaluation.id);
    assert!(completed.assignment_completed);

    let evaluations = SqliteEvaluationRepository::try_new(&conn).unwrap();
    let stored = evaluations.list_for_dataset(dataset.id).unwrap();
    assert_eq!(stored.len(), 1);
    let positions: Vec<usize> = stored[0].change_points.iter().map(|p| p.position).collect();
    assert_eq!(positions, vec![50, 150]);
    assert_eq!(stored[0].status, EvaluationStatus::Completed);

    let assignment = SqliteAssignmentRepository::try_new(&conn)
        .unwrap()
        .get_assignment(REVIEWER, dataset.id)
        .unwrap()
        .unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Completed);
}

#[test]
fn a_fresh_reconciler_resumes_from_the_latest_evaluation() {
    let conn = open_db_in_memory().unwrap();
    let dataset = ingest_series(&conn, 30);

    let mut first = reconciler(&conn);
    let mut session = AnnotationSession::for_dataset(&dataset, &LabelingConfig::default()).unwrap();
    session.toggle_at(10);
    session.commit_type(ChangePointType::Trend).unwrap();
    session.set_note(10, "slope flips").unwrap();
    first
        .save(dataset.id, session.state(), EvaluationStatus::Draft, META)
        .unwrap();

    let mut second = reconciler(&conn);
    let loaded = second.load(&dataset).unwrap();
    assert!(matches!(
        loaded.identity,
        EvaluationIdentity::Existing {
            status: EvaluationStatus::Draft,
            ..
        }
    ));
    let mark = loaded.state.annotation_at(10).unwrap();
    assert_eq!(mark.kind, ChangePointType::Trend);
    assert_eq!(mark.value, dataset.sample_value(10).unwrap());
    assert_eq!(mark.notes, "slope flips");
}

#[test]
fn empty_state_is_not_saved() {
    let conn = open_db_in_memory().unwrap();
    let dataset = ingest_series(&conn, 10);
    let mut reconciler = reconciler(&conn);
    let session = AnnotationSession::for_dataset(&dataset, &LabelingConfig::default()).unwrap();

    let err = reconciler
        .save(dataset.id, session.state(), EvaluationStatus::Completed, META)
        .unwrap_err();
    assert!(matches!(err, ReconcileError::State(StateError::NothingToSave)));
    assert!(SqliteEvaluationRepository::try_new(&conn)
        .unwrap()
        .list_for_dataset(dataset.id)
        .unwrap()
        .is_empty());
}

#[test]
fn declaring_no_change_points_is_savable() {
    let conn = open_db_in_memory().unwrap();
    let dataset = ingest_series(&conn, 10);
    let mut reconciler = reconciler(&conn);
    let mut session = AnnotationSession::for_dataset(&dataset, &LabelingConfig::default()).unwrap();
    session.set_no_change_points(true);

    let meta = SaveMeta::with_default_confidence(&LabelingConfig::default(), 15);
    let outcome = reconciler
        .save(dataset.id, session.state(), EvaluationStatus::Completed, meta)
        .unwrap();
    assert!(outcome.evaluation.no_change_points);
    assert_eq!(outcome.evaluation.confidence, 1.0);
    assert!(outcome.evaluation.change_points.is_empty());
}

#[test]
fn saving_against_a_deleted_dataset_surfaces_the_store_error() {
    let conn = open_db_in_memory().unwrap();
    let dataset = ingest_series(&conn, 10);
    let mut reconciler = reconciler(&conn);
    let mut session = AnnotationSession::for_dataset(&dataset, &LabelingConfig::default()).unwrap();
    session.toggle_at(3);
    session.commit_type(ChangePointType::Level).unwrap();

    DatasetService::new(SqliteDatasetRepository::try_new(&conn).unwrap())
        .delete_dataset(dataset.id)
        .unwrap();

    let before = session.state().clone();
    let err = reconciler
        .save(dataset.id, session.state(), EvaluationStatus::Draft, META)
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Persistence(_)));
    assert!(!err.to_string().is_empty());
    assert_eq!(session.state(), &before);
    assert_eq!(reconciler.identity(dataset.id), EvaluationIdentity::New);
}

#[test]
fn oversized_time_spent_fails_the_save_and_keeps_the_pair_loadable() {
    let conn = open_db_in_memory().unwrap();
    let dataset = ingest_series(&conn, 10);
    let mut reconciler = reconciler(&conn);
    let mut session = AnnotationSession::for_dataset(&dataset, &LabelingConfig::default()).unwrap();
    session.set_no_change_points(true);

    let oversized = SaveMeta {
        confidence: 0.5,
        time_spent: u64::MAX,
    };
    let err = reconciler
        .save(dataset.id, session.state(), EvaluationStatus::Draft, oversized)
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Persistence(_)));
    assert!(err.to_string().contains("time spent"));

    reconciler
        .save(dataset.id, session.state(), EvaluationStatus::Draft, META)
        .unwrap();
    let loaded = reconciler.load(&dataset).unwrap();
    assert!(loaded.state.no_change_points());
    assert_eq!(loaded.source.map(|evaluation| evaluation.time_spent), Some(120));
}
