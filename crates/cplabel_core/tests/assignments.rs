use cplabel_core::db::open_db_in_memory;
use cplabel_core::{
    AssignmentRepository, AssignmentService, AssignmentStatus, DatasetService, IngestMode,
    IngestOptions, RepoError, SqliteAssignmentRepository, SqliteDatasetRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn seed_datasets(conn: &Connection) -> Vec<Uuid> {
    let service = DatasetService::new(SqliteDatasetRepository::try_new(conn).unwrap());
    let options = IngestOptions {
        mode: IngestMode::Multiple,
        ..IngestOptions::default()
    };
    service
        .ingest("i,a,b\n0,1,2\n1,3,4\n", &options)
        .unwrap()
        .datasets
        .iter()
        .map(|dataset| dataset.id)
        .collect()
}

#[test]
fn assign_is_pending_and_repeat_keeps_existing_row() {
    let conn = open_db_in_memory().unwrap();
    let ids = seed_datasets(&conn);
    let service = AssignmentService::new(SqliteAssignmentRepository::try_new(&conn).unwrap());

    let first = service.assign("ana", ids[0]).unwrap();
    assert_eq!(first.status, AssignmentStatus::Pending);
    assert!(first.completed_at.is_none());

    service
        .update_status("ana", ids[0], AssignmentStatus::InProgress)
        .unwrap();
    let again = service.assign("ana", ids[0]).unwrap();
    assert_eq!(again.status, AssignmentStatus::InProgress);
    assert_eq!(again.assigned_at, first.assigned_at);
}

#[test]
fn completed_sets_timestamp_and_reopening_clears_it() {
    let conn = open_db_in_memory().unwrap();
    let ids = seed_datasets(&conn);
    let repo = SqliteAssignmentRepository::try_new(&conn).unwrap();
    repo.assign("ana", ids[1]).unwrap();

    let done = repo
        .update_status("ana", ids[1], AssignmentStatus::Completed)
        .unwrap();
    assert!(done.completed_at.is_some());

    let reopened = repo
        .update_status("ana", ids[1], AssignmentStatus::InProgress)
        .unwrap();
    assert!(reopened.completed_at.is_none());
}

#[test]
fn listing_is_per_user() {
    let conn = open_db_in_memory().unwrap();
    let ids = seed_datasets(&conn);
    let repo = SqliteAssignmentRepository::try_new(&conn).unwrap();
    repo.assign("ana", ids[0]).unwrap();
    repo.assign("ana", ids[1]).unwrap();
    repo.assign("ben", ids[1]).unwrap();

    assert_eq!(repo.list_for_user("ana").unwrap().len(), 2);
    assert_eq!(repo.list_for_user("ben").unwrap().len(), 1);
    assert!(repo.list_for_user("cy").unwrap().is_empty());
}

#[test]
fn updating_an_unknown_pair_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let ids = seed_datasets(&conn);
    let repo = SqliteAssignmentRepository::try_new(&conn).unwrap();

    let err = repo
        .update_status("ghost", ids[0], AssignmentStatus::Completed)
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "assignment", .. }));
}

#[test]
fn blank_user_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let ids = seed_datasets(&conn);
    let repo = SqliteAssignmentRepository::try_new(&conn).unwrap();

    assert!(matches!(
        repo.assign("  ", ids[0]),
        Err(RepoError::InvalidData(_))
    ));
}
