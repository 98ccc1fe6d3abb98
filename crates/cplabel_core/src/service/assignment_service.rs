//! Assignment use-case service.
//!
//! Thin wrapper over the assignment store: creating work items and moving
//! them through `pending -> in_progress -> completed`.

use crate::model::assignment::{Assignment, AssignmentStatus};
use crate::model::dataset::DatasetId;
use crate::repo::assignment_repo::AssignmentRepository;
use crate::repo::RepoResult;
use log::info;

pub struct AssignmentService<R: AssignmentRepository> {
    repo: R,
}

impl<R: AssignmentRepository> AssignmentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn assign(&self, user_id: &str, dataset_id: DatasetId) -> RepoResult<Assignment> {
        let assignment = self.repo.assign(user_id, dataset_id)?;
        info!(
            "event=assignment_create module=service status=ok dataset_id={} assignment_status={}",
            dataset_id,
            assignment.status.as_str()
        );
        Ok(assignment)
    }

    pub fn get(&self, user_id: &str, dataset_id: DatasetId) -> RepoResult<Option<Assignment>> {
        self.repo.get_assignment(user_id, dataset_id)
    }

    pub fn list_for_user(&self, user_id: &str) -> RepoResult<Vec<Assignment>> {
        self.repo.list_for_user(user_id)
    }

    pub fn update_status(
        &self,
        user_id: &str,
        dataset_id: DatasetId,
        status: AssignmentStatus,
    ) -> RepoResult<Assignment> {
        let assignment = self.repo.update_status(user_id, dataset_id, status)?;
        info!(
            "event=assignment_status module=service status=ok dataset_id={} assignment_status={}",
            dataset_id,
            status.as_str()
        );
        Ok(assignment)
    }
}
