//! Dataset use-case service.
//!
//! # Responsibility
//! - Run ingestion and persist the produced datasets as `active`.
//! - Provide administrative reads, status changes and deletion.
//!
//! # Invariants
//! - A multiple-mode batch is persisted all-or-nothing; column-level
//!   failures are already filtered out by ingestion.

use crate::ingest::report::IngestionLog;
use crate::ingest::{ingest, IngestMode, IngestOptions, IngestionError};
use crate::model::dataset::{Dataset, DatasetId, DatasetStatus};
use crate::repo::dataset_repo::{DatasetListQuery, DatasetRepository};
use crate::repo::{RepoError, RepoResult};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for dataset use-cases.
#[derive(Debug)]
pub enum DatasetServiceError {
    Ingestion(IngestionError),
    DatasetNotFound(DatasetId),
    Repo(RepoError),
}

impl Display for DatasetServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ingestion(err) => write!(f, "{err}"),
            Self::DatasetNotFound(id) => write!(f, "dataset not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DatasetServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ingestion(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::DatasetNotFound(_) => None,
        }
    }
}

impl From<IngestionError> for DatasetServiceError {
    fn from(value: IngestionError) -> Self {
        Self::Ingestion(value)
    }
}

impl From<RepoError> for DatasetServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

fn for_dataset(id: DatasetId) -> impl FnOnce(RepoError) -> DatasetServiceError {
    move |err| match err {
        RepoError::NotFound { .. } => DatasetServiceError::DatasetNotFound(id),
        other => DatasetServiceError::Repo(other),
    }
}

/// Outcome of one ingest call: "`created` of `attempted` created".
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub mode: IngestMode,
    pub created: usize,
    pub attempted: usize,
    pub datasets: Vec<Dataset>,
    pub log: IngestionLog,
}

impl IngestReport {
    pub fn summary(&self) -> String {
        format!("{} of {} created", self.created, self.attempted)
    }
}

/// Dataset service facade over repository implementations.
pub struct DatasetService<R: DatasetRepository> {
    repo: R,
}

impl<R: DatasetRepository> DatasetService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Parses `raw`, then persists every produced dataset.
    pub fn ingest(
        &self,
        raw: &str,
        options: &IngestOptions,
    ) -> Result<IngestReport, DatasetServiceError> {
        let outcome = ingest(raw, options)?;
        if let Err(err) = self.repo.create_datasets(&outcome.datasets) {
            error!(
                "event=dataset_persist module=service status=error count={} error={}",
                outcome.datasets.len(),
                err
            );
            return Err(err.into());
        }

        let report = IngestReport {
            mode: options.mode,
            created: outcome.created(),
            attempted: outcome.attempted,
            datasets: outcome.datasets,
            log: outcome.report,
        };
        info!(
            "event=dataset_persist module=service status=ok created={} attempted={} coercions={} dropped_rows={}",
            report.created,
            report.attempted,
            report.log.coercions.len(),
            report.log.dropped_rows.len()
        );
        Ok(report)
    }

    pub fn get_dataset(&self, id: DatasetId) -> RepoResult<Option<Dataset>> {
        self.repo.get_dataset(id)
    }

    /// Gets one dataset or fails with `DatasetNotFound`.
    pub fn require_dataset(&self, id: DatasetId) -> Result<Dataset, DatasetServiceError> {
        self.repo
            .get_dataset(id)?
            .ok_or(DatasetServiceError::DatasetNotFound(id))
    }

    pub fn list_datasets(&self, query: &DatasetListQuery) -> RepoResult<Vec<Dataset>> {
        self.repo.list_datasets(query)
    }

    /// Administrative status change; the only post-ingestion mutation.
    pub fn set_status(
        &self,
        id: DatasetId,
        status: DatasetStatus,
    ) -> Result<Dataset, DatasetServiceError> {
        self.repo
            .update_status(id, status)
            .map_err(for_dataset(id))?;
        info!(
            "event=dataset_status module=service status=ok dataset_id={} new_status={}",
            id,
            status.as_str()
        );
        self.require_dataset(id)
    }

    pub fn delete_dataset(&self, id: DatasetId) -> Result<(), DatasetServiceError> {
        self.repo.delete_dataset(id).map_err(for_dataset(id))?;
        info!("event=dataset_delete module=service status=ok dataset_id={id}");
        Ok(())
    }
}
