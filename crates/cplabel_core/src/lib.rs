//! Core domain logic for change-point labeling.
//! This crate owns ingestion, plot mapping, annotation state, and the
//! evaluation save rules; boundary crates only translate payloads.

pub mod annotation;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod repo;
pub mod service;

pub use annotation::{
    AnnotationObserver, AnnotationSession, AnnotationState, ClickOutcome, StateError,
    SubscriptionId,
};
pub use config::{ConfigError, LabelingConfig, PlotAreaConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use ingest::{ingest, IngestMode, IngestOptions, IngestOutcome, IngestionError};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use mapping::{Pager, PlotArea, SampleMapper};
pub use model::annotation::{ChangePointAnnotation, ChangePointType};
pub use model::assignment::{Assignment, AssignmentStatus};
pub use model::dataset::{Dataset, DatasetId, DatasetStatus, Sample};
pub use model::evaluation::{
    ChangePointRecord, Evaluation, EvaluationId, EvaluationRequest, EvaluationStatus, UserId,
};
pub use repo::assignment_repo::{AssignmentRepository, SqliteAssignmentRepository};
pub use repo::dataset_repo::{DatasetListQuery, DatasetRepository, SqliteDatasetRepository};
pub use repo::evaluation_repo::{EvaluationRepository, SqliteEvaluationRepository};
pub use repo::{RepoError, RepoResult};
pub use service::assignment_service::AssignmentService;
pub use service::dataset_service::{DatasetService, DatasetServiceError, IngestReport};
pub use service::reconciler::{
    EvaluationIdentity, EvaluationReconciler, LoadedEvaluation, ReconcileError, SaveAction,
    SaveMeta, SaveOutcome,
};

/// Minimal health-check API for boundary wiring.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
