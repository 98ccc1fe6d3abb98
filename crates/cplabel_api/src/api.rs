//! Use-case API for UI and service boundaries.
//!
//! # Responsibility
//! - Expose ingestion, evaluation load/save and assignment updates as
//!   plain functions over a database path and JSON bodies.
//! - Translate every core failure into an `ok = false` envelope.
//!
//! # Invariants
//! - Exported functions never panic.
//! - Error messages are the core error text, unmodified, behind a
//!   `<operation> failed:` prefix.
//! - Each call opens its own connection; no state survives between calls,
//!   so evaluation identity is re-derived from the store on every save.

use cplabel_core::db::open_db;
use cplabel_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AnnotationState, AssignmentService, AssignmentStatus, ChangePointAnnotation, Dataset,
    DatasetService, EvaluationReconciler, EvaluationRequest, EvaluationStatus, IngestOptions,
    LoadedEvaluation, SaveAction, SaveMeta, SqliteAssignmentRepository, SqliteDatasetRepository,
    SqliteEvaluationRepository,
};
use log::warn;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Health check.
pub fn ping() -> String {
    ping_inner().to_owned()
}

pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Starts core file logging.
///
/// Returns an empty string on success and the error text otherwise. Safe
/// to repeat with the same arguments.
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Generic result envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub ok: bool,
    /// Id of the record the action produced or touched.
    pub id: Option<String>,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, id: String) -> Self {
        Self {
            ok: true,
            id: Some(id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

/// Result of `ingest_csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub ok: bool,
    pub dataset_ids: Vec<String>,
    pub created: usize,
    pub attempted: usize,
    /// Cells replaced by a fallback index or a `0` value.
    pub coerced_cells: usize,
    /// `"K of N created"` on success, the error text otherwise.
    pub message: String,
}

impl IngestResponse {
    fn failure(message: String) -> Self {
        Self {
            ok: false,
            dataset_ids: Vec::new(),
            created: 0,
            attempted: 0,
            coerced_cells: 0,
            message,
        }
    }
}

/// Result of `load_evaluation`: the reviewer's latest verdict, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationEnvelope {
    pub ok: bool,
    pub evaluation_id: Option<String>,
    /// `draft|completed` of the loaded record.
    pub status: Option<String>,
    /// Hydrated verdict in request-body shape; `None` for a fresh start.
    pub evaluation: Option<EvaluationRequest>,
    /// Stored positions that no longer fit the dataset.
    pub dropped_positions: Vec<usize>,
    pub message: String,
}

impl EvaluationEnvelope {
    fn failure(message: String) -> Self {
        Self {
            ok: false,
            evaluation_id: None,
            status: None,
            evaluation: None,
            dropped_positions: Vec::new(),
            message,
        }
    }
}

/// Ingests delimited text and persists the produced datasets.
///
/// `options_json` is an `IngestOptions` body; blank means defaults
/// (single mode, first value column).
pub fn ingest_csv(db_path: String, raw_text: String, options_json: String) -> IngestResponse {
    let options = match parse_options(&options_json) {
        Ok(options) => options,
        Err(err) => return IngestResponse::failure(format!("ingest_csv failed: {err}")),
    };

    let result = with_connection(&db_path, |conn| {
        let repo = SqliteDatasetRepository::try_new(conn).map_err(|err| err.to_string())?;
        DatasetService::new(repo)
            .ingest(&raw_text, &options)
            .map_err(|err| err.to_string())
    });

    match result {
        Ok(report) => IngestResponse {
            ok: true,
            dataset_ids: report
                .datasets
                .iter()
                .map(|dataset| dataset.id.to_string())
                .collect(),
            created: report.created,
            attempted: report.attempted,
            coerced_cells: report.log.coercions.len(),
            message: report.summary(),
        },
        Err(err) => IngestResponse::failure(format!("ingest_csv failed: {err}")),
    }
}

/// Loads the latest evaluation of `user_id` for `dataset_id`.
pub fn load_evaluation(db_path: String, user_id: String, dataset_id: String) -> EvaluationEnvelope {
    let result = with_connection(&db_path, |conn| {
        let dataset = require_dataset(conn, &dataset_id)?;
        reconciler(conn, &user_id)?
            .load(&dataset)
            .map_err(|err| err.to_string())
    });

    match result {
        Ok(LoadedEvaluation {
            state,
            dropped_positions,
            source: Some(evaluation),
            ..
        }) => {
            let request = EvaluationRequest {
                dataset_id: evaluation.dataset_id,
                change_points: state.to_records(evaluation.confidence),
                no_change_points: state.no_change_points(),
                confidence: evaluation.confidence,
                time_spent: evaluation.time_spent,
                status: evaluation.status,
            };
            EvaluationEnvelope {
                ok: true,
                evaluation_id: Some(evaluation.id.to_string()),
                status: Some(evaluation.status.as_str().to_string()),
                evaluation: Some(request),
                dropped_positions,
                message: "Evaluation loaded.".to_string(),
            }
        }
        Ok(LoadedEvaluation { source: None, .. }) => EvaluationEnvelope {
            ok: true,
            evaluation_id: None,
            status: None,
            evaluation: None,
            dropped_positions: Vec::new(),
            message: "No previous evaluation.".to_string(),
        },
        Err(err) => EvaluationEnvelope::failure(format!("load_evaluation failed: {err}")),
    }
}

/// Saves an evaluation request body for `user_id`.
///
/// The latest stored evaluation is the known identity: a `completed` save
/// updates it, any other save creates a new record.
pub fn save_evaluation(db_path: String, user_id: String, request_json: String) -> ActionResponse {
    let request: EvaluationRequest = match serde_json::from_str(&request_json) {
        Ok(request) => request,
        Err(err) => {
            return ActionResponse::failure(format!("save_evaluation failed: invalid body: {err}"))
        }
    };

    let result = with_connection(&db_path, |conn| {
        let dataset = require_dataset(conn, &request.dataset_id.to_string())?;
        let state = state_from_request(&dataset, &request)?;
        let mut reconciler = reconciler(conn, &user_id)?;
        reconciler.load(&dataset).map_err(|err| err.to_string())?;
        reconciler
            .save(
                dataset.id,
                &state,
                request.status,
                SaveMeta {
                    confidence: request.confidence,
                    time_spent: request.time_spent,
                },
            )
            .map_err(|err| err.to_string())
    });

    match result {
        Ok(outcome) => {
            let message = match outcome.action {
                SaveAction::Updated => "Evaluation updated.",
                SaveAction::Created => "Evaluation created.",
            };
            if outcome.evaluation.status == EvaluationStatus::Completed
                && !outcome.assignment_completed
            {
                warn!(
                    "event=api_save module=api status=partial dataset_id={} reason=assignment_not_updated",
                    outcome.evaluation.dataset_id
                );
            }
            ActionResponse::success(message, outcome.evaluation.id.to_string())
        }
        Err(err) => ActionResponse::failure(format!("save_evaluation failed: {err}")),
    }
}

/// Creates a `pending` assignment; an existing one is returned unchanged.
pub fn assign_dataset(db_path: String, user_id: String, dataset_id: String) -> ActionResponse {
    let result = with_connection(&db_path, |conn| {
        let id = parse_id(&dataset_id)?;
        assignment_service(conn)?
            .assign(&user_id, id)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(assignment) => ActionResponse::success(
            format!("Assignment {}.", assignment.status.as_str()),
            assignment.dataset_id.to_string(),
        ),
        Err(err) => ActionResponse::failure(format!("assign_dataset failed: {err}")),
    }
}

/// Sets the acting user's assignment status for one dataset.
pub fn update_assignment_status(
    db_path: String,
    user_id: String,
    dataset_id: String,
    status: String,
) -> ActionResponse {
    let Some(status) = AssignmentStatus::parse(&status) else {
        return ActionResponse::failure(format!(
            "update_assignment_status failed: unsupported status `{}`; expected pending|in_progress|completed",
            status.trim()
        ));
    };
    let result = with_connection(&db_path, |conn| {
        let id = parse_id(&dataset_id)?;
        assignment_service(conn)?
            .update_status(&user_id, id, status)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(assignment) => ActionResponse::success(
            format!("Assignment {}.", assignment.status.as_str()),
            assignment.dataset_id.to_string(),
        ),
        Err(err) => ActionResponse::failure(format!("update_assignment_status failed: {err}")),
    }
}

fn parse_options(options_json: &str) -> Result<IngestOptions, String> {
    if options_json.trim().is_empty() {
        return Ok(IngestOptions::default());
    }
    serde_json::from_str(options_json).map_err(|err| format!("invalid options: {err}"))
}

fn parse_id(value: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value.trim()).map_err(|err| format!("invalid dataset id `{value}`: {err}"))
}

fn with_connection<T>(
    db_path: &str,
    f: impl FnOnce(&Connection) -> Result<T, String>,
) -> Result<T, String> {
    let conn = open_db(db_path.trim()).map_err(|err| format!("database open failed: {err}"))?;
    f(&conn)
}

fn require_dataset(conn: &Connection, dataset_id: &str) -> Result<Dataset, String> {
    let id = parse_id(dataset_id)?;
    let repo = SqliteDatasetRepository::try_new(conn).map_err(|err| err.to_string())?;
    DatasetService::new(repo)
        .require_dataset(id)
        .map_err(|err| err.to_string())
}

fn reconciler<'conn>(
    conn: &'conn Connection,
    user_id: &str,
) -> Result<
    EvaluationReconciler<SqliteEvaluationRepository<'conn>, SqliteAssignmentRepository<'conn>>,
    String,
> {
    let evaluations = SqliteEvaluationRepository::try_new(conn).map_err(|err| err.to_string())?;
    let assignments = SqliteAssignmentRepository::try_new(conn).map_err(|err| err.to_string())?;
    Ok(EvaluationReconciler::new(evaluations, assignments, user_id))
}

fn assignment_service(
    conn: &Connection,
) -> Result<AssignmentService<SqliteAssignmentRepository<'_>>, String> {
    SqliteAssignmentRepository::try_new(conn)
        .map(AssignmentService::new)
        .map_err(|err| err.to_string())
}

/// Rebuilds annotation state from a request body, reading sample values
/// from the dataset. Duplicate positions are rejected here because the
/// state keys marks by position and would merge them.
fn state_from_request(
    dataset: &Dataset,
    request: &EvaluationRequest,
) -> Result<AnnotationState, String> {
    if request.no_change_points {
        if !request.change_points.is_empty() {
            return Err("noChangePoints cannot be combined with change points".to_string());
        }
        return Ok(AnnotationState::declared_none());
    }

    let mut annotations = Vec::with_capacity(request.change_points.len());
    let mut seen = BTreeSet::new();
    for point in &request.change_points {
        if !seen.insert(point.position) {
            return Err(format!("duplicate change point at position {}", point.position));
        }
        let value = dataset.sample_value(point.position).ok_or_else(|| {
            format!(
                "position {} is outside the dataset (length {})",
                point.position, dataset.length
            )
        })?;
        let mut annotation = ChangePointAnnotation::new(point.position, point.kind, value);
        annotation.notes = point.notes.clone();
        annotations.push(annotation);
    }
    Ok(AnnotationState::with_annotations(annotations))
}
