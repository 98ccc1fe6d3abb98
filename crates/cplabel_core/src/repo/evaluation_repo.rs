//! Evaluation repository contract and SQLite implementation.
//!
//! # Invariants
//! - Every write runs `Evaluation::validate()` first; this is the
//!   authoritative check behind the client-side save guard.
//! - `latest_for` orders by `updated_at`, then insertion order.
//! - Updates never change the owning user or dataset.

use crate::model::dataset::DatasetId;
use crate::model::evaluation::{
    ChangePointRecord, Evaluation, EvaluationId, EvaluationStatus, EvaluationValidationError,
};
use crate::repo::{
    bool_to_int, ensure_tables, int_to_bool, parse_uuid, RepoError, RepoResult, NOW_MS_SQL,
};
use rusqlite::{params, Connection, Row};

const EVALUATION_SELECT_SQL: &str = "SELECT
    id,
    dataset_id,
    user_id,
    change_points_json,
    no_change_points,
    confidence,
    time_spent,
    status
FROM evaluations";

/// Repository interface for evaluation storage.
pub trait EvaluationRepository {
    fn create_evaluation(&self, evaluation: &Evaluation) -> RepoResult<EvaluationId>;
    /// Replaces verdict fields of an existing evaluation owned by the same
    /// user and dataset.
    fn update_evaluation(&self, evaluation: &Evaluation) -> RepoResult<()>;
    fn get_evaluation(&self, id: EvaluationId) -> RepoResult<Option<Evaluation>>;
    /// Most recently written evaluation for one (user, dataset) pair.
    fn latest_for(&self, user_id: &str, dataset_id: DatasetId) -> RepoResult<Option<Evaluation>>;
    fn list_for_dataset(&self, dataset_id: DatasetId) -> RepoResult<Vec<Evaluation>>;
}

/// SQLite-backed evaluation repository.
pub struct SqliteEvaluationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEvaluationRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["datasets", "evaluations"])?;
        Ok(Self { conn })
    }
}

impl EvaluationRepository for SqliteEvaluationRepository<'_> {
    fn create_evaluation(&self, evaluation: &Evaluation) -> RepoResult<EvaluationId> {
        evaluation.validate()?;

        self.conn.execute(
            &format!(
                "INSERT INTO evaluations (
                    id,
                    dataset_id,
                    user_id,
                    change_points_json,
                    no_change_points,
                    confidence,
                    time_spent,
                    status,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, {NOW_MS_SQL}, {NOW_MS_SQL});"
            ),
            params![
                evaluation.id.to_string(),
                evaluation.dataset_id.to_string(),
                evaluation.user_id.as_str(),
                serde_json::to_string(&evaluation.change_points)?,
                bool_to_int(evaluation.no_change_points),
                evaluation.confidence,
                stored_time_spent(evaluation)?,
                evaluation.status.as_str(),
            ],
        )?;

        Ok(evaluation.id)
    }

    fn update_evaluation(&self, evaluation: &Evaluation) -> RepoResult<()> {
        evaluation.validate()?;

        let changed = self.conn.execute(
            &format!(
                "UPDATE evaluations
                 SET
                    change_points_json = ?1,
                    no_change_points = ?2,
                    confidence = ?3,
                    time_spent = ?4,
                    status = ?5,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?6
                   AND user_id = ?7
                   AND dataset_id = ?8;"
            ),
            params![
                serde_json::to_string(&evaluation.change_points)?,
                bool_to_int(evaluation.no_change_points),
                evaluation.confidence,
                stored_time_spent(evaluation)?,
                evaluation.status.as_str(),
                evaluation.id.to_string(),
                evaluation.user_id.as_str(),
                evaluation.dataset_id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("evaluation", evaluation.id));
        }
        Ok(())
    }

    fn get_evaluation(&self, id: EvaluationId) -> RepoResult<Option<Evaluation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EVALUATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_evaluation_row(row)?));
        }
        Ok(None)
    }

    fn latest_for(&self, user_id: &str, dataset_id: DatasetId) -> RepoResult<Option<Evaluation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EVALUATION_SELECT_SQL}
             WHERE user_id = ?1
               AND dataset_id = ?2
             ORDER BY updated_at DESC, rowid DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query(params![user_id, dataset_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_evaluation_row(row)?));
        }
        Ok(None)
    }

    fn list_for_dataset(&self, dataset_id: DatasetId) -> RepoResult<Vec<Evaluation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EVALUATION_SELECT_SQL}
             WHERE dataset_id = ?1
             ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([dataset_id.to_string()])?;
        let mut evaluations = Vec::new();
        while let Some(row) = rows.next()? {
            evaluations.push(parse_evaluation_row(row)?);
        }
        Ok(evaluations)
    }
}

fn stored_time_spent(evaluation: &Evaluation) -> RepoResult<i64> {
    i64::try_from(evaluation.time_spent)
        .map_err(|_| EvaluationValidationError::TimeSpentOutOfRange(evaluation.time_spent).into())
}

fn parse_evaluation_row(row: &Row<'_>) -> RepoResult<Evaluation> {
    let id_text: String = row.get("id")?;
    let dataset_text: String = row.get("dataset_id")?;

    let status_text: String = row.get("status")?;
    let status = EvaluationStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid evaluation status `{status_text}` in evaluations.status"
        ))
    })?;

    let change_points_json: String = row.get("change_points_json")?;
    let change_points: Vec<ChangePointRecord> = serde_json::from_str(&change_points_json)?;

    let time_spent: i64 = row.get("time_spent")?;
    let time_spent = u64::try_from(time_spent).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid time_spent `{time_spent}` in evaluations.time_spent"
        ))
    })?;

    let evaluation = Evaluation {
        id: parse_uuid(&id_text, "evaluations.id")?,
        dataset_id: parse_uuid(&dataset_text, "evaluations.dataset_id")?,
        user_id: row.get("user_id")?,
        change_points,
        no_change_points: int_to_bool(row.get("no_change_points")?, "evaluations.no_change_points")?,
        confidence: row.get("confidence")?,
        time_spent,
        status,
    };
    evaluation.validate()?;
    Ok(evaluation)
}
