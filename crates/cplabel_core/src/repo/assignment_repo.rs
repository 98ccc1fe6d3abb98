//! Assignment repository contract and SQLite implementation.
//!
//! # Invariants
//! - At most one assignment per (user, dataset) pair.
//! - `completed_at` is set exactly while `status == completed`.

use crate::model::assignment::{Assignment, AssignmentStatus};
use crate::model::dataset::DatasetId;
use crate::repo::{ensure_tables, parse_uuid, RepoError, RepoResult, NOW_MS_SQL};
use rusqlite::{params, Connection, Row};

const ASSIGNMENT_SELECT_SQL: &str = "SELECT
    user_id,
    dataset_id,
    status,
    assigned_at,
    completed_at
FROM assignments";

/// Repository interface for reviewer assignments.
pub trait AssignmentRepository {
    /// Creates a `pending` assignment, or returns the existing one unchanged.
    fn assign(&self, user_id: &str, dataset_id: DatasetId) -> RepoResult<Assignment>;
    fn get_assignment(&self, user_id: &str, dataset_id: DatasetId)
        -> RepoResult<Option<Assignment>>;
    fn list_for_user(&self, user_id: &str) -> RepoResult<Vec<Assignment>>;
    /// Sets one assignment's status; `NotFound` when the pair is unassigned.
    fn update_status(
        &self,
        user_id: &str,
        dataset_id: DatasetId,
        status: AssignmentStatus,
    ) -> RepoResult<Assignment>;
}

/// SQLite-backed assignment repository.
pub struct SqliteAssignmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssignmentRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["datasets", "assignments"])?;
        Ok(Self { conn })
    }

    fn require(&self, user_id: &str, dataset_id: DatasetId) -> RepoResult<Assignment> {
        self.get_assignment(user_id, dataset_id)?
            .ok_or_else(|| RepoError::not_found("assignment", format!("{user_id}/{dataset_id}")))
    }
}

impl AssignmentRepository for SqliteAssignmentRepository<'_> {
    fn assign(&self, user_id: &str, dataset_id: DatasetId) -> RepoResult<Assignment> {
        if user_id.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "assignment user id must not be blank".to_string(),
            ));
        }
        self.conn.execute(
            &format!(
                "INSERT INTO assignments (user_id, dataset_id, status, assigned_at)
                 VALUES (?1, ?2, 'pending', {NOW_MS_SQL})
                 ON CONFLICT (user_id, dataset_id) DO NOTHING;"
            ),
            params![user_id, dataset_id.to_string()],
        )?;
        self.require(user_id, dataset_id)
    }

    fn get_assignment(
        &self,
        user_id: &str,
        dataset_id: DatasetId,
    ) -> RepoResult<Option<Assignment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASSIGNMENT_SELECT_SQL} WHERE user_id = ?1 AND dataset_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![user_id, dataset_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_assignment_row(row)?));
        }
        Ok(None)
    }

    fn list_for_user(&self, user_id: &str) -> RepoResult<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASSIGNMENT_SELECT_SQL}
             WHERE user_id = ?1
             ORDER BY assigned_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([user_id])?;
        let mut assignments = Vec::new();
        while let Some(row) = rows.next()? {
            assignments.push(parse_assignment_row(row)?);
        }
        Ok(assignments)
    }

    fn update_status(
        &self,
        user_id: &str,
        dataset_id: DatasetId,
        status: AssignmentStatus,
    ) -> RepoResult<Assignment> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE assignments
                 SET
                    status = ?1,
                    completed_at = CASE WHEN ?1 = 'completed' THEN {NOW_MS_SQL} ELSE NULL END
                 WHERE user_id = ?2
                   AND dataset_id = ?3;"
            ),
            params![status.as_str(), user_id, dataset_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(
                "assignment",
                format!("{user_id}/{dataset_id}"),
            ));
        }
        self.require(user_id, dataset_id)
    }
}

fn parse_assignment_row(row: &Row<'_>) -> RepoResult<Assignment> {
    let dataset_text: String = row.get("dataset_id")?;
    let status_text: String = row.get("status")?;
    let status = AssignmentStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid assignment status `{status_text}` in assignments.status"
        ))
    })?;

    Ok(Assignment {
        user_id: row.get("user_id")?,
        dataset_id: parse_uuid(&dataset_text, "assignments.dataset_id")?,
        status,
        assigned_at: row.get("assigned_at")?,
        completed_at: row.get("completed_at")?,
    })
}
