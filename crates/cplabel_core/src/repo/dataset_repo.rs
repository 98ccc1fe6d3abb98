//! Dataset repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist ingested datasets with their samples and statistics.
//! - Provide administrative status changes and deletion.
//!
//! # Invariants
//! - Samples and tags are stored as JSON text and decoded on every read.
//! - `status` is the only column changed after creation.
//! - Batch creation is all-or-nothing.

use crate::model::dataset::{Dataset, DatasetId, DatasetStatus, Sample};
use crate::repo::{ensure_tables, parse_uuid, RepoError, RepoResult, NOW_MS_SQL};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const DATASET_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    category,
    difficulty,
    data_json,
    length,
    min_value,
    max_value,
    mean_value,
    std_value,
    expected_change_points,
    status,
    tags_json
FROM datasets";

/// Query options for listing datasets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetListQuery {
    pub status: Option<DatasetStatus>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for dataset storage.
pub trait DatasetRepository {
    fn create_dataset(&self, dataset: &Dataset) -> RepoResult<DatasetId>;
    /// Creates all datasets or none of them.
    fn create_datasets(&self, datasets: &[Dataset]) -> RepoResult<Vec<DatasetId>>;
    fn get_dataset(&self, id: DatasetId) -> RepoResult<Option<Dataset>>;
    /// Lists datasets in creation order.
    fn list_datasets(&self, query: &DatasetListQuery) -> RepoResult<Vec<Dataset>>;
    fn update_status(&self, id: DatasetId, status: DatasetStatus) -> RepoResult<()>;
    fn delete_dataset(&self, id: DatasetId) -> RepoResult<()>;
}

/// SQLite-backed dataset repository.
pub struct SqliteDatasetRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDatasetRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["datasets"])?;
        Ok(Self { conn })
    }
}

impl DatasetRepository for SqliteDatasetRepository<'_> {
    fn create_dataset(&self, dataset: &Dataset) -> RepoResult<DatasetId> {
        insert_dataset(self.conn, dataset)
    }

    fn create_datasets(&self, datasets: &[Dataset]) -> RepoResult<Vec<DatasetId>> {
        for dataset in datasets {
            dataset.validate()?;
        }
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            ids.push(insert_dataset(&tx, dataset)?);
        }
        tx.commit()?;
        Ok(ids)
    }

    fn get_dataset(&self, id: DatasetId) -> RepoResult<Option<Dataset>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DATASET_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_dataset_row(row)?));
        }
        Ok(None)
    }

    fn list_datasets(&self, query: &DatasetListQuery) -> RepoResult<Vec<Dataset>> {
        let mut sql = format!("{DATASET_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        sql.push_str(" ORDER BY created_at ASC, rowid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut datasets = Vec::new();
        while let Some(row) = rows.next()? {
            datasets.push(parse_dataset_row(row)?);
        }
        Ok(datasets)
    }

    fn update_status(&self, id: DatasetId, status: DatasetStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE datasets
                 SET status = ?1, updated_at = {NOW_MS_SQL}
                 WHERE id = ?2;"
            ),
            params![status.as_str(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("dataset", id));
        }
        Ok(())
    }

    fn delete_dataset(&self, id: DatasetId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM datasets WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("dataset", id));
        }
        Ok(())
    }
}

fn insert_dataset(conn: &Connection, dataset: &Dataset) -> RepoResult<DatasetId> {
    dataset.validate()?;

    conn.execute(
        &format!(
            "INSERT INTO datasets (
                id,
                name,
                description,
                category,
                difficulty,
                data_json,
                length,
                min_value,
                max_value,
                mean_value,
                std_value,
                expected_change_points,
                status,
                tags_json,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, {NOW_MS_SQL}, {NOW_MS_SQL});"
        ),
        params![
            dataset.id.to_string(),
            dataset.name.as_str(),
            dataset.description.as_deref(),
            dataset.category.as_deref(),
            dataset.difficulty.as_deref(),
            serde_json::to_string(&dataset.data)?,
            dataset.length as i64,
            dataset.min_value,
            dataset.max_value,
            dataset.mean_value,
            dataset.std_value,
            dataset.expected_change_points,
            dataset.status.as_str(),
            serde_json::to_string(&dataset.tags)?,
        ],
    )?;

    Ok(dataset.id)
}

fn parse_dataset_row(row: &Row<'_>) -> RepoResult<Dataset> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "datasets.id")?;

    let status_text: String = row.get("status")?;
    let status = DatasetStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid dataset status `{status_text}` in datasets.status"
        ))
    })?;

    let length: i64 = row.get("length")?;
    let length = usize::try_from(length).map_err(|_| {
        RepoError::InvalidData(format!("invalid length `{length}` in datasets.length"))
    })?;

    let data_json: String = row.get("data_json")?;
    let data: Vec<Sample> = serde_json::from_str(&data_json)?;
    let tags_json: String = row.get("tags_json")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)?;

    let dataset = Dataset {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        category: row.get("category")?,
        difficulty: row.get("difficulty")?,
        data,
        length,
        min_value: row.get("min_value")?,
        max_value: row.get("max_value")?,
        mean_value: row.get("mean_value")?,
        std_value: row.get("std_value")?,
        expected_change_points: row.get("expected_change_points")?,
        status,
        tags,
    };
    dataset.validate()?;
    Ok(dataset)
}
