//! Dataset ingestion from delimited text.
//!
//! # Responsibility
//! - Split raw text into a header and rows, detect value columns.
//! - Build one dataset (single mode) or one dataset per value column
//!   (multiple mode) with derived summary statistics.
//! - Record every lossy decision in an `IngestionLog`.
//!
//! # Invariants
//! - Every non-blank data row yields exactly one sample per produced dataset;
//!   unparsable values become `0`, unparsable indices become the row ordinal.
//! - In multiple mode one failing column never aborts its siblings.
//! - Produced datasets are `DatasetStatus::Active`.

pub mod delimited;
pub mod report;
pub mod stats;

use crate::model::dataset::{Dataset, DatasetStatus, Sample};
use delimited::{parse_delimited, DelimitedRow, DelimitedTable};
use log::{error, info, warn};
use report::{CoercionReason, IngestionLog};
use serde::{Deserialize, Serialize};
use stats::summarize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DEFAULT_BASE_NAME: &str = "dataset";

/// How value columns map to datasets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// One dataset from the selected (or first) value column.
    #[default]
    Single,
    /// One dataset per value column.
    Multiple,
}

/// Caller-provided ingestion options and dataset metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestOptions {
    pub mode: IngestMode,
    /// Single mode only; defaults to the first value column.
    pub selected_column: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub expected_change_points: Option<u32>,
    pub tags: Vec<String>,
}

/// Result of one ingestion call.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// Datasets produced, in column order.
    pub datasets: Vec<Dataset>,
    /// Value columns attempted (1 in single mode).
    pub attempted: usize,
    pub report: IngestionLog,
}

impl IngestOutcome {
    pub fn created(&self) -> usize {
        self.datasets.len()
    }
}

/// Ingestion failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionError {
    /// No non-blank line at all.
    EmptyInput,
    /// Header has no column after the index column.
    NoValueColumns,
    /// Header present but no usable data row.
    NoDataRows,
    /// `selected_column` is not among the headers.
    ColumnNotFound(String),
    /// Every value in the column failed to parse.
    NoNumericValues { column: String },
    /// Multiple mode: every candidate column failed.
    AllColumnsFailed { attempted: usize },
    /// The delimited reader could not decode a record.
    Unreadable(String),
}

impl Display for IngestionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "input file is empty"),
            Self::NoValueColumns => {
                write!(f, "header must contain an index column and at least one value column")
            }
            Self::NoDataRows => write!(f, "input file has no data rows"),
            Self::ColumnNotFound(column) => write!(f, "column `{column}` not found in header"),
            Self::NoNumericValues { column } => {
                write!(f, "column `{column}` has no numeric values")
            }
            Self::AllColumnsFailed { attempted } => {
                write!(f, "none of {attempted} value columns produced a dataset")
            }
            Self::Unreadable(message) => write!(f, "input is not readable: {message}"),
        }
    }
}

impl Error for IngestionError {}

/// Parses `raw` and builds datasets according to `options`.
///
/// # Errors
/// - `EmptyInput`, `NoValueColumns`, `NoDataRows` for malformed input.
/// - `ColumnNotFound` when `selected_column` is absent (single mode).
/// - `NoNumericValues` when the single selected column has no numeric cell.
/// - `AllColumnsFailed` when no column succeeds in multiple mode.
/// - `Unreadable` when the reader rejects a record.
pub fn ingest(raw: &str, options: &IngestOptions) -> Result<IngestOutcome, IngestionError> {
    let table = parse_delimited(raw)
        .map_err(|err| IngestionError::Unreadable(err.to_string()))?
        .ok_or(IngestionError::EmptyInput)?;
    if table.value_columns().is_empty() {
        return Err(IngestionError::NoValueColumns);
    }

    let mut report = IngestionLog::default();
    let rows = usable_rows(&table, &mut report);
    if rows.is_empty() {
        return Err(IngestionError::NoDataRows);
    }
    let indices = resolve_indices(&table, &rows, &mut report);
    let metadata = DatasetMetadata::from_options(options);

    match options.mode {
        IngestMode::Single => {
            let column = match options.selected_column.as_deref() {
                Some(name) => table
                    .column_position(name)
                    .ok_or_else(|| IngestionError::ColumnNotFound(name.to_string()))?,
                None => 1,
            };
            let name = metadata
                .base_name
                .clone()
                .unwrap_or_else(|| table.headers[column].clone());
            let dataset = build_dataset(&table, &rows, &indices, column, name, &metadata, &mut report)?;
            info!(
                "event=ingest module=ingest status=ok mode=single column={} length={} coercions={}",
                table.headers[column],
                dataset.length,
                report.coercions.len()
            );
            Ok(IngestOutcome {
                datasets: vec![dataset],
                attempted: 1,
                report,
            })
        }
        IngestMode::Multiple => {
            let base = metadata
                .base_name
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string());
            let attempted = table.value_columns().len();
            let mut datasets = Vec::with_capacity(attempted);
            for column in 1..table.headers.len() {
                let header = table.headers[column].as_str();
                let name = format!("{base} - {header}");
                match build_dataset(&table, &rows, &indices, column, name, &metadata, &mut report) {
                    Ok(dataset) => datasets.push(dataset),
                    Err(err) => {
                        warn!(
                            "event=ingest_column module=ingest status=skipped column={} error={}",
                            header,
                            err
                        );
                        report.record_skipped_column(header, err.to_string());
                    }
                }
            }

            if datasets.is_empty() {
                error!(
                    "event=ingest module=ingest status=error mode=multiple attempted={}",
                    attempted
                );
                return Err(IngestionError::AllColumnsFailed { attempted });
            }
            info!(
                "event=ingest module=ingest status=ok mode=multiple created={} attempted={}",
                datasets.len(),
                attempted
            );
            Ok(IngestOutcome {
                datasets,
                attempted,
                report,
            })
        }
    }
}

/// Normalizes one tag value: trimmed, lowercase, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes, deduplicates and sorts tag values.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut unique = BTreeSet::new();
    for tag in tags {
        if let Some(value) = normalize_tag(tag) {
            unique.insert(value);
        }
    }
    unique.into_iter().collect()
}

struct DatasetMetadata {
    base_name: Option<String>,
    description: Option<String>,
    category: Option<String>,
    difficulty: Option<String>,
    expected_change_points: Option<u32>,
    tags: Vec<String>,
}

impl DatasetMetadata {
    fn from_options(options: &IngestOptions) -> Self {
        Self {
            base_name: non_blank(options.name.as_deref()),
            description: non_blank(options.description.as_deref()),
            category: non_blank(options.category.as_deref()),
            difficulty: non_blank(options.difficulty.as_deref()),
            expected_change_points: options.expected_change_points,
            tags: normalize_tags(&options.tags),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn usable_rows<'t>(table: &'t DelimitedTable, report: &mut IngestionLog) -> Vec<&'t DelimitedRow> {
    let mut rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        if row.is_empty() {
            report.record_dropped_row(row.line, "row has no cell content");
            continue;
        }
        rows.push(row);
    }
    rows
}

fn resolve_indices(
    table: &DelimitedTable,
    rows: &[&DelimitedRow],
    report: &mut IngestionLog,
) -> Vec<i64> {
    let index_header = table.headers[0].as_str();
    rows.iter()
        .enumerate()
        .map(|(ordinal, row)| {
            let raw = row.cell(0).unwrap_or("");
            match raw.parse::<i64>() {
                Ok(index) => index,
                Err(_) => {
                    report.record_coercion(row.line, index_header, raw, CoercionReason::IndexFallback);
                    ordinal as i64
                }
            }
        })
        .collect()
}

fn build_dataset(
    table: &DelimitedTable,
    rows: &[&DelimitedRow],
    indices: &[i64],
    column: usize,
    name: String,
    metadata: &DatasetMetadata,
    report: &mut IngestionLog,
) -> Result<Dataset, IngestionError> {
    let header = table.headers[column].as_str();
    let mut data = Vec::with_capacity(rows.len());
    let mut parsed = 0usize;

    for (row, &index) in rows.iter().zip(indices) {
        let value = match row.cell(column) {
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    parsed += 1;
                    value
                }
                _ => {
                    report.record_coercion(row.line, header, raw, CoercionReason::ValueDefaulted);
                    0.0
                }
            },
            None => {
                report.record_coercion(row.line, header, "", CoercionReason::MissingCell);
                0.0
            }
        };
        data.push(Sample::new(index, value));
    }

    if parsed == 0 {
        return Err(IngestionError::NoNumericValues {
            column: header.to_string(),
        });
    }

    let values: Vec<f64> = data.iter().map(|sample| sample.value).collect();
    let stats = summarize(&values).ok_or(IngestionError::NoDataRows)?;

    Ok(Dataset {
        id: Uuid::new_v4(),
        name,
        description: metadata.description.clone(),
        category: metadata.category.clone(),
        difficulty: metadata.difficulty.clone(),
        data,
        length: stats.length,
        min_value: stats.min,
        max_value: stats.max,
        mean_value: stats.mean,
        std_value: stats.std,
        expected_change_points: metadata.expected_change_points,
        status: DatasetStatus::Active,
        tags: metadata.tags.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::{ingest, normalize_tags, IngestMode, IngestOptions, IngestionError};
    use crate::ingest::report::CoercionReason;

    fn multiple() -> IngestOptions {
        IngestOptions {
            mode: IngestMode::Multiple,
            name: Some("sensors".to_string()),
            ..IngestOptions::default()
        }
    }

    #[test]
    fn unparsable_value_becomes_zero_and_is_logged() {
        let outcome = ingest("t,a\n0,1\n1,oops\n2,3\n", &IngestOptions::default()).unwrap();
        let dataset = &outcome.datasets[0];
        assert_eq!(dataset.length, 3);
        assert_eq!(dataset.values(), vec![1.0, 0.0, 3.0]);
        assert_eq!(outcome.report.coercions.len(), 1);
        assert_eq!(outcome.report.coercions[0].line, 3);
        assert_eq!(outcome.report.coercions[0].reason, CoercionReason::ValueDefaulted);
    }

    #[test]
    fn unparsable_index_falls_back_to_ordinal() {
        let outcome = ingest("t,a\n10,1\nx,2\n12,3\n", &IngestOptions::default()).unwrap();
        let indices: Vec<i64> = outcome.datasets[0].data.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![10, 1, 12]);
        assert_eq!(outcome.report.coercions[0].reason, CoercionReason::IndexFallback);
    }

    #[test]
    fn non_finite_text_is_coerced() {
        let outcome = ingest("t,a\n0,NaN\n1,inf\n2,4\n", &IngestOptions::default()).unwrap();
        assert_eq!(outcome.datasets[0].values(), vec![0.0, 0.0, 4.0]);
    }

    #[test]
    fn short_rows_are_kept_and_delimiter_only_rows_dropped() {
        let outcome = ingest("t,a,b\n0,1,2\n1,5\n,,\n2,3,4\n", &multiple()).unwrap();
        assert_eq!(outcome.created(), 2);
        assert_eq!(outcome.datasets[1].values(), vec![2.0, 0.0, 4.0]);
        assert_eq!(outcome.report.dropped_rows.len(), 1);
        assert_eq!(outcome.report.dropped_rows[0].line, 4);
        assert_eq!(
            outcome.report.coercions_for("b").next().map(|c| c.reason),
            Some(CoercionReason::MissingCell)
        );
    }

    #[test]
    fn multiple_mode_skips_failing_column() {
        let outcome = ingest("t,good,bad\n0,1,x\n1,2,y\n", &multiple()).unwrap();
        assert_eq!(outcome.created(), 1);
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.datasets[0].name, "sensors - good");
        assert_eq!(outcome.report.skipped_columns[0].column, "bad");
    }

    #[test]
    fn multiple_mode_fails_when_every_column_fails() {
        let err = ingest("t,a,b\n0,x,y\n", &multiple()).unwrap_err();
        assert_eq!(err, IngestionError::AllColumnsFailed { attempted: 2 });
    }

    #[test]
    fn missing_selected_column_names_the_column() {
        let options = IngestOptions {
            selected_column: Some("pressure".to_string()),
            ..IngestOptions::default()
        };
        let err = ingest("t,a\n0,1\n", &options).unwrap_err();
        assert_eq!(err, IngestionError::ColumnNotFound("pressure".to_string()));
        assert!(err.to_string().contains("pressure"));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let options = IngestOptions::default();
        assert_eq!(ingest("", &options).unwrap_err(), IngestionError::EmptyInput);
        assert_eq!(ingest("t,a\n", &options).unwrap_err(), IngestionError::NoDataRows);
        assert_eq!(ingest("t\n1\n", &options).unwrap_err(), IngestionError::NoValueColumns);
    }

    #[test]
    fn quoted_header_with_delimiter_is_one_column() {
        let raw = "t,\"temp, C\"\n0,1.5\n1,\"2,5\"\n2,2.5\n";
        let options = IngestOptions {
            selected_column: Some("temp, C".to_string()),
            ..IngestOptions::default()
        };
        let outcome = ingest(raw, &options).unwrap();
        assert_eq!(outcome.datasets[0].name, "temp, C");
        assert_eq!(outcome.datasets[0].values(), vec![1.5, 0.0, 2.5]);

        let outcome = ingest(raw, &multiple()).unwrap();
        assert_eq!((outcome.created(), outcome.attempted), (1, 1));
        assert_eq!(outcome.datasets[0].name, "sensors - temp, C");
    }

    #[test]
    fn tags_are_normalized() {
        let tags = vec![" Sensor ".to_string(), "sensor".to_string(), "".to_string(), "B".to_string()];
        assert_eq!(normalize_tags(&tags), vec!["b".to_string(), "sensor".to_string()]);
    }
}
