//! Ingestion report: every coercion and every dropped row, in input order.

use serde::Serialize;

/// Why a cell was replaced by a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionReason {
    /// Index cell unparsable; the row ordinal was used.
    IndexFallback,
    /// Value cell unparsable or non-finite; `0` was used.
    ValueDefaulted,
    /// Row shorter than the header; `0` was used.
    MissingCell,
}

/// One coerced cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coercion {
    /// One-based line number in the source text.
    pub line: usize,
    pub column: String,
    pub raw: String,
    pub reason: CoercionReason,
}

/// One dropped source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRow {
    pub line: usize,
    pub reason: String,
}

/// One value column that produced no dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedColumn {
    pub column: String,
    pub reason: String,
}

/// Record of lossy decisions taken while ingesting one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionLog {
    pub coercions: Vec<Coercion>,
    pub dropped_rows: Vec<DroppedRow>,
    pub skipped_columns: Vec<SkippedColumn>,
}

impl IngestionLog {
    pub fn record_coercion(
        &mut self,
        line: usize,
        column: &str,
        raw: &str,
        reason: CoercionReason,
    ) {
        self.coercions.push(Coercion {
            line,
            column: column.to_string(),
            raw: raw.to_string(),
            reason,
        });
    }

    pub fn record_dropped_row(&mut self, line: usize, reason: impl Into<String>) {
        self.dropped_rows.push(DroppedRow {
            line,
            reason: reason.into(),
        });
    }

    pub fn record_skipped_column(&mut self, column: &str, reason: impl Into<String>) {
        self.skipped_columns.push(SkippedColumn {
            column: column.to_string(),
            reason: reason.into(),
        });
    }

    /// Coercions recorded against one column.
    pub fn coercions_for<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Coercion> {
        self.coercions
            .iter()
            .filter(move |coercion| coercion.column == column)
    }

    pub fn is_clean(&self) -> bool {
        self.coercions.is_empty() && self.dropped_rows.is_empty() && self.skipped_columns.is_empty()
    }
}
