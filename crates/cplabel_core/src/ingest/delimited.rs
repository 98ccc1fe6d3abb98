//! Delimited text reading with header and delimiter detection.
//!
//! # Invariants
//! - The first non-blank record is the header row.
//! - Blank lines are skipped and never counted as data rows.
//! - Quoted cells may contain the delimiter; cells are trimmed.
//! - Row line numbers are one-based positions in the source text.

use csv::{ReaderBuilder, StringRecord, Trim};
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

const CANDIDATE_DELIMITERS: [char; 3] = [',', ';', '\t'];

/// One data line split into cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedRow {
    /// One-based line number in the source text.
    pub line: usize,
    pub cells: Vec<String>,
}

impl DelimitedRow {
    /// Returns the cell at `column`, or `None` when the row is short.
    pub fn cell(&self, column: usize) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// True when every cell is empty (e.g. a line of bare delimiters).
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|cell| cell.is_empty())
    }
}

/// Header plus data rows of one delimited document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedTable {
    pub delimiter: char,
    pub headers: Vec<String>,
    pub rows: Vec<DelimitedRow>,
}

impl DelimitedTable {
    /// Value-column candidates: every header after the index column.
    pub fn value_columns(&self) -> &[String] {
        self.headers.get(1..).unwrap_or(&[])
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        let wanted = normalize_header(name, 0);
        self.headers
            .iter()
            .skip(1)
            .position(|header| *header == wanted)
            .map(|offset| offset + 1)
    }
}

/// Reads `raw` into a header and data rows. Returns `Ok(None)` when the
/// text has no non-blank line at all.
///
/// # Errors
/// - The reader's error when a record cannot be decoded.
pub fn parse_delimited(raw: &str) -> Result<Option<DelimitedTable>, csv::Error> {
    let Some(header_line) = raw.lines().find(|line| !line.trim().is_empty()) else {
        return Ok(None);
    };
    let delimiter = detect_delimiter(header_line);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(raw.as_bytes());

    let mut lines = LineCounter::new(raw.as_bytes());
    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if is_blank(&record) {
            continue;
        }
        let line = lines.line_of(&record);
        let cells: Vec<String> = record.iter().map(clean_cell).collect();
        match headers {
            None => {
                headers = Some(
                    cells
                        .iter()
                        .enumerate()
                        .map(|(position, cell)| normalize_header(cell, position))
                        .collect(),
                );
            }
            Some(_) => rows.push(DelimitedRow { line, cells }),
        }
    }

    Ok(headers.map(|headers| DelimitedTable {
        delimiter,
        headers,
        rows,
    }))
}

/// Picks the candidate delimiter occurring most often outside quotes in the
/// header; ties go to the earlier candidate. Falls back to `,` when none
/// occurs.
pub fn detect_delimiter(header_line: &str) -> char {
    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut quoted = false;
    for ch in header_line.chars() {
        if ch == '"' {
            quoted = !quoted;
            continue;
        }
        if quoted {
            continue;
        }
        if let Some(slot) = CANDIDATE_DELIMITERS.iter().position(|&candidate| candidate == ch) {
            counts[slot] += 1;
        }
    }

    let mut best = (',', 0);
    for (candidate, count) in CANDIDATE_DELIMITERS.into_iter().zip(counts) {
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

/// Maps record byte offsets to line numbers in one forward pass.
///
/// A record's reported offset can sit before blank lines the reader skipped,
/// so line breaks directly at the offset are stepped over first.
struct LineCounter<'a> {
    raw: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(raw: &'a [u8]) -> Self {
        Self {
            raw,
            offset: 0,
            line: 1,
        }
    }

    fn line_of(&mut self, record: &StringRecord) -> usize {
        let reported = record
            .position()
            .map_or(self.offset, |position| position.byte() as usize)
            .clamp(self.offset, self.raw.len());
        let start = reported
            + self.raw[reported..]
                .iter()
                .take_while(|byte| matches!(byte, b'\r' | b'\n'))
                .count();
        self.line += self.raw[self.offset..start]
            .iter()
            .filter(|&&byte| byte == b'\n')
            .count();
        self.offset = start;
        self.line
    }
}

/// A whitespace-only line reads as a single empty field.
fn is_blank(record: &StringRecord) -> bool {
    record.len() <= 1 && record.get(0).map_or(true, str::is_empty)
}

/// Quotes preceded by padding are not field quotes to the reader; strip one
/// remaining surrounding pair.
fn clean_cell(cell: &str) -> String {
    let trimmed = cell.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

fn normalize_header(raw: &str, position: usize) -> String {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        format!("column_{position}")
    } else {
        collapsed.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::{detect_delimiter, parse_delimited};

    #[test]
    fn detects_semicolon_and_tab() {
        assert_eq!(detect_delimiter("t;a;b"), ';');
        assert_eq!(detect_delimiter("t\ta\tb"), '\t');
        assert_eq!(detect_delimiter("t,a,b"), ',');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn delimiters_inside_quotes_do_not_count() {
        assert_eq!(detect_delimiter("t;\"a, b, c\";d"), ';');
    }

    #[test]
    fn skips_blank_lines_and_keeps_line_numbers() {
        let table = parse_delimited("\nidx,a\n\n0,1.5\n  \n1,2.5\n").unwrap().unwrap();
        assert_eq!(table.headers, vec!["idx", "a"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].line, 4);
        assert_eq!(table.rows[1].line, 6);
        assert_eq!(table.rows[1].cell(1), Some("2.5"));
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let table = parse_delimited("t,a\r\n0,1\r\n1,2\r\n").unwrap().unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].line, 3);
        assert_eq!(table.rows[1].cells, vec!["1", "2"]);
    }

    #[test]
    fn strips_quotes_and_names_blank_headers() {
        let table = parse_delimited("\"time\", \"sensor  one\",\n0,\"1\",2")
            .unwrap()
            .unwrap();
        assert_eq!(table.headers, vec!["time", "sensor one", "column_2"]);
        assert_eq!(table.rows[0].cells, vec!["0", "1", "2"]);
        assert_eq!(table.column_position("sensor one"), Some(1));
        assert_eq!(table.column_position("time"), None);
    }

    #[test]
    fn quoted_delimiter_stays_inside_its_cell() {
        let table = parse_delimited("t,\"temp, C\"\n0,\"1,5\"\n1,2.5\n")
            .unwrap()
            .unwrap();
        assert_eq!(table.headers, vec!["t", "temp, C"]);
        assert_eq!(table.rows[0].cells, vec!["0", "1,5"]);
        assert_eq!(table.column_position("temp, C"), Some(1));
    }

    #[test]
    fn blank_document_has_no_table() {
        assert!(parse_delimited("  \n\n").unwrap().is_none());
    }
}
