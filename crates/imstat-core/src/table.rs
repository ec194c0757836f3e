//! Tabular input
//!
//! The engine receives an immutable snapshot of named columns and string
//! cells. Cells are parsed on demand; the table itself is never modified by
//! an analysis.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// A row record: column name to raw cell text
pub type Row = HashMap<String, String>;

/// Ordered column names plus row records of raw string cells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableData")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Unvalidated wire form of [`Table`]
#[derive(Deserialize)]
struct TableData {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl TryFrom<TableData> for Table {
    type Error = AnalysisError;

    fn try_from(data: TableData) -> Result<Self, Self::Error> {
        Table::new(data.columns, data.rows)
    }
}

impl Table {
    /// Create a table, rejecting duplicate column names
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> AnalysisResult<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(AnalysisError::DuplicateColumn {
                    column: column.clone(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from positional records, mostly for tests and fixtures
    pub fn from_records<C, R, S>(columns: &[C], records: R) -> AnalysisResult<Self>
    where
        C: AsRef<str>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let rows = records
            .into_iter()
            .map(|record| names.iter().cloned().zip(record.into_iter().map(Into::into)).collect())
            .collect();
        Self::new(names, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Fail with `ColumnNotFound` unless `name` is a column
    pub fn require_column(&self, name: &str) -> AnalysisResult<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(AnalysisError::ColumnNotFound {
                column: name.to_string(),
            })
        }
    }

    /// Numeric values of a column, `None` for missing or non-numeric cells
    pub fn numeric_column(&self, column: &str) -> AnalysisResult<Vec<Option<f64>>> {
        self.require_column(column)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(column).and_then(|c| parse_numeric(c)))
            .collect())
    }

    /// Finite numeric values of a column, skipping everything else
    pub fn numeric_values(&self, column: &str) -> AnalysisResult<Vec<f64>> {
        let values: Vec<f64> = self.numeric_column(column)?.into_iter().flatten().collect();
        if values.is_empty() {
            return Err(AnalysisError::NoNumericData {
                column: column.to_string(),
            });
        }
        Ok(values)
    }

    /// Trimmed labels of a column, `None` for missing cells
    pub fn label_column(&self, column: &str) -> AnalysisResult<Vec<Option<String>>> {
        self.require_column(column)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(column).and_then(|c| parse_label(c)))
            .collect())
    }
}

/// A cell is missing iff it trims to the empty string
pub fn is_missing(cell: &str) -> bool {
    cell.trim().is_empty()
}

/// Parse a cell as a finite number.
///
/// Thousands separators (`,`) are stripped before parsing; anything that is
/// not a complete float literal, or that is NaN or infinite, is `None`.
pub fn parse_numeric(cell: &str) -> Option<f64> {
    if is_missing(cell) {
        return None;
    }
    let cleaned: String = cell.trim().chars().filter(|&c| c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a cell as a category label (trimmed, `None` when missing)
pub fn parse_label(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Sorted, deduplicated labels.
///
/// When every label parses as a number they sort numerically, otherwise
/// lexicographically.
pub fn sorted_labels<'a, I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut unique: Vec<String> = labels
        .into_iter()
        .collect::<HashSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let numeric: Option<Vec<f64>> = unique.iter().map(|l| parse_numeric(l)).collect();
    if numeric.is_some() {
        unique.sort_by(|a, b| compare_numeric_labels(a, b));
    } else {
        unique.sort();
    }
    unique
}

/// Position of each label, for bucketing observations by label
pub fn label_index(labels: &[String]) -> HashMap<&str, usize> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.as_str(), i))
        .collect()
}

fn compare_numeric_labels(a: &str, b: &str) -> Ordering {
    match (parse_numeric(a), parse_numeric(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}
