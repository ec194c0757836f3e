//! Cross-tabulation
//!
//! Aggregates observations into a row-label x column-label matrix, with
//! totals, a percentage view and, for count tables, a chi-square test of
//! independence.

use imstat_stats::median;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::table::{label_index, sorted_labels, Table};
use crate::testing::{chi_square_from_counts, ChiSquareOutcome};

/// How the values in a cell are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Count,
    Sum,
    Mean,
    Min,
    Max,
    Median,
}

impl Aggregation {
    /// Combine the values of one cell; an empty cell is 0
    pub fn apply(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Aggregation::Count => values.len() as f64,
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Median => median(values),
        }
    }
}

/// Presentation of the aggregated matrix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Raw,
    RowPercent,
    ColPercent,
    TotalPercent,
}

/// Cross-tabulation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossTabSpec {
    pub row_column: String,
    pub col_column: String,
    /// Column whose numeric values are aggregated; counts rows when absent
    #[serde(default)]
    pub value_column: Option<String>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub display: DisplayMode,
}

impl CrossTabSpec {
    pub fn counts(row_column: impl Into<String>, col_column: impl Into<String>) -> Self {
        Self {
            row_column: row_column.into(),
            col_column: col_column.into(),
            value_column: None,
            aggregation: Aggregation::Count,
            display: DisplayMode::Raw,
        }
    }
}

/// Result of a cross-tabulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossTabResult {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub aggregation: Aggregation,
    /// Aggregated values, `row_labels.len() x col_labels.len()`
    pub matrix: Vec<Vec<f64>>,
    pub row_totals: Vec<f64>,
    pub col_totals: Vec<f64>,
    pub grand_total: f64,
    pub display: DisplayMode,
    /// `matrix` transformed to the display mode
    pub display_matrix: Vec<Vec<f64>>,
    /// Present for count tables of at least 2x2 with a positive total
    pub chi_square: Option<ChiSquareOutcome>,
}

/// Build a cross-tabulation of `table`
pub fn run_crosstab(table: &Table, spec: &CrossTabSpec) -> AnalysisResult<CrossTabResult> {
    if spec.row_column == spec.col_column {
        return Err(AnalysisError::InvalidSelection(
            "row and column variables must differ".to_string(),
        ));
    }
    tracing::debug!(
        "Cross-tab {} x {} ({:?}) over {} rows",
        spec.row_column,
        spec.col_column,
        spec.aggregation,
        table.len()
    );

    let row_values = table.label_column(&spec.row_column)?;
    let col_values = table.label_column(&spec.col_column)?;
    let cell_values: Vec<Option<f64>> = match &spec.value_column {
        Some(column) => table.numeric_column(column)?,
        None => vec![Some(1.0); table.len()],
    };

    let observations: Vec<(String, String, f64)> = row_values
        .into_iter()
        .zip(col_values)
        .zip(cell_values)
        .filter_map(|((r, c), v)| Some((r?, c?, v?)))
        .collect();
    if observations.is_empty() {
        return Err(AnalysisError::InsufficientData);
    }

    let row_labels = sorted_labels(observations.iter().map(|(r, _, _)| r.as_str()));
    let col_labels = sorted_labels(observations.iter().map(|(_, c, _)| c.as_str()));

    let row_index = label_index(&row_labels);
    let col_index = label_index(&col_labels);
    let mut cells: Vec<Vec<Vec<f64>>> = vec![vec![Vec::new(); col_labels.len()]; row_labels.len()];
    for (r, c, v) in &observations {
        if let (Some(&i), Some(&j)) = (row_index.get(r.as_str()), col_index.get(c.as_str())) {
            cells[i][j].push(*v);
        }
    }

    let matrix: Vec<Vec<f64>> = cells
        .iter()
        .map(|row| row.iter().map(|cell| spec.aggregation.apply(cell)).collect())
        .collect();

    let row_totals: Vec<f64> = matrix.iter().map(|row| row.iter().sum()).collect();
    let col_totals: Vec<f64> = (0..col_labels.len())
        .map(|j| matrix.iter().map(|row| row[j]).sum())
        .collect();
    let grand_total: f64 = row_totals.iter().sum();

    let display_matrix = display_view(&matrix, &row_totals, &col_totals, grand_total, spec.display);

    let chi_square = if spec.aggregation == Aggregation::Count
        && grand_total > 0.0
        && row_labels.len() >= 2
        && col_labels.len() >= 2
    {
        Some(chi_square_from_counts(&matrix)?)
    } else {
        None
    };

    tracing::info!(
        "Cross-tab complete: {}x{} cells, total {}",
        row_labels.len(),
        col_labels.len(),
        grand_total
    );

    Ok(CrossTabResult {
        row_labels,
        col_labels,
        aggregation: spec.aggregation,
        matrix,
        row_totals,
        col_totals,
        grand_total,
        display: spec.display,
        display_matrix,
        chi_square,
    })
}

fn percent(value: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        value / total * 100.0
    }
}

fn display_view(
    matrix: &[Vec<f64>],
    row_totals: &[f64],
    col_totals: &[f64],
    grand_total: f64,
    mode: DisplayMode,
) -> Vec<Vec<f64>> {
    matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(|(j, &v)| match mode {
                    DisplayMode::Raw => v,
                    DisplayMode::RowPercent => percent(v, row_totals[i]),
                    DisplayMode::ColPercent => percent(v, col_totals[j]),
                    DisplayMode::TotalPercent => percent(v, grand_total),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sales() -> Table {
        Table::from_records(
            &["region", "product", "amount"],
            vec![
                vec!["north", "a", "10"],
                vec!["north", "a", "20"],
                vec!["north", "b", "5"],
                vec!["south", "a", "1,000"],
                vec!["south", "b", ""],
                vec!["", "b", "7"],
                vec!["south", "b", "3"],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_counts_and_totals() {
        let result = run_crosstab(&sales(), &CrossTabSpec::counts("region", "product")).unwrap();
        assert_eq!(result.row_labels, vec!["north", "south"]);
        assert_eq!(result.col_labels, vec!["a", "b"]);
        assert_eq!(result.matrix, vec![vec![2.0, 1.0], vec![1.0, 2.0]]);
        assert_eq!(result.row_totals, vec![3.0, 3.0]);
        assert_eq!(result.col_totals, vec![3.0, 3.0]);
        assert_eq!(result.grand_total, 6.0);
        assert!(result.chi_square.is_some());
    }

    #[rstest]
    #[case(Aggregation::Sum, vec![vec![30.0, 5.0], vec![1000.0, 3.0]])]
    #[case(Aggregation::Mean, vec![vec![15.0, 5.0], vec![1000.0, 3.0]])]
    #[case(Aggregation::Min, vec![vec![10.0, 5.0], vec![1000.0, 3.0]])]
    #[case(Aggregation::Max, vec![vec![20.0, 5.0], vec![1000.0, 3.0]])]
    #[case(Aggregation::Median, vec![vec![15.0, 5.0], vec![1000.0, 3.0]])]
    #[case(Aggregation::Count, vec![vec![2.0, 1.0], vec![1.0, 1.0]])]
    fn test_value_aggregation(#[case] aggregation: Aggregation, #[case] expected: Vec<Vec<f64>>) {
        let spec = CrossTabSpec {
            value_column: Some("amount".to_string()),
            aggregation,
            ..CrossTabSpec::counts("region", "product")
        };
        let result = run_crosstab(&sales(), &spec).unwrap();
        assert_eq!(result.matrix, expected);
        assert_eq!(result.chi_square.is_some(), aggregation == Aggregation::Count);
    }

    #[test]
    fn test_row_percent_view() {
        let spec = CrossTabSpec {
            display: DisplayMode::RowPercent,
            ..CrossTabSpec::counts("region", "product")
        };
        let result = run_crosstab(&sales(), &spec).unwrap();
        let first = &result.display_matrix[0];
        assert!((first[0] - 200.0 / 3.0).abs() < 1e-12);
        assert!((first.iter().sum::<f64>() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_cells_are_zero_and_percent_guarded() {
        let table = Table::from_records(
            &["r", "c"],
            vec![vec!["x", "p"], vec!["y", "q"]],
        )
        .unwrap();
        let spec = CrossTabSpec {
            display: DisplayMode::ColPercent,
            ..CrossTabSpec::counts("r", "c")
        };
        let result = run_crosstab(&table, &spec).unwrap();
        assert_eq!(result.matrix, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(result.display_matrix, vec![vec![100.0, 0.0], vec![0.0, 100.0]]);
    }

    #[test]
    fn test_single_row_has_no_chi_square() {
        let table =
            Table::from_records(&["r", "c"], vec![vec!["x", "p"], vec!["x", "q"]]).unwrap();
        let result = run_crosstab(&table, &CrossTabSpec::counts("r", "c")).unwrap();
        assert!(result.chi_square.is_none());
    }

    #[test]
    fn test_numeric_labels_sort_numerically() {
        let table = Table::from_records(
            &["size", "c"],
            vec![vec!["10", "p"], vec!["9", "p"], vec!["100", "q"]],
        )
        .unwrap();
        let result = run_crosstab(&table, &CrossTabSpec::counts("size", "c")).unwrap();
        assert_eq!(result.row_labels, vec!["9", "10", "100"]);
    }

    #[test]
    fn test_same_variable_rejected() {
        assert!(matches!(
            run_crosstab(&sales(), &CrossTabSpec::counts("region", "region")),
            Err(AnalysisError::InvalidSelection(_))
        ));
    }
}
