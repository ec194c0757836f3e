//! Hypothesis testing
//!
//! t-tests (one-sample, Welch two-sample, paired), the chi-square test of
//! independence and one-way ANOVA. Every family is available on raw slices
//! and through a table-level [`TestSpec`]. A large p-value is a valid result,
//! never an error.

use imstat_stats::{chi_square_upper_tail, f_upper_tail, mean, sample_variance, t_two_tailed};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::table::{label_index, sorted_labels, Table};

/// Degrees of freedom: a scalar, or a `(numerator, denominator)` pair for F
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Degrees {
    Single(f64),
    Pair(f64, f64),
}

/// Per-group descriptive numbers shown next to a test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub label: String,
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl GroupSummary {
    fn from_values(label: &str, values: &[f64]) -> Self {
        Self {
            label: label.to_string(),
            n: values.len(),
            mean: mean(values),
            std_dev: sample_variance(values).sqrt(),
        }
    }
}

/// Test-specific detail record, for display only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestDetails {
    OneSample {
        n: usize,
        mean: f64,
        std_dev: f64,
        mu0: f64,
    },
    TwoSample {
        first: GroupSummary,
        second: GroupSummary,
        pooled_std_dev: f64,
    },
    Paired {
        n: usize,
        mean_difference: f64,
        std_dev_difference: f64,
    },
    ChiSquare {
        n: f64,
        row_labels: Vec<String>,
        col_labels: Vec<String>,
        observed: Vec<Vec<f64>>,
        expected: Vec<Vec<f64>>,
    },
    Anova {
        groups: Vec<GroupSummary>,
        ss_between: f64,
        ss_within: f64,
        ms_between: f64,
        ms_within: f64,
    },
}

/// Uniform result record for every test family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test: String,
    pub statistic: f64,
    pub statistic_label: String,
    pub df: Degrees,
    pub p_value: f64,
    pub effect_size: Option<f64>,
    pub effect_size_label: Option<String>,
    pub details: TestDetails,
}

impl TestResult {
    /// True when `p_value < alpha`
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Outcome of the chi-square computation on an observed count table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareOutcome {
    pub statistic: f64,
    pub df: usize,
    pub p_value: f64,
    pub cramers_v: f64,
    /// Grand total of the observed counts
    pub n: f64,
    pub expected: Vec<Vec<f64>>,
}

/// Table-level test selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum TestSpec {
    OneSample {
        column: String,
        #[serde(default)]
        mu0: f64,
    },
    TwoSample {
        value_column: String,
        group_column: String,
    },
    Paired {
        first: String,
        second: String,
    },
    ChiSquare {
        row_column: String,
        col_column: String,
    },
    Anova {
        value_column: String,
        group_column: String,
    },
}

// ---------------------------------------------------------------------------
// t-tests
// ---------------------------------------------------------------------------

struct TOutcome {
    t: f64,
    df: f64,
    p: f64,
}

fn t_outcome(diff: f64, se: f64, df: f64) -> TOutcome {
    if se > 0.0 && se.is_finite() {
        let t = diff / se;
        TOutcome {
            t,
            df,
            p: t_two_tailed(t, df),
        }
    } else {
        TOutcome { t: 0.0, df, p: 1.0 }
    }
}

/// One-sample t-test of `H₀: μ = mu0`
pub fn one_sample_t(data: &[f64], mu0: f64) -> AnalysisResult<TestResult> {
    let n = data.len();
    if n < 2 {
        return Err(AnalysisError::InsufficientObservations { n, required: 2 });
    }

    let m = mean(data);
    let s = sample_variance(data).sqrt();
    let out = t_outcome(m - mu0, s / (n as f64).sqrt(), (n - 1) as f64);
    let d = if s > 0.0 { (m - mu0).abs() / s } else { 0.0 };

    Ok(TestResult {
        test: "One-sample t-test".to_string(),
        statistic: out.t,
        statistic_label: "t".to_string(),
        df: Degrees::Single(out.df),
        p_value: out.p,
        effect_size: Some(d),
        effect_size_label: Some("Cohen's d".to_string()),
        details: TestDetails::OneSample {
            n,
            mean: m,
            std_dev: s,
            mu0,
        },
    })
}

/// Welch two-sample t-test with unnamed groups
pub fn welch_t(a: &[f64], b: &[f64]) -> AnalysisResult<TestResult> {
    welch_t_labeled(("group 1", a), ("group 2", b))
}

/// Welch two-sample t-test; each group needs at least two observations
pub fn welch_t_labeled(a: (&str, &[f64]), b: (&str, &[f64])) -> AnalysisResult<TestResult> {
    for (label, values) in [a, b] {
        if values.len() < 2 {
            return Err(AnalysisError::GroupTooSmall {
                group: label.to_string(),
                n: values.len(),
                required: 2,
            });
        }
    }

    let first = GroupSummary::from_values(a.0, a.1);
    let second = GroupSummary::from_values(b.0, b.1);
    let (na, nb) = (first.n as f64, second.n as f64);
    let (va, vb) = (first.std_dev.powi(2), second.std_dev.powi(2));

    let qa = va / na;
    let qb = vb / nb;
    let se2 = qa + qb;
    let welch_df = se2 * se2 / (qa * qa / (na - 1.0) + qb * qb / (nb - 1.0));
    let df = if welch_df.is_finite() {
        welch_df
    } else {
        na + nb - 2.0
    };
    let out = t_outcome(first.mean - second.mean, se2.sqrt(), df);

    let pooled_std_dev = (((na - 1.0) * va + (nb - 1.0) * vb) / (na + nb - 2.0)).sqrt();
    let d = if pooled_std_dev > 0.0 {
        (first.mean - second.mean).abs() / pooled_std_dev
    } else {
        0.0
    };

    Ok(TestResult {
        test: "Welch two-sample t-test".to_string(),
        statistic: out.t,
        statistic_label: "t".to_string(),
        df: Degrees::Single(out.df),
        p_value: out.p,
        effect_size: Some(d),
        effect_size_label: Some("Cohen's d".to_string()),
        details: TestDetails::TwoSample {
            first,
            second,
            pooled_std_dev,
        },
    })
}

/// Paired t-test on `x[i] - y[i]`, truncated to the shorter input
pub fn paired_t(x: &[f64], y: &[f64]) -> AnalysisResult<TestResult> {
    let diffs: Vec<f64> = x.iter().zip(y).map(|(a, b)| a - b).collect();
    let n = diffs.len();
    if n < 2 {
        return Err(AnalysisError::InsufficientObservations { n, required: 2 });
    }

    let one = one_sample_t(&diffs, 0.0)?;
    Ok(TestResult {
        test: "Paired t-test".to_string(),
        details: TestDetails::Paired {
            n,
            mean_difference: mean(&diffs),
            std_dev_difference: sample_variance(&diffs).sqrt(),
        },
        ..one
    })
}

// ---------------------------------------------------------------------------
// Chi-square
// ---------------------------------------------------------------------------

/// Chi-square statistic, p-value and Cramér's V of an `r x c` count table.
///
/// Requires at least two rows and two columns. Cells with zero expected
/// count contribute nothing.
pub fn chi_square_from_counts(observed: &[Vec<f64>]) -> AnalysisResult<ChiSquareOutcome> {
    let r = observed.len();
    let c = observed.first().map_or(0, Vec::len);
    if observed.iter().any(|row| row.len() != c) {
        return Err(AnalysisError::InvalidSelection(
            "contingency table rows differ in length".to_string(),
        ));
    }
    if r < 2 || c < 2 {
        return Err(AnalysisError::TooFewGroups {
            found: r.min(c),
            required: 2,
        });
    }

    let row_totals: Vec<f64> = observed.iter().map(|row| row.iter().sum()).collect();
    let col_totals: Vec<f64> = (0..c).map(|j| observed.iter().map(|row| row[j]).sum()).collect();
    let n: f64 = row_totals.iter().sum();
    if n <= 0.0 {
        return Err(AnalysisError::InsufficientData);
    }

    let mut statistic = 0.0;
    let mut expected = vec![vec![0.0; c]; r];
    for i in 0..r {
        for j in 0..c {
            let e = row_totals[i] * col_totals[j] / n;
            expected[i][j] = e;
            if e > 0.0 {
                statistic += (observed[i][j] - e).powi(2) / e;
            }
        }
    }

    let df = (r - 1) * (c - 1);
    let min_dim = r.min(c) - 1;
    let cramers_v = if min_dim > 0 {
        (statistic / (n * min_dim as f64)).sqrt().min(1.0)
    } else {
        0.0
    };

    Ok(ChiSquareOutcome {
        statistic,
        df,
        p_value: chi_square_upper_tail(statistic, df as f64),
        cramers_v,
        n,
        expected,
    })
}

/// Chi-square test of independence between two aligned label vectors
pub fn chi_square_independence<S: AsRef<str>>(
    row_values: &[S],
    col_values: &[S],
) -> AnalysisResult<TestResult> {
    if row_values.len() != col_values.len() {
        return Err(AnalysisError::InvalidSelection(format!(
            "label vectors differ in length: {} vs {}",
            row_values.len(),
            col_values.len()
        )));
    }
    if row_values.is_empty() {
        return Err(AnalysisError::InsufficientData);
    }

    let row_labels = sorted_labels(row_values.iter().map(|s| s.as_ref()));
    let col_labels = sorted_labels(col_values.iter().map(|s| s.as_ref()));

    let row_index = label_index(&row_labels);
    let col_index = label_index(&col_labels);
    let mut observed = vec![vec![0.0; col_labels.len()]; row_labels.len()];
    for (rv, cv) in row_values.iter().zip(col_values) {
        if let (Some(&i), Some(&j)) = (row_index.get(rv.as_ref()), col_index.get(cv.as_ref())) {
            observed[i][j] += 1.0;
        }
    }

    let outcome = chi_square_from_counts(&observed)?;
    Ok(TestResult {
        test: "Chi-square test of independence".to_string(),
        statistic: outcome.statistic,
        statistic_label: "χ²".to_string(),
        df: Degrees::Single(outcome.df as f64),
        p_value: outcome.p_value,
        effect_size: Some(outcome.cramers_v),
        effect_size_label: Some("Cramér's V".to_string()),
        details: TestDetails::ChiSquare {
            n: outcome.n,
            row_labels,
            col_labels,
            observed,
            expected: outcome.expected,
        },
    })
}

// ---------------------------------------------------------------------------
// ANOVA
// ---------------------------------------------------------------------------

/// One-way ANOVA over labelled groups
pub fn one_way_anova(groups: &[(&str, &[f64])]) -> AnalysisResult<TestResult> {
    let k = groups.len();
    if k < 2 {
        return Err(AnalysisError::TooFewGroups {
            found: k,
            required: 2,
        });
    }
    if let Some((label, _)) = groups.iter().find(|(_, values)| values.is_empty()) {
        return Err(AnalysisError::GroupTooSmall {
            group: label.to_string(),
            n: 0,
            required: 1,
        });
    }

    let total_n: usize = groups.iter().map(|(_, v)| v.len()).sum();
    if total_n <= k {
        return Err(AnalysisError::InsufficientObservations {
            n: total_n,
            required: k + 1,
        });
    }

    let grand_mean =
        groups.iter().flat_map(|(_, v)| v.iter()).sum::<f64>() / total_n as f64;

    let summaries: Vec<GroupSummary> = groups
        .iter()
        .map(|(label, values)| GroupSummary::from_values(label, values))
        .collect();

    let ss_between: f64 = summaries
        .iter()
        .map(|g| g.n as f64 * (g.mean - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = groups
        .iter()
        .zip(&summaries)
        .map(|((_, values), g)| values.iter().map(|v| (v - g.mean).powi(2)).sum::<f64>())
        .sum();

    let df_between = (k - 1) as f64;
    let df_within = (total_n - k) as f64;
    let ms_between = ss_between / df_between;
    let ms_within = ss_within / df_within;

    let (f, p) = if ms_within > 0.0 {
        let f = ms_between / ms_within;
        (f, f_upper_tail(f, df_between, df_within))
    } else {
        (0.0, 1.0)
    };

    let ss_total = ss_between + ss_within;
    let eta_squared = if ss_total > 0.0 {
        ss_between / ss_total
    } else {
        0.0
    };

    Ok(TestResult {
        test: "One-way ANOVA".to_string(),
        statistic: f,
        statistic_label: "F".to_string(),
        df: Degrees::Pair(df_between, df_within),
        p_value: p,
        effect_size: Some(eta_squared),
        effect_size_label: Some("η²".to_string()),
        details: TestDetails::Anova {
            groups: summaries,
            ss_between,
            ss_within,
            ms_between,
            ms_within,
        },
    })
}

// ---------------------------------------------------------------------------
// Table-level entry point
// ---------------------------------------------------------------------------

/// Run a test against the columns of `table`
pub fn run_test(table: &Table, spec: &TestSpec) -> AnalysisResult<TestResult> {
    tracing::debug!("Running {:?} on {} rows", spec, table.len());

    let result = match spec {
        TestSpec::OneSample { column, mu0 } => {
            let values = table.numeric_values(column)?;
            one_sample_t(&values, *mu0)
        }
        TestSpec::TwoSample {
            value_column,
            group_column,
        } => {
            let groups = grouped_values(table, value_column, group_column)?;
            if groups.len() < 2 {
                tracing::warn!(
                    "Two-sample test needs two groups in '{}', found {}",
                    group_column,
                    groups.len()
                );
                return Err(AnalysisError::TooFewGroups {
                    found: groups.len(),
                    required: 2,
                });
            }
            if groups.len() > 2 {
                tracing::debug!(
                    "Ignoring {} group(s) after the first two in '{}'",
                    groups.len() - 2,
                    group_column
                );
            }
            let (a_label, a) = &groups[0];
            let (b_label, b) = &groups[1];
            welch_t_labeled((a_label.as_str(), a.as_slice()), (b_label.as_str(), b.as_slice()))
        }
        TestSpec::Paired { first, second } => {
            if first == second {
                return Err(AnalysisError::InvalidSelection(
                    "paired test needs two different columns".to_string(),
                ));
            }
            let xs = table.numeric_column(first)?;
            let ys = table.numeric_column(second)?;
            let (x, y): (Vec<f64>, Vec<f64>) = xs
                .into_iter()
                .zip(ys)
                .filter_map(|pair| match pair {
                    (Some(x), Some(y)) => Some((x, y)),
                    _ => None,
                })
                .unzip();
            paired_t(&x, &y)
        }
        TestSpec::ChiSquare {
            row_column,
            col_column,
        } => {
            if row_column == col_column {
                return Err(AnalysisError::InvalidSelection(
                    "chi-square test needs two different columns".to_string(),
                ));
            }
            let rows = table.label_column(row_column)?;
            let cols = table.label_column(col_column)?;
            let (r, c): (Vec<String>, Vec<String>) = rows
                .into_iter()
                .zip(cols)
                .filter_map(|pair| match pair {
                    (Some(r), Some(c)) => Some((r, c)),
                    _ => None,
                })
                .unzip();
            chi_square_independence(&r, &c)
        }
        TestSpec::Anova {
            value_column,
            group_column,
        } => {
            let groups = grouped_values(table, value_column, group_column)?;
            let borrowed: Vec<(&str, &[f64])> = groups
                .iter()
                .map(|(label, values)| (label.as_str(), values.as_slice()))
                .collect();
            one_way_anova(&borrowed)
        }
    };

    if let Ok(r) = &result {
        tracing::info!("{}: {}={:.4}, p={:.4}", r.test, r.statistic_label, r.statistic, r.p_value);
    }
    result
}

/// Numeric values grouped by label, groups in order of first appearance
fn grouped_values(
    table: &Table,
    value_column: &str,
    group_column: &str,
) -> AnalysisResult<Vec<(String, Vec<f64>)>> {
    if value_column == group_column {
        return Err(AnalysisError::InvalidSelection(
            "value and group columns must differ".to_string(),
        ));
    }
    let values = table.numeric_column(value_column)?;
    let labels = table.label_column(group_column)?;

    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for (value, label) in values.into_iter().zip(labels) {
        let (Some(value), Some(label)) = (value, label) else {
            continue;
        };
        match groups.iter_mut().find(|(l, _)| *l == label) {
            Some((_, group)) => group.push(value),
            None => groups.push((label, vec![value])),
        }
    }
    if groups.is_empty() {
        return Err(AnalysisError::NoNumericData {
            column: value_column.to_string(),
        });
    }
    Ok(groups)
}
