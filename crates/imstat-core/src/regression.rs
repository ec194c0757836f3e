//! Ordinary least squares regression
//!
//! Fits `y = β₀ + β₁x₁ + … + β_k x_k` by solving the normal equations with
//! the Gauss-Jordan inverse from `imstat-stats`, and reports the usual model
//! and coefficient statistics.

use std::collections::HashSet;

use imstat_stats::{f_upper_tail, mean, t_two_tailed, Matrix, MatrixError};
use serde::{Deserialize, Serialize};

use crate::config::RegressionConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::table::Table;

/// Name reported for the intercept term
pub const INTERCEPT: &str = "(Intercept)";

/// Column selection for a regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSpec {
    /// Dependent (response) column
    pub dependent: String,
    /// Predictor columns, in design-matrix order
    pub predictors: Vec<String>,
}

impl RegressionSpec {
    pub fn new(dependent: impl Into<String>, predictors: &[&str]) -> Self {
        Self {
            dependent: dependent.into(),
            predictors: predictors.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Reject empty, repeated or self-referencing selections
    pub fn validate(&self, table: &Table) -> AnalysisResult<()> {
        if self.predictors.is_empty() {
            return Err(AnalysisError::InvalidSelection(
                "at least one predictor is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for predictor in &self.predictors {
            if predictor == &self.dependent {
                return Err(AnalysisError::InvalidSelection(format!(
                    "'{}' is both the dependent variable and a predictor",
                    predictor
                )));
            }
            if !seen.insert(predictor.as_str()) {
                return Err(AnalysisError::InvalidSelection(format!(
                    "predictor '{}' is selected twice",
                    predictor
                )));
            }
        }

        table.require_column(&self.dependent)?;
        for predictor in &self.predictors {
            table.require_column(predictor)?;
        }
        Ok(())
    }
}

/// One estimated coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_stat: f64,
    pub p_value: f64,
}

/// Result of an OLS fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    pub dependent: String,
    pub predictors: Vec<String>,
    /// Intercept first, then one per predictor
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub residual_std_error: f64,
    /// Regression (explained) sum of squares
    pub ssr: f64,
    /// Residual sum of squares
    pub sse: f64,
    /// Total sum of squares
    pub sst: f64,
    /// Residual degrees of freedom, `n - k - 1`
    pub dof: usize,
    /// Valid observations
    pub n: usize,
    /// Number of predictors
    pub k: usize,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    pub actual: Vec<f64>,
}

impl RegressionResult {
    /// Look up a coefficient by name
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    pub fn intercept(&self) -> &Coefficient {
        &self.coefficients[0]
    }
}

/// Fit a regression over the rows of `table` where every selected cell is numeric
pub fn run_regression(
    table: &Table,
    spec: &RegressionSpec,
    config: &RegressionConfig,
) -> AnalysisResult<RegressionResult> {
    spec.validate(table)?;
    tracing::debug!(
        "OLS on {} rows: {} ~ {}",
        table.len(),
        spec.dependent,
        spec.predictors.join(" + ")
    );

    let y_column = table.numeric_column(&spec.dependent)?;
    let x_columns = spec
        .predictors
        .iter()
        .map(|p| table.numeric_column(p))
        .collect::<AnalysisResult<Vec<_>>>()?;

    let k = spec.predictors.len();
    let mut y = Vec::new();
    let mut x: Vec<Vec<f64>> = vec![Vec::new(); k];
    for (i, yi) in y_column.iter().enumerate() {
        let Some(yi) = yi else { continue };
        let row: Option<Vec<f64>> = x_columns.iter().map(|col| col[i]).collect();
        if let Some(row) = row {
            y.push(*yi);
            for (column, value) in x.iter_mut().zip(row) {
                column.push(value);
            }
        }
    }

    let predictors: Vec<(&str, &[f64])> = spec
        .predictors
        .iter()
        .map(String::as_str)
        .zip(x.iter().map(Vec::as_slice))
        .collect();

    let result = ols(&spec.dependent, &y, &predictors, config.singular_tolerance)?;
    tracing::info!(
        "OLS fit complete: n={}, k={}, R²={:.4}",
        result.n,
        result.k,
        result.r_squared
    );
    Ok(result)
}

/// Fit OLS on already-aligned vectors.
///
/// `predictors` pairs a name with a column of the same length as `y`.
pub fn ols(
    dependent: &str,
    y: &[f64],
    predictors: &[(&str, &[f64])],
    tolerance: f64,
) -> AnalysisResult<RegressionResult> {
    let n = y.len();
    let k = predictors.len();

    if let Some((name, column)) = predictors.iter().find(|(_, c)| c.len() != n) {
        return Err(AnalysisError::InvalidSelection(format!(
            "predictor '{}' has {} values, expected {}",
            name,
            column.len(),
            n
        )));
    }
    if n == 0 {
        return Err(AnalysisError::InsufficientData);
    }
    if n <= k + 1 {
        return Err(AnalysisError::InsufficientObservations { n, required: k + 2 });
    }

    let p = k + 1;
    let mut design = Vec::with_capacity(n * p);
    for i in 0..n {
        design.push(1.0);
        design.extend(predictors.iter().map(|(_, column)| column[i]));
    }
    let x = Matrix::from_vec(n, p, design)?;
    let xt = x.transpose();
    let xtx = xt.multiply(&x)?;
    let xtx_inv = match normal_matrix_inverse(&xtx, tolerance) {
        Ok(inv) => inv,
        Err(MatrixError::Singular { column }) => {
            tracing::warn!("Singular design matrix at column {} of {}", column, p);
            return Err(AnalysisError::SingularMatrix);
        }
        Err(e) => return Err(e.into()),
    };

    let xty = xt.mul_vec(y)?;
    let beta = xtx_inv.mul_vec(&xty)?;
    let fitted = x.mul_vec(&beta)?;
    let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(yi, fi)| yi - fi).collect();

    let y_mean = mean(y);
    let sse: f64 = residuals.iter().map(|e| e * e).sum();
    let sst: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
    let ssr = (sst - sse).max(0.0);
    let dof = n - k - 1;
    let dof_f = dof as f64;

    let (r_squared, adj_r_squared) = if sst > 0.0 {
        let r2 = (1.0 - sse / sst).clamp(0.0, 1.0);
        (r2, 1.0 - (1.0 - r2) * (n as f64 - 1.0) / dof_f)
    } else {
        (1.0, 1.0)
    };

    let mse = sse / dof_f;
    let residual_std_error = mse.sqrt();

    let names = std::iter::once(INTERCEPT).chain(predictors.iter().map(|(name, _)| *name));
    let coefficients = names
        .zip(beta.iter().zip(xtx_inv.diagonal()))
        .map(|(name, (&estimate, d))| {
            let std_error = (d.max(0.0) * mse).sqrt();
            let t_stat = if std_error > 0.0 {
                estimate / std_error
            } else {
                0.0
            };
            Coefficient {
                name: name.to_string(),
                estimate,
                std_error,
                t_stat,
                p_value: t_two_tailed(t_stat, dof_f),
            }
        })
        .collect();

    let (f_statistic, f_p_value) = if k > 0 && mse > 0.0 {
        let f = (ssr / k as f64) / mse;
        (f, f_upper_tail(f, k as f64, dof_f))
    } else {
        (0.0, 1.0)
    };

    Ok(RegressionResult {
        dependent: dependent.to_string(),
        predictors: predictors.iter().map(|(name, _)| name.to_string()).collect(),
        coefficients,
        r_squared,
        adj_r_squared,
        f_statistic,
        f_p_value,
        residual_std_error,
        ssr,
        sse,
        sst,
        dof,
        n,
        k,
        fitted,
        residuals,
        actual: y.to_vec(),
    })
}

/// Invert X'X after scaling it to unit diagonal.
///
/// Scaling makes the pivot tolerance independent of the predictors' units,
/// so exactly collinear columns produce exactly zero pivots.
fn normal_matrix_inverse(xtx: &Matrix, tolerance: f64) -> Result<Matrix, MatrixError> {
    let p = xtx.rows();
    let diag = xtx.diagonal();
    if let Some(column) = diag.iter().position(|&d| d <= 0.0) {
        return Err(MatrixError::Singular { column });
    }
    let scale: Vec<f64> = diag.iter().map(|d| 1.0 / d.sqrt()).collect();

    let mut scaled = Vec::with_capacity(p * p);
    for i in 0..p {
        for j in 0..p {
            scaled.push(xtx[(i, j)] * scale[i] * scale[j]);
        }
    }
    let inv = Matrix::from_vec(p, p, scaled)?.inverse_with_tolerance(tolerance)?;

    let mut unscaled = Vec::with_capacity(p * p);
    for i in 0..p {
        for j in 0..p {
            unscaled.push(inv[(i, j)] * scale[i] * scale[j]);
        }
    }
    Matrix::from_vec(p, p, unscaled)
}
