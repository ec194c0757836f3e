//! Dense row-major matrices
//!
//! Small, allocation-simple matrix type used by the regression engine.
//! Every operation checks dimensions and returns a fresh matrix; inputs are
//! never modified.

use std::ops::Index;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pivot magnitude below which a matrix is treated as singular.
pub const DEFAULT_PIVOT_TOLERANCE: f64 = 1e-12;

/// Errors from matrix operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatrixError {
    /// Operand shapes are incompatible
    #[error("Dimension mismatch in {op}: {left:?} vs {right:?}")]
    DimensionMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// Operation requires a square matrix
    #[error("Matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// No usable pivot was found in a column
    #[error("Matrix is singular (no pivot in column {column})")]
    Singular { column: usize },
}

/// Result type alias for matrix operations
pub type MatrixResult<T> = Result<T, MatrixError>;

/// A rectangular matrix of `f64` stored row by row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a `rows x cols` matrix filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create the `n x n` identity matrix
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Build a matrix from a flat row-major buffer
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> MatrixResult<Self> {
        if data.len() != rows * cols {
            return Err(MatrixError::DimensionMismatch {
                op: "from_vec",
                left: (rows, cols),
                right: (data.len(), 1),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from nested rows, which must all have the same length
    pub fn from_rows(rows: &[Vec<f64>]) -> MatrixResult<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_rows * n_cols);

        for row in rows {
            if row.len() != n_cols {
                return Err(MatrixError::DimensionMismatch {
                    op: "from_rows",
                    left: (n_rows, n_cols),
                    right: (1, row.len()),
                });
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Element at `(i, j)`, or `None` when out of bounds
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.rows && j < self.cols {
            Some(self.data[i * self.cols + j])
        } else {
            None
        }
    }

    /// Borrow row `i`
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Main diagonal (length `min(rows, cols)`)
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.rows.min(self.cols))
            .map(|i| self.data[i * self.cols + i])
            .collect()
    }

    /// Copy out as nested rows
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|i| self.row(i).to_vec()).collect()
    }

    /// Transpose
    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        out
    }

    /// Matrix product `self * other`
    pub fn multiply(&self, other: &Matrix) -> MatrixResult<Matrix> {
        if self.cols != other.rows {
            return Err(MatrixError::DimensionMismatch {
                op: "multiply",
                left: self.shape(),
                right: other.shape(),
            });
        }

        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == 0.0 {
                    continue;
                }
                let other_row = other.row(k);
                let out_row = &mut out.data[i * other.cols..(i + 1) * other.cols];
                for (o, &b) in out_row.iter_mut().zip(other_row) {
                    *o += a * b;
                }
            }
        }
        Ok(out)
    }

    /// Matrix-vector product `self * v`
    pub fn mul_vec(&self, v: &[f64]) -> MatrixResult<Vec<f64>> {
        if self.cols != v.len() {
            return Err(MatrixError::DimensionMismatch {
                op: "mul_vec",
                left: self.shape(),
                right: (v.len(), 1),
            });
        }

        Ok((0..self.rows)
            .map(|i| self.row(i).iter().zip(v).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// Inverse using [`DEFAULT_PIVOT_TOLERANCE`]
    pub fn inverse(&self) -> MatrixResult<Matrix> {
        self.inverse_with_tolerance(DEFAULT_PIVOT_TOLERANCE)
    }

    /// Gauss-Jordan inverse with partial pivoting over the augmented `[A | I]`.
    ///
    /// For each column the remaining row with the largest magnitude entry is
    /// swapped into pivot position; if that magnitude is below `tolerance`
    /// the matrix is reported as [`MatrixError::Singular`].
    pub fn inverse_with_tolerance(&self, tolerance: f64) -> MatrixResult<Matrix> {
        if !self.is_square() {
            return Err(MatrixError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            });
        }

        let n = self.rows;
        let width = 2 * n;
        let mut aug = vec![0.0; n * width];
        for i in 0..n {
            aug[i * width..i * width + n].copy_from_slice(self.row(i));
            aug[i * width + n + i] = 1.0;
        }

        for col in 0..n {
            let mut pivot_row = col;
            let mut pivot_abs = aug[col * width + col].abs();
            for r in (col + 1)..n {
                let candidate = aug[r * width + col].abs();
                if candidate > pivot_abs {
                    pivot_abs = candidate;
                    pivot_row = r;
                }
            }

            if pivot_abs < tolerance || !pivot_abs.is_finite() {
                return Err(MatrixError::Singular { column: col });
            }

            if pivot_row != col {
                for j in 0..width {
                    aug.swap(col * width + j, pivot_row * width + j);
                }
            }

            let pivot = aug[col * width + col];
            for j in 0..width {
                aug[col * width + j] /= pivot;
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = aug[r * width + col];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..width {
                    aug[r * width + j] -= factor * aug[col * width + j];
                }
            }
        }

        let mut inv = Matrix::zeros(n, n);
        for i in 0..n {
            inv.data[i * n..(i + 1) * n].copy_from_slice(&aug[i * width + n..(i + 1) * width]);
        }
        Ok(inv)
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        assert!(i < self.rows && j < self.cols, "matrix index out of bounds");
        &self.data[i * self.cols + j]
    }
}
