//! Error types for imstat-core
//!
//! Input problems (too little data, singular designs, bad selections) are
//! ordinary values of [`AnalysisError`] that the caller renders as a message.
//! Statistically unremarkable outcomes such as `p >= 0.05` are never errors.

use imstat_stats::MatrixError;
use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for analysis operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// No row has usable values in the selected columns
    #[error("No valid observations in the selected columns")]
    InsufficientData,

    /// Not enough rows for the number of estimated parameters
    #[error("Insufficient observations: {n} valid rows, at least {required} required")]
    InsufficientObservations { n: usize, required: usize },

    /// The design matrix X'X cannot be inverted
    #[error("Singular design matrix (perfect multicollinearity among predictors)")]
    SingularMatrix,

    /// Selected column is not part of the table
    #[error("Column '{column}' not found")]
    ColumnNotFound { column: String },

    /// Selected column has no numeric values
    #[error("Column '{column}' contains no numeric data")]
    NoNumericData { column: String },

    /// Grouped test with too few categories
    #[error("Found {found} groups, at least {required} required")]
    TooFewGroups { found: usize, required: usize },

    /// A group in a grouped test is too small
    #[error("Group '{group}' has {n} observations, at least {required} required")]
    GroupTooSmall {
        group: String,
        n: usize,
        required: usize,
    },

    /// Inconsistent variable selection
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Out-of-range parameter
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Two simulation variables share a name
    #[error("Duplicate variable name '{name}'")]
    DuplicateVariable { name: String },

    /// Two table columns share a name
    #[error("Duplicate column name '{column}'")]
    DuplicateColumn { column: String },

    /// The run was cancelled or superseded before it finished
    #[error("Analysis cancelled")]
    Cancelled,

    /// The worker running the analysis panicked
    #[error("Internal error: analysis run panicked: {0}")]
    Internal(String),

    /// Engine configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Matrix kernel contract violation
    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),
}

impl AnalysisError {
    /// Shorthand for [`AnalysisError::InvalidParameter`]
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the data or selection rather than the engine
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            AnalysisError::Cancelled | AnalysisError::Internal(_) | AnalysisError::Matrix(_)
        )
    }
}

/// Result type alias for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_observations_display() {
        let err = AnalysisError::InsufficientObservations { n: 2, required: 3 };
        let message = err.to_string();
        assert!(message.contains('2'));
        assert!(message.contains('3'));
    }

    #[test]
    fn test_singular_mentions_multicollinearity() {
        assert!(AnalysisError::SingularMatrix
            .to_string()
            .contains("multicollinearity"));
    }

    #[test]
    fn test_matrix_error_converts() {
        let err: AnalysisError = MatrixError::NotSquare { rows: 2, cols: 3 }.into();
        assert!(!err.is_input_error());
        assert!(err.to_string().contains("2x3"));
    }

    #[test]
    fn test_internal_is_not_an_input_error() {
        let err = AnalysisError::Internal("index out of bounds".to_string());
        assert!(!err.is_input_error());
        assert_ne!(err, AnalysisError::Cancelled);
        assert!(err.to_string().contains("index out of bounds"));
    }

    #[test]
    fn test_column_not_found_display() {
        let err = AnalysisError::ColumnNotFound {
            column: "price".to_string(),
        };
        assert!(err.is_input_error());
        assert!(err.to_string().contains("price"));
    }
}
