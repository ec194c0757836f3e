//! imstat-core - Statistical analysis engine
//!
//! Runs analyses over a snapshot of tabular data whose cells are raw strings:
//!
//! - **Regression**: ordinary least squares with coefficient and model statistics
//! - **Testing**: one-sample, Welch and paired t-tests, chi-square independence, one-way ANOVA
//! - **Cross-tabulation**: aggregated contingency tables with a chi-square block
//! - **Simulation**: Monte Carlo over random variables and a user formula
//!
//! Every analysis is a pure function of its inputs and returns a fresh result
//! record. [`AnalysisRequest`] and [`AnalysisResponse`] wrap them for JSON
//! transport, and [`AnalysisRunner`] executes them off the async runtime.
//!
//! # Example
//!
//! ```
//! use imstat_core::{run_regression, RegressionConfig, RegressionSpec, Table};
//!
//! let table = Table::from_records(
//!     &["x", "y"],
//!     vec![vec!["1", "5"], vec!["2", "8"], vec!["3", "11"], vec!["4", "14"]],
//! )
//! .unwrap();
//! let spec = RegressionSpec::new("y", &["x"]);
//! let result = run_regression(&table, &spec, &RegressionConfig::default()).unwrap();
//! assert!((result.coefficients[1].estimate - 3.0).abs() < 1e-9);
//! ```

pub mod config;
pub mod crosstab;
pub mod error;
pub mod regression;
pub mod request;
pub mod runner;
pub mod sampler;
pub mod simulation;
pub mod table;
pub mod testing;

pub use config::*;
pub use crosstab::*;
pub use error::*;
pub use regression::*;
pub use request::*;
pub use runner::*;
pub use sampler::*;
pub use simulation::*;
pub use table::*;
pub use testing::*;

pub use imstat_expr::{CompiledExpression, Diagnostic, EvalStats};
