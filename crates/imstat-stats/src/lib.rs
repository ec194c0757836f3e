//! imstat-stats - Numerical primitives for the imstat analysis engine
//!
//! This crate provides the building blocks the analyses are computed from,
//! implemented without an external statistics library:
//!
//! - **Matrix**: dense row-major matrices with a Gauss-Jordan inverse
//! - **Special functions**: log-gamma, normal CDF, incomplete gamma and beta
//! - **Distribution tails**: t, chi-square and F p-values
//! - **Summary**: mean, variance, median and nearest-rank percentiles

pub mod distribution;
pub mod matrix;
pub mod special;
pub mod summary;

pub use distribution::*;
pub use matrix::*;
pub use special::*;
pub use summary::*;
