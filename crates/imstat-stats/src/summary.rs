//! Summary statistics for numeric samples
//!
//! Provides the descriptive numbers the analyses report alongside their
//! statistics:
//! - Mean, sample and population standard deviation
//! - Min, max
//! - Median (even/odd midpoint rule) and nearest-rank percentiles

use serde::{Deserialize, Serialize};

/// Summary statistics for a numeric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Number of finite values
    pub count: usize,
    /// Number of NaN/infinite values that were skipped
    pub missing: usize,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Mean (average)
    pub mean: f64,
    /// Sample variance (n - 1 denominator)
    pub variance: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Population standard deviation (n denominator)
    pub population_std_dev: f64,
    /// Median (50th percentile)
    pub median: f64,
}

impl SummaryStats {
    /// Compute summary statistics from data, skipping non-finite values
    pub fn from_data(data: &[f64]) -> Self {
        let finite: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
        let missing = data.len() - finite.len();

        if finite.is_empty() {
            return Self::empty(missing);
        }

        let count = finite.len();
        let mean = mean(&finite);
        let ss: f64 = finite.iter().map(|x| (x - mean).powi(2)).sum();
        let variance = if count > 1 {
            ss / (count - 1) as f64
        } else {
            0.0
        };

        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut sorted = finite;
        sort_floats(&mut sorted);

        Self {
            count,
            missing,
            min,
            max,
            mean,
            variance,
            std_dev: variance.sqrt(),
            population_std_dev: (ss / count as f64).sqrt(),
            median: median_sorted(&sorted),
        }
    }

    /// Statistics for a sample with no finite values (all NaN)
    fn empty(missing: usize) -> Self {
        Self {
            count: 0,
            missing,
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            variance: f64::NAN,
            std_dev: f64::NAN,
            population_std_dev: f64::NAN,
            median: f64::NAN,
        }
    }

    /// Get the range (max - min)
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Standard error of the mean (`s / sqrt(n)`)
    pub fn standard_error(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.std_dev / (self.count as f64).sqrt()
    }
}

/// Arithmetic mean; NaN for an empty slice
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample variance with an `n - 1` denominator; 0 for fewer than two values
pub fn sample_variance(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Sort floats ascending, NaN last
pub fn sort_floats(data: &mut [f64]) {
    data.sort_by(|a, b| a.total_cmp(b));
}

/// Median of an already sorted slice using the even/odd midpoint rule
pub fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Median of an unsorted slice
pub fn median(data: &[f64]) -> f64 {
    let mut sorted = data.to_vec();
    sort_floats(&mut sorted);
    median_sorted(&sorted)
}

/// Nearest-rank percentile of a sorted slice, `q` in `[0, 1]`.
///
/// Returns the element at index `ceil(q * n) - 1`, clamped to the slice.
pub fn percentile_nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let rank = (q.clamp(0.0, 1.0) * n as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(n - 1)]
}
