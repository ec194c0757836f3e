//! Tail probabilities for the reference distributions used by the tests
//!
//! All functions return a probability in `[0, 1]`, or NaN when the degrees of
//! freedom are not positive.

use crate::special::{incomplete_beta, normal_cdf, regularized_upper_gamma};

/// Above this many degrees of freedom the t distribution is replaced by the
/// standard normal; the continued fraction would need more than
/// [`crate::special::MAX_ITERATIONS`] terms and the two differ by < 1e-5.
pub const T_NORMAL_CUTOFF_DF: f64 = 10_000.0;

/// Two-tailed p-value of a Student t statistic: `P(|T| >= |t|)`.
///
/// Exact relation `I_{df/(df+t²)}(df/2, 1/2)`.
pub fn t_two_tailed(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    if df > T_NORMAL_CUTOFF_DF {
        return normal_two_tailed(t);
    }
    let x = df / (df + t * t);
    incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// Two-tailed p-value of a standard normal statistic
pub fn normal_two_tailed(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0)
}

/// Right-tail p-value of a chi-square statistic: `Q(df/2, x/2)`
pub fn chi_square_upper_tail(x: f64, df: f64) -> f64 {
    if x.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    regularized_upper_gamma(df / 2.0, x / 2.0)
}

/// Right-tail p-value of an F statistic with `(d1, d2)` degrees of freedom.
///
/// `P(F >= f) = I_{d2/(d2 + d1·f)}(d2/2, d1/2)`.
pub fn f_upper_tail(f: f64, d1: f64, d2: f64) -> f64 {
    if f.is_nan() || d1.is_nan() || d2.is_nan() || d1 <= 0.0 || d2 <= 0.0 {
        return f64::NAN;
    }
    if f <= 0.0 {
        return 1.0;
    }
    if f.is_infinite() {
        return 0.0;
    }
    incomplete_beta(d2 / 2.0, d1 / 2.0, d2 / (d2 + d1 * f))
}
