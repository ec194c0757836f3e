//! Random variables and variate samplers
//!
//! Each sampler draws one value from a uniform `[0, 1)` source. The source
//! is any [`rand::Rng`], so simulations are reproducible from a seed.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AnalysisError, AnalysisResult};

/// Above this many trials the binomial uses its normal approximation
pub const BINOMIAL_EXACT_MAX_N: u64 = 200;

/// Above this rate the Poisson uses its normal approximation
pub const POISSON_KNUTH_MAX_LAMBDA: f64 = 30.0;

/// Distribution family without parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    Normal,
    Uniform,
    Binomial,
    Exponential,
    Poisson,
}

/// A distribution together with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    Normal { mean: f64, sd: f64 },
    Uniform { min: f64, max: f64 },
    Binomial { n: u64, p: f64 },
    Exponential { rate: f64 },
    Poisson { lambda: f64 },
}

impl Default for Distribution {
    fn default() -> Self {
        Distribution::defaults_for(DistributionKind::Normal)
    }
}

impl Distribution {
    /// Default parameters of a family
    pub fn defaults_for(kind: DistributionKind) -> Self {
        match kind {
            DistributionKind::Normal => Distribution::Normal { mean: 0.0, sd: 1.0 },
            DistributionKind::Uniform => Distribution::Uniform { min: 0.0, max: 1.0 },
            DistributionKind::Binomial => Distribution::Binomial { n: 10, p: 0.5 },
            DistributionKind::Exponential => Distribution::Exponential { rate: 1.0 },
            DistributionKind::Poisson => Distribution::Poisson { lambda: 1.0 },
        }
    }

    pub fn kind(&self) -> DistributionKind {
        match self {
            Distribution::Normal { .. } => DistributionKind::Normal,
            Distribution::Uniform { .. } => DistributionKind::Uniform,
            Distribution::Binomial { .. } => DistributionKind::Binomial,
            Distribution::Exponential { .. } => DistributionKind::Exponential,
            Distribution::Poisson { .. } => DistributionKind::Poisson,
        }
    }

    /// Check parameter ranges
    pub fn validate(&self) -> AnalysisResult<()> {
        let finite = |name: &str, v: f64| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(AnalysisError::invalid_parameter(name, "must be finite"))
            }
        };

        match *self {
            Distribution::Normal { mean, sd } => {
                finite("mean", mean)?;
                finite("sd", sd)?;
                if sd < 0.0 {
                    return Err(AnalysisError::invalid_parameter("sd", "must be non-negative"));
                }
            }
            Distribution::Uniform { min, max } => {
                finite("min", min)?;
                finite("max", max)?;
                if min > max {
                    return Err(AnalysisError::invalid_parameter(
                        "min",
                        format!("{} exceeds max {}", min, max),
                    ));
                }
            }
            Distribution::Binomial { p, .. } => {
                if !(0.0..=1.0).contains(&p) {
                    return Err(AnalysisError::invalid_parameter("p", "must be in [0, 1]"));
                }
            }
            Distribution::Exponential { rate } => {
                if !(rate > 0.0 && rate.is_finite()) {
                    return Err(AnalysisError::invalid_parameter("rate", "must be positive"));
                }
            }
            Distribution::Poisson { lambda } => {
                finite("lambda", lambda)?;
                if lambda < 0.0 {
                    return Err(AnalysisError::invalid_parameter(
                        "lambda",
                        "must be non-negative",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Theoretical mean
    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Normal { mean, .. } => mean,
            Distribution::Uniform { min, max } => (min + max) / 2.0,
            Distribution::Binomial { n, p } => n as f64 * p,
            Distribution::Exponential { rate } => 1.0 / rate,
            Distribution::Poisson { lambda } => lambda,
        }
    }

    /// Draw one value
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Distribution::Normal { mean, sd } => sample_normal(rng, mean, sd),
            Distribution::Uniform { min, max } => sample_uniform(rng, min, max),
            Distribution::Binomial { n, p } => sample_binomial(rng, n, p),
            Distribution::Exponential { rate } => sample_exponential(rng, rate),
            Distribution::Poisson { lambda } => sample_poisson(rng, lambda),
        }
    }
}

/// A named random input of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomVariable {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub distribution: Distribution,
}

impl RandomVariable {
    pub fn new(name: impl Into<String>, distribution: Distribution) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            distribution,
        }
    }

    /// Switch family; parameters reset to the new family's defaults
    pub fn set_kind(&mut self, kind: DistributionKind) {
        if self.distribution.kind() != kind {
            self.distribution = Distribution::defaults_for(kind);
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.distribution.sample(rng)
    }
}

/// Uniform draw in `(0, 1)`, safe as a logarithm argument
fn open_unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random::<f64>().max(f64::MIN_POSITIVE)
}

/// Box-Muller transform
pub fn sample_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, sd: f64) -> f64 {
    let u1 = open_unit(rng);
    let u2: f64 = rng.random();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + sd * z
}

pub fn sample_uniform<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    let u: f64 = rng.random();
    min + u * (max - min)
}

/// Bernoulli sum for small `n`, rounded normal approximation otherwise
pub fn sample_binomial<R: Rng + ?Sized>(rng: &mut R, n: u64, p: f64) -> f64 {
    if n <= BINOMIAL_EXACT_MAX_N {
        (0..n).filter(|_| rng.random::<f64>() < p).count() as f64
    } else {
        let nf = n as f64;
        let draw = sample_normal(rng, nf * p, (nf * p * (1.0 - p)).sqrt());
        draw.round().clamp(0.0, nf)
    }
}

/// Inverse CDF: `-ln(u) / rate`
pub fn sample_exponential<R: Rng + ?Sized>(rng: &mut R, rate: f64) -> f64 {
    -open_unit(rng).ln() / rate
}

/// Knuth's multiplicative method for small `lambda`, rounded normal otherwise
pub fn sample_poisson<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> f64 {
    if lambda <= POISSON_KNUTH_MAX_LAMBDA {
        let limit = (-lambda).exp();
        let mut k = 0u64;
        let mut product: f64 = rng.random();
        while product > limit {
            k += 1;
            product *= rng.random::<f64>();
        }
        k as f64
    } else {
        sample_normal(rng, lambda, lambda.sqrt()).round().max(0.0)
    }
}
