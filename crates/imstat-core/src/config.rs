//! Configuration for imstat-core
//!
//! Centralized configuration for the analysis engine: significance level,
//! numerical tolerances and simulation limits.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use imstat_stats::DEFAULT_PIVOT_TOLERANCE;

/// Engine-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hypothesis test reporting
    pub significance: SignificanceConfig,
    /// Regression numerics
    pub regression: RegressionConfig,
    /// Monte Carlo limits
    pub simulation: SimulationConfig,
}

/// Significance reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificanceConfig {
    /// Significance level used when classifying p-values
    pub alpha: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self { alpha: 0.05 }
    }
}

/// Regression configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Pivot magnitude below which X'X is considered singular
    pub singular_tolerance: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            singular_tolerance: DEFAULT_PIVOT_TOLERANCE,
        }
    }
}

/// Monte Carlo configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Upper bound on iterations per run
    pub max_iterations: usize,
    /// Approximate number of points in the convergence trace
    pub trace_points: usize,
    /// Iterations between cancellation checks
    pub cancel_check_interval: usize,
    /// Seed used by simulations that do not carry their own
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1_000_000,
            trace_points: 200,
            cancel_check_interval: 1024,
            seed: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid TOML: {0}")]
    Toml(String),

    #[error("Invalid JSON: {0}")]
    Json(String),
}

impl EngineConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Toml(e.to_string()))
    }

    /// Load and validate configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json_str).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Json(e.to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let alpha = self.significance.alpha;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(ConfigError::OutOfRange(format!(
                "significance.alpha must be in (0, 1), got {}",
                alpha
            )));
        }

        let tol = self.regression.singular_tolerance;
        if !(tol > 0.0 && tol.is_finite()) {
            return Err(ConfigError::OutOfRange(
                "regression.singular_tolerance must be positive".to_string(),
            ));
        }

        if self.simulation.max_iterations == 0 {
            return Err(ConfigError::OutOfRange(
                "simulation.max_iterations must be positive".to_string(),
            ));
        }

        if self.simulation.trace_points == 0 {
            return Err(ConfigError::OutOfRange(
                "simulation.trace_points must be positive".to_string(),
            ));
        }

        if self.simulation.cancel_check_interval == 0 {
            return Err(ConfigError::OutOfRange(
                "simulation.cancel_check_interval must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
