//! Monte Carlo simulation
//!
//! Each iteration samples every random variable once, evaluates the user's
//! formula against those samples and records the result. A running mean is
//! sampled into a bounded convergence trace.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use imstat_expr::{CompiledExpression, Diagnostic, EvalStats};
use imstat_stats::{percentile_nearest_rank, sort_floats, SummaryStats};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::sampler::RandomVariable;

/// Simulation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSpec {
    pub variables: Vec<RandomVariable>,
    pub expression: String,
    pub iterations: usize,
    /// Overrides the configured seed
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Running mean after `iteration` trials
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePoint {
    pub iteration: usize,
    pub mean: f64,
}

/// Descriptive numbers over the simulated outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub p5: f64,
    pub p95: f64,
    /// Share of outcomes strictly greater than 0
    pub prob_positive: f64,
    pub min: f64,
    pub max: f64,
}

impl SimulationSummary {
    /// Summarize outcomes; `mean` is taken as given so it matches the trace
    fn from_outputs(outputs: &[f64], mean: f64) -> Self {
        let stats = SummaryStats::from_data(outputs);
        let mut sorted = outputs.to_vec();
        sort_floats(&mut sorted);
        let positive = outputs.iter().filter(|&&x| x > 0.0).count();

        Self {
            mean,
            median: stats.median,
            std_dev: stats.population_std_dev,
            p5: percentile_nearest_rank(&sorted, 0.05),
            p95: percentile_nearest_rank(&sorted, 0.95),
            prob_positive: positive as f64 / outputs.len() as f64,
            min: stats.min,
            max: stats.max,
        }
    }
}

/// Result of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub expression: String,
    pub variables: Vec<RandomVariable>,
    pub iterations: usize,
    /// Seed of the generator, for reproducing the run
    pub seed: u64,
    pub outputs: Vec<f64>,
    pub convergence: Vec<ConvergencePoint>,
    pub summary: SimulationSummary,
    /// Problems found while compiling the formula
    pub diagnostics: Vec<Diagnostic>,
    /// Evaluation fallbacks summed over all iterations
    pub eval_stats: EvalStats,
}

impl SimulationSpec {
    /// Check variable names, parameters and the iteration budget
    pub fn validate(&self, config: &SimulationConfig) -> AnalysisResult<()> {
        if self.iterations == 0 || self.iterations > config.max_iterations {
            return Err(AnalysisError::invalid_parameter(
                "iterations",
                format!("must be in 1..={}, got {}", config.max_iterations, self.iterations),
            ));
        }

        let mut names = HashSet::new();
        for variable in &self.variables {
            if variable.name.trim().is_empty() {
                return Err(AnalysisError::invalid_parameter(
                    "name",
                    "variable names must not be empty",
                ));
            }
            if !names.insert(variable.name.as_str()) {
                return Err(AnalysisError::DuplicateVariable {
                    name: variable.name.clone(),
                });
            }
            variable.distribution.validate()?;
        }
        Ok(())
    }
}

/// Iterations between convergence trace points
pub fn trace_cadence(iterations: usize, trace_points: usize) -> usize {
    (iterations / trace_points.max(1)).max(1)
}

/// Run a simulation to completion
pub fn run_simulation(
    spec: &SimulationSpec,
    config: &SimulationConfig,
) -> AnalysisResult<SimulationResult> {
    run_simulation_with_cancel(spec, config, &AtomicBool::new(false))
}

/// Run a simulation, stopping with [`AnalysisError::Cancelled`] once `cancel` is set
pub fn run_simulation_with_cancel(
    spec: &SimulationSpec,
    config: &SimulationConfig,
    cancel: &AtomicBool,
) -> AnalysisResult<SimulationResult> {
    spec.validate(config)?;

    let seed = spec
        .seed
        .or(config.seed)
        .unwrap_or_else(rand::random::<u64>);
    let mut rng = SmallRng::seed_from_u64(seed);

    let names: Vec<&str> = spec.variables.iter().map(|v| v.name.as_str()).collect();
    let compiled = CompiledExpression::compile_with_variables(&spec.expression, &names);
    if !compiled.is_clean() {
        tracing::debug!(
            "Formula '{}' compiled with {} diagnostic(s)",
            spec.expression,
            compiled.diagnostics().len()
        );
    }
    tracing::debug!(
        "Simulating '{}' with {} variable(s), {} iterations, seed {}",
        spec.expression,
        spec.variables.len(),
        spec.iterations,
        seed
    );

    let iterations = spec.iterations;
    let cadence = trace_cadence(iterations, config.trace_points);
    let check_every = config.cancel_check_interval.max(1);

    let mut env: HashMap<&str, f64> = names.iter().map(|&name| (name, 0.0)).collect();
    let mut outputs = Vec::with_capacity(iterations);
    let mut convergence = Vec::with_capacity(iterations / cadence + 1);
    let mut eval_stats = EvalStats::default();
    let mut running_sum = 0.0;

    for i in 0..iterations {
        if i % check_every == 0 && cancel.load(Ordering::Relaxed) {
            tracing::warn!("Simulation cancelled after {} of {} iterations", i, iterations);
            return Err(AnalysisError::Cancelled);
        }

        for variable in &spec.variables {
            let draw = variable.sample(&mut rng);
            if let Some(slot) = env.get_mut(variable.name.as_str()) {
                *slot = draw;
            }
        }
        let value = compiled.evaluate_tracked(&env, &mut eval_stats);
        outputs.push(value);
        running_sum += value;

        let done = i + 1;
        if done % cadence == 0 || done == iterations {
            let point = ConvergencePoint {
                iteration: done,
                mean: running_sum / done as f64,
            };
            tracing::trace!("Trace point {}: {}", point.iteration, point.mean);
            convergence.push(point);
        }
    }

    let summary = SimulationSummary::from_outputs(&outputs, running_sum / iterations as f64);
    tracing::info!(
        "Simulation complete: {} iterations, mean {:.4}",
        iterations,
        summary.mean
    );

    Ok(SimulationResult {
        expression: spec.expression.clone(),
        variables: spec.variables.clone(),
        iterations,
        seed,
        outputs,
        convergence,
        summary,
        diagnostics: compiled.diagnostics().to_vec(),
        eval_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Distribution;
    use rstest::rstest;

    fn spec(expression: &str, iterations: usize) -> SimulationSpec {
        SimulationSpec {
            variables: vec![
                RandomVariable::new("X", Distribution::Normal { mean: 5.0, sd: 1.0 }),
                RandomVariable::new("Y", Distribution::Uniform { min: 0.0, max: 2.0 }),
            ],
            expression: expression.to_string(),
            iterations,
            seed: Some(1234),
        }
    }

    #[rstest]
    #[case(1, 200, 1)]
    #[case(199, 200, 1)]
    #[case(1000, 200, 5)]
    #[case(100_000, 200, 500)]
    #[case(10, 0, 10)]
    fn test_trace_cadence(#[case] iterations: usize, #[case] points: usize, #[case] expected: usize) {
        assert_eq!(trace_cadence(iterations, points), expected);
    }

    #[test]
    fn test_trace_ends_at_overall_mean() {
        let result = run_simulation(&spec("X + Y", 1003), &SimulationConfig::default()).unwrap();
        let last = result.convergence.last().unwrap();
        assert_eq!(last.iteration, 1003);
        assert_eq!(last.mean, result.summary.mean);
        // 200 cadence points plus the final one
        assert_eq!(result.convergence.len(), 201);
        assert_eq!(result.outputs.len(), 1003);
    }

    #[test]
    fn test_seed_reproduces_outputs() {
        let config = SimulationConfig::default();
        let a = run_simulation(&spec("X * Y", 500), &config).unwrap();
        let b = run_simulation(&spec("X * Y", 500), &config).unwrap();
        assert_eq!(a.outputs, b.outputs);
        assert_eq!(a.seed, 1234);
    }

    #[test]
    fn test_configured_seed_is_used() {
        let mut s = spec("X", 10);
        s.seed = None;
        let config = SimulationConfig {
            seed: Some(77),
            ..SimulationConfig::default()
        };
        assert_eq!(run_simulation(&s, &config).unwrap().seed, 77);
    }

    #[test]
    fn test_summary_values() {
        let result = run_simulation(&spec("X - 5", 20_000), &SimulationConfig::default()).unwrap();
        let summary = &result.summary;
        assert!(summary.mean.abs() < 0.05);
        assert!((summary.std_dev - 1.0).abs() < 0.05);
        assert!((summary.prob_positive - 0.5).abs() < 0.02);
        assert!(summary.p5 < summary.median && summary.median < summary.p95);
        assert!(summary.min <= summary.p5 && summary.p95 <= summary.max);
    }

    #[test]
    fn test_every_iteration_sees_fresh_draws() {
        let s = SimulationSpec {
            variables: vec![
                RandomVariable::new("X", Distribution::Uniform { min: 3.0, max: 3.0 }),
                RandomVariable::new("Y", Distribution::Normal { mean: 4.0, sd: 0.0 }),
                RandomVariable::new("Z", Distribution::Binomial { n: 0, p: 0.5 }),
            ],
            expression: "X * Y + Z".to_string(),
            iterations: 50,
            seed: Some(9),
        };
        let result = run_simulation(&s, &SimulationConfig::default()).unwrap();
        assert!(result.outputs.iter().all(|&v| v == 12.0));
        assert!(result.eval_stats.is_clean());
        assert_eq!(result.summary.std_dev, 0.0);
        assert_eq!((result.summary.min, result.summary.max), (12.0, 12.0));
    }

    #[test]
    fn test_unknown_variable_is_diagnosed_not_fatal() {
        let result = run_simulation(&spec("X + Z", 10), &SimulationConfig::default()).unwrap();
        assert!(result.diagnostics.contains(&Diagnostic::UnresolvedVariable {
            name: "Z".to_string()
        }));
        assert_eq!(result.eval_stats.unresolved_variables, 10);
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let mut s = spec("X", 10);
        s.variables.push(RandomVariable::new("X", Distribution::default()));
        assert!(matches!(
            run_simulation(&s, &SimulationConfig::default()),
            Err(AnalysisError::DuplicateVariable { .. })
        ));
    }

    #[rstest]
    #[case(0)]
    #[case(1_000_001)]
    fn test_iteration_bounds(#[case] iterations: usize) {
        assert!(matches!(
            run_simulation(&spec("X", iterations), &SimulationConfig::default()),
            Err(AnalysisError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_cancel_flag_stops_run() {
        let cancel = AtomicBool::new(true);
        let result =
            run_simulation_with_cancel(&spec("X", 10_000), &SimulationConfig::default(), &cancel);
        assert_eq!(result, Err(AnalysisError::Cancelled));
    }
}
