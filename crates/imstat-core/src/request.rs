//! Request and response envelope
//!
//! The rendering layer talks to the engine in JSON: an [`AnalysisRequest`]
//! names the analysis and carries its table and parameters, and an
//! [`AnalysisResponse`] carries either the result or an error message.
//! Failures never cross this boundary as panics.

use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::crosstab::{run_crosstab, CrossTabResult, CrossTabSpec};
use crate::error::AnalysisResult;
use crate::regression::{run_regression, RegressionResult, RegressionSpec};
use crate::simulation::{run_simulation_with_cancel, SimulationResult, SimulationSpec};
use crate::table::Table;
use crate::testing::{run_test, TestResult, TestSpec};

/// One analysis to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisRequest {
    Regression { table: Table, spec: RegressionSpec },
    Test { table: Table, spec: TestSpec },
    Crosstab { table: Table, spec: CrossTabSpec },
    Simulation { spec: SimulationSpec },
}

impl AnalysisRequest {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisRequest::Regression { .. } => "regression",
            AnalysisRequest::Test { .. } => "test",
            AnalysisRequest::Crosstab { .. } => "crosstab",
            AnalysisRequest::Simulation { .. } => "simulation",
        }
    }

    /// Parse a request from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Result of any analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutput {
    Regression(RegressionResult),
    Test(TestResult),
    Crosstab(CrossTabResult),
    Simulation(SimulationResult),
}

/// What the engine hands back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResponse {
    Ok { result: AnalysisOutput },
    Error { error: String },
}

impl AnalysisResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, AnalysisResponse::Ok { .. })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<AnalysisResult<AnalysisOutput>> for AnalysisResponse {
    fn from(result: AnalysisResult<AnalysisOutput>) -> Self {
        match result {
            Ok(result) => AnalysisResponse::Ok { result },
            Err(e) => AnalysisResponse::Error {
                error: e.to_string(),
            },
        }
    }
}

/// Execute a request, checking `cancel` where the analysis supports it
pub fn execute(
    config: &EngineConfig,
    request: &AnalysisRequest,
    cancel: &AtomicBool,
) -> AnalysisResult<AnalysisOutput> {
    config.validate()?;
    tracing::debug!("Executing {} request", request.kind());

    match request {
        AnalysisRequest::Regression { table, spec } => {
            run_regression(table, spec, &config.regression).map(AnalysisOutput::Regression)
        }
        AnalysisRequest::Test { table, spec } => run_test(table, spec).map(AnalysisOutput::Test),
        AnalysisRequest::Crosstab { table, spec } => {
            run_crosstab(table, spec).map(AnalysisOutput::Crosstab)
        }
        AnalysisRequest::Simulation { spec } => {
            run_simulation_with_cancel(spec, &config.simulation, cancel)
                .map(AnalysisOutput::Simulation)
        }
    }
}

/// Execute a request and wrap the outcome for the caller
pub fn run_request(config: &EngineConfig, request: &AnalysisRequest) -> AnalysisResponse {
    let result = execute(config, request, &AtomicBool::new(false));
    if let Err(e) = &result {
        tracing::warn!("{} request failed: {}", request.kind(), e);
    }
    result.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_request_round_trip() {
        let json = r#"{
            "kind": "regression",
            "table": {
                "columns": ["x", "y"],
                "rows": [
                    {"x": "1", "y": "5"},
                    {"x": "2", "y": "8"},
                    {"x": "3", "y": "11"},
                    {"x": "4", "y": "14"}
                ]
            },
            "spec": {"dependent": "y", "predictors": ["x"]}
        }"#;
        let request = AnalysisRequest::from_json(json).unwrap();
        assert_eq!(request.kind(), "regression");

        match run_request(&EngineConfig::default(), &request) {
            AnalysisResponse::Ok {
                result: AnalysisOutput::Regression(result),
            } => {
                assert!((result.coefficients[1].estimate - 3.0).abs() < 1e-9);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_error_becomes_message() {
        let json = r#"{
            "kind": "test",
            "table": {"columns": ["x"], "rows": [{"x": "1"}]},
            "spec": {"test": "one_sample", "column": "x"}
        }"#;
        let request = AnalysisRequest::from_json(json).unwrap();
        let response = run_request(&EngineConfig::default(), &request);
        assert!(!response.is_ok());

        let value: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(value["status"], "error");
        assert!(value["error"].as_str().unwrap().contains("Insufficient"));
    }

    #[test]
    fn test_simulation_request_shape() {
        let json = r#"{
            "kind": "simulation",
            "spec": {
                "variables": [
                    {"name": "demand", "distribution": {"kind": "poisson", "lambda": 20}},
                    {"name": "price", "distribution": {"kind": "uniform", "min": 9, "max": 11}}
                ],
                "expression": "demand * price",
                "iterations": 500,
                "seed": 5
            }
        }"#;
        let request = AnalysisRequest::from_json(json).unwrap();
        let response = run_request(&EngineConfig::default(), &request);
        let value: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["result"]["kind"], "simulation");
        assert_eq!(value["result"]["outputs"].as_array().unwrap().len(), 500);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let mut config = EngineConfig::default();
        config.significance.alpha = 0.0;
        let request = AnalysisRequest::Simulation {
            spec: SimulationSpec {
                variables: vec![],
                expression: "1".to_string(),
                iterations: 1,
                seed: None,
            },
        };
        let response = run_request(&config, &request);
        assert!(matches!(response, AnalysisResponse::Error { .. }));
    }
}
