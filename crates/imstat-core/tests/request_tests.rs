//! Request envelope and runner integration tests

mod common;

use common::load_request_fixture;
use imstat_core::{
    run_request, AnalysisOutput, AnalysisRequest, AnalysisResponse, AnalysisRunner, EngineConfig,
};
use rstest::rstest;

fn load(name: &str) -> AnalysisRequest {
    AnalysisRequest::from_json(&load_request_fixture(name)).unwrap()
}

#[rstest]
#[case("regression.json", "regression")]
#[case("ttest.json", "test")]
#[case("crosstab.json", "crosstab")]
#[case("simulation.json", "simulation")]
fn test_fixture_requests_succeed(#[case] fixture: &str, #[case] kind: &str) {
    let request = load(fixture);
    assert_eq!(request.kind(), kind);

    let response = run_request(&EngineConfig::default(), &request);
    assert!(response.is_ok(), "{:?}", response);

    let json: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["result"]["kind"], kind);
}

#[test]
fn test_regression_fixture_drops_missing_row() {
    match run_request(&EngineConfig::default(), &load("regression.json")) {
        AnalysisResponse::Ok {
            result: AnalysisOutput::Regression(result),
        } => {
            assert_eq!(result.n, 7);
            assert_eq!(result.coefficients.len(), 3);
        }
        other => panic!("unexpected response {:?}", other),
    }
}

#[test]
fn test_crosstab_fixture_values() {
    match run_request(&EngineConfig::default(), &load("crosstab.json")) {
        AnalysisResponse::Ok {
            result: AnalysisOutput::Crosstab(result),
        } => {
            assert_eq!(result.row_labels, vec!["north", "south", "west"]);
            assert_eq!(result.col_labels, vec!["gadget", "widget"]);
            assert_eq!(result.matrix[1], vec![18.0, 7.0]);
            assert_eq!(result.display_matrix[2], vec![0.0, 100.0]);
            assert!(result.chi_square.is_none());
        }
        other => panic!("unexpected response {:?}", other),
    }
}

#[test]
fn test_seeded_simulation_is_reproducible() {
    let request = load("simulation.json");
    let a = run_request(&EngineConfig::default(), &request);
    let b = run_request(&EngineConfig::default(), &request);
    assert_eq!(a, b);
}

#[test]
fn test_toml_config_applies_to_requests() {
    let config = EngineConfig::from_toml(
        r#"
        [simulation]
        max_iterations = 1000
        "#,
    )
    .unwrap();
    let response = run_request(&config, &load("simulation.json"));
    match response {
        AnalysisResponse::Error { error } => assert!(error.contains("iterations")),
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_runner_keeps_only_latest_result() {
    let runner = AnalysisRunner::new(EngineConfig::default()).unwrap();

    let stale = runner.submit(load("simulation.json")).await;
    let fresh = runner.submit(load("ttest.json")).await;

    assert!(!stale.response().await.is_ok());
    assert!(matches!(
        fresh.result().await,
        Ok(AnalysisOutput::Test(_))
    ));
}
