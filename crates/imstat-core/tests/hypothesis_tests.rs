//! Hypothesis testing integration tests

mod common;

use common::{label_table, numeric_table};
use imstat_core::{
    chi_square_independence, one_way_anova, run_test, welch_t, AnalysisError, Degrees, Table,
    TestDetails, TestSpec,
};
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

// === Chi-square ===

#[test]
fn test_perfectly_correlated_labels() {
    let pairs: Vec<(String, String)> = (0..90)
        .map(|i| {
            let label = ["red", "green", "blue"][i % 3].to_string();
            (label.clone(), label)
        })
        .collect();
    let table = label_table("a", "b", &pairs);
    let spec = TestSpec::ChiSquare {
        row_column: "a".to_string(),
        col_column: "b".to_string(),
    };

    let result = run_test(&table, &spec).unwrap();
    assert!(result.p_value < 1e-12);
    assert!((result.effect_size.unwrap() - 1.0).abs() < 1e-9);
    assert!(result.is_significant(0.05));
}

#[test]
fn test_independent_labels_give_uniform_p_values() {
    let mut rng = SmallRng::seed_from_u64(2024);
    let trials = 300;
    let mut p_values = Vec::with_capacity(trials);

    for _ in 0..trials {
        let rows: Vec<String> = (0..200).map(|_| rng.random_range(0..3).to_string()).collect();
        let cols: Vec<String> = (0..200).map(|_| rng.random_range(0..3).to_string()).collect();
        p_values.push(chi_square_independence(&rows, &cols).unwrap().p_value);
    }

    let mean = p_values.iter().sum::<f64>() / trials as f64;
    let rejected = p_values.iter().filter(|&&p| p < 0.05).count() as f64 / trials as f64;
    assert!((mean - 0.5).abs() < 0.07, "mean p-value {}", mean);
    assert!(rejected < 0.12, "rejection rate {}", rejected);
}

#[test]
fn test_chi_square_skips_missing_labels() {
    let table = Table::from_records(
        &["a", "b"],
        vec![
            vec!["x", "p"],
            vec!["y", "q"],
            vec!["", "q"],
            vec!["x", " "],
            vec!["x", "q"],
            vec!["y", "p"],
        ],
    )
    .unwrap();
    let spec = TestSpec::ChiSquare {
        row_column: "a".to_string(),
        col_column: "b".to_string(),
    };
    let result = run_test(&table, &spec).unwrap();
    match result.details {
        TestDetails::ChiSquare { n, observed, .. } => {
            assert_eq!(n, 4.0);
            assert_eq!(observed, vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
        }
        other => panic!("unexpected details {:?}", other),
    }
}

// === t-tests ===

#[test]
fn test_one_sample_on_table_skips_non_numeric() {
    let table = Table::from_records(
        &["v"],
        vec![vec!["4.8"], vec!["5.2"], vec!["n/a"], vec!["5.0"], vec![""], vec!["5.1"]],
    )
    .unwrap();
    let spec = TestSpec::OneSample {
        column: "v".to_string(),
        mu0: 5.0,
    };
    let result = run_test(&table, &spec).unwrap();
    assert_eq!(result.df, Degrees::Single(3.0));
    assert!(!result.is_significant(0.05));
}

#[test]
fn test_welch_df_between_bounds() {
    let a = [12.1, 11.8, 12.5, 12.0, 11.9, 12.3];
    let b = [14.0, 9.5, 16.2, 10.1, 13.3];
    let result = welch_t(&a, &b).unwrap();
    match result.df {
        Degrees::Single(df) => assert!((4.0..=9.0).contains(&df), "df {}", df),
        other => panic!("unexpected df {:?}", other),
    }
}

#[test]
fn test_missing_column_is_reported() {
    let x = [1.0, 2.0, 3.0];
    let table = numeric_table(&[("x", &x[..])]);
    let spec = TestSpec::Paired {
        first: "x".to_string(),
        second: "y".to_string(),
    };
    assert_eq!(
        run_test(&table, &spec).unwrap_err(),
        AnalysisError::ColumnNotFound {
            column: "y".to_string()
        }
    );
}

// === ANOVA ===

#[test]
fn test_anova_on_table() {
    let table = Table::from_records(
        &["yield", "field"],
        vec![
            vec!["20", "north"],
            vec!["22", "north"],
            vec!["21", "north"],
            vec!["30", "south"],
            vec!["31", "south"],
            vec!["29", "south"],
            vec!["25", "east"],
            vec!["26", "east"],
        ],
    )
    .unwrap();
    let spec = TestSpec::Anova {
        value_column: "yield".to_string(),
        group_column: "field".to_string(),
    };
    let result = run_test(&table, &spec).unwrap();
    assert_eq!(result.df, Degrees::Pair(2.0, 5.0));
    assert!(result.p_value < 0.001);
    match result.details {
        TestDetails::Anova { groups, .. } => {
            let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
            assert_eq!(labels, vec!["north", "south", "east"]);
        }
        other => panic!("unexpected details {:?}", other),
    }
}

#[test]
fn test_anova_identical_groups() {
    let a = [1.0, 2.0, 3.0];
    let result = one_way_anova(&[("a", &a[..]), ("b", &a[..])]).unwrap();
    assert!(result.statistic.abs() < 1e-12);
    assert!((result.p_value - 1.0).abs() < 1e-9);
}

// === Invariants ===

proptest! {
    #[test]
    fn test_welch_swap_symmetry(
        a in prop::collection::vec(-1000.0f64..1000.0, 2..25),
        b in prop::collection::vec(-1000.0f64..1000.0, 2..25),
    ) {
        let ab = welch_t(&a, &b).unwrap();
        let ba = welch_t(&b, &a).unwrap();
        prop_assert!((ab.statistic + ba.statistic).abs() < 1e-9 * (1.0 + ab.statistic.abs()));
        prop_assert!((ab.p_value - ba.p_value).abs() < 1e-9);
        prop_assert!(ab.p_value >= 0.0 && ab.p_value <= 1.0);
    }

    #[test]
    fn test_chi_square_p_value_in_range(
        labels in prop::collection::vec((0u8..4, 0u8..3), 10..80)
    ) {
        let rows: Vec<String> = labels.iter().map(|(r, _)| r.to_string()).collect();
        let cols: Vec<String> = labels.iter().map(|(_, c)| c.to_string()).collect();
        match chi_square_independence(&rows, &cols) {
            Ok(result) => {
                prop_assert!(result.p_value >= 0.0 && result.p_value <= 1.0);
                let v = result.effect_size.unwrap();
                prop_assert!((0.0..=1.0).contains(&v));
            }
            Err(e) => {
                let is_too_few_groups = matches!(e, AnalysisError::TooFewGroups { .. });
                prop_assert!(is_too_few_groups);
            }
        }
    }
}
