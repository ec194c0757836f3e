//! Shared helpers for the integration tests

use std::path::PathBuf;

use imstat_core::Table;

/// Get the path to a fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_fixtures")
        .join(name)
}

/// Load a request fixture as a string
#[allow(dead_code)]
pub fn load_request_fixture(name: &str) -> String {
    let path = fixture_path(&format!("requests/{}", name));
    std::fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", path.display()))
}

/// Build a table from numeric columns
#[allow(dead_code)]
pub fn numeric_table(columns: &[(&str, &[f64])]) -> Table {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let n = columns.first().map_or(0, |(_, values)| values.len());
    let records: Vec<Vec<String>> = (0..n)
        .map(|i| columns.iter().map(|(_, values)| values[i].to_string()).collect())
        .collect();
    Table::from_records(&names, records).unwrap()
}

/// Build a table of two label columns
#[allow(dead_code)]
pub fn label_table(row: &str, col: &str, pairs: &[(String, String)]) -> Table {
    let records: Vec<Vec<String>> = pairs
        .iter()
        .map(|(r, c)| vec![r.clone(), c.clone()])
        .collect();
    Table::from_records(&[row, col], records).unwrap()
}
