//! Conformance tests that run YAML fixtures against sieve
//!
//! Run with: cargo test -p sieve-test --test conformance

#![cfg(feature = "fixtures")]

use sieve_test::fixture::Fixture;
use std::fs;
use std::path::{Path, PathBuf};

/// The `conformance/` directory at the workspace root
fn fixtures_dir() -> PathBuf {
    // The manifest dir is ext/test
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let workspace_root = Path::new(manifest_dir)
        .parent() // ext
        .and_then(Path::parent) // workspace root
        .expect("Could not find workspace root");

    workspace_root.join("conformance")
}

/// Load and run one fixture file
fn run_fixture_file(name: &str) {
    let path = fixtures_dir().join(name);
    let yaml = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));

    // Parse potentially multiple fixtures (separated by ---)
    let fixtures = Fixture::from_yaml_multi(&yaml).unwrap_or_else(|e| {
        panic!("Failed to parse {}: {}", path.display(), e);
    });
    assert!(!fixtures.is_empty(), "{} holds no fixtures", path.display());

    for fixture in fixtures {
        println!("  Running: {}", fixture.name);
        fixture.run_and_assert();
    }
}

#[test]
fn test_literals() {
    run_fixture_file("01_literals.yaml");
}

#[test]
fn test_ranges() {
    run_fixture_file("02_ranges.yaml");
}

#[test]
fn test_groups() {
    run_fixture_file("03_groups.yaml");
}

#[test]
fn test_nesting() {
    run_fixture_file("04_nesting.yaml");
}

#[test]
fn test_field_selection() {
    run_fixture_file("05_fields.yaml");
}

#[test]
fn test_patterns() {
    run_fixture_file("06_patterns.yaml");
}

#[test]
fn test_rule_errors() {
    run_fixture_file("07_rule_errors.yaml");
}

/// Every fixture file in the directory is covered by a test above.
#[test]
fn test_no_orphan_fixtures() {
    let known = [
        "01_literals.yaml",
        "02_ranges.yaml",
        "03_groups.yaml",
        "04_nesting.yaml",
        "05_fields.yaml",
        "06_patterns.yaml",
        "07_rule_errors.yaml",
    ];
    for entry in fs::read_dir(fixtures_dir()).expect("read dir") {
        let path = entry.expect("dir entry").path();
        if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            assert!(known.contains(&name), "fixture {name} is not run by any test");
        }
    }
}
