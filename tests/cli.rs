//! End-to-end tests of the `rentaldesk` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn temp_file(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("failed to write temp file");
    path.to_string_lossy().into_owned()
}

#[test]
fn test_tools_lists_manifest_as_json() {
    let output = Command::cargo_bin("rentaldesk")
        .unwrap()
        .args([
            "--config",
            "config/config.yaml",
            "tools",
            "--manifest",
            "config/tools.yaml",
            "--json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let tools: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tools.len(), 13);
    assert!(tools.iter().any(|t| t["name"] == "create-rental"));
    assert!(tools
        .iter()
        .all(|t| t["statement_template"].as_str().is_some()));
}

#[test]
fn test_tools_lists_manifest_as_text() {
    Command::cargo_bin("rentaldesk")
        .unwrap()
        .args([
            "--config",
            "config/config.yaml",
            "tools",
            "--manifest",
            "config/tools.yaml",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Available tools (13)"))
        .stdout(predicate::str::contains("films-by-year(year: integer)"));
}

#[test]
fn test_tools_rejects_placeholder_mismatch() {
    let dir = TempDir::new().unwrap();
    let manifest = temp_file(
        &dir,
        "tools.yaml",
        r#"
tools:
  films-by-year:
    kind: postgres-sql
    description: Films released in a given year
    parameters:
      - name: year
        type: integer
    statement: SELECT title FROM film WHERE release_year = $1 AND rating = $2;
"#,
    );

    Command::cargo_bin("rentaldesk")
        .unwrap()
        .args(["--config", "does-not-exist.yaml", "tools", "--manifest", &manifest])
        .assert()
        .failure()
        .stderr(predicate::str::contains("placeholders"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = temp_file(
        &dir,
        "config.yaml",
        "handler:\n  retry:\n    max_attempts: 0\n",
    );

    Command::cargo_bin("rentaldesk")
        .unwrap()
        .args(["--config", &config, "tools", "--manifest", "config/tools.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_attempts must be at least 1"));
}

#[test]
fn test_serve_help_lists_overrides() {
    Command::cargo_bin("rentaldesk")
        .unwrap()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"));
}
