//! End-to-end tests for the `surch results` command.

#![expect(clippy::expect_used, reason = "tests use expect for clearer failure messages")]

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn surch() -> Command {
    Command::new(env!("CARGO_BIN_EXE_surch"))
}

const RESULTS: &str = r#"{
    "_default": {
        "1": {
            "blob_url": "https://github.com/acme/widgets/blob/3f2a9c1e5b/config.py",
            "commit_sha": "3f2a9c1e5b",
            "commit_time": "Thu Oct 15 12:00:00 2026",
            "email": "jane@example.com",
            "filepath": "config.py",
            "organization_name": "acme",
            "repository_name": "widgets",
            "username": "Jane Doe"
        }
    }
}"#;

fn write_results(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("results.json");
    fs::write(&path, RESULTS).expect("write results");
    path
}

#[test]
fn prints_findings_as_text() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_results(&dir);

    surch()
        .args(["results", &path.to_string_lossy()])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.py"))
        .stdout(predicate::str::contains("acme/widgets"))
        .stdout(predicate::str::contains("3f2a9c1 Jane Doe"))
        .stdout(predicate::str::contains("1 finding"));
}

#[test]
fn json_flag_prints_document() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_results(&dir);

    let output = surch()
        .args(["results", &path.to_string_lossy(), "--json"])
        .output()
        .expect("run surch");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["_default"]["1"]["username"], "Jane Doe");
}

#[test]
fn missing_file_is_an_error() {
    let dir = TempDir::new().expect("tempdir");

    surch()
        .args(["results", &dir.path().join("nope.json").to_string_lossy()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("results file not found"));
}

#[test]
fn invalid_file_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("results.json");
    fs::write(&path, "not json").expect("write");

    surch()
        .args(["results", &path.to_string_lossy()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to parse results file"));
}
