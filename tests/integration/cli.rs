//! Integration tests for the rlm-govern binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a Command instance for the rlm-govern binary with a clean environment
#[allow(deprecated)]
fn govern_cmd() -> Command {
    let mut cmd = Command::cargo_bin("rlm-govern").expect("Failed to find rlm-govern binary");
    cmd.env_remove("RLM_GOVERNOR__BUDGET__COST_LIMIT")
        .env_remove("RLM_GOVERNOR__BUDGET__MAX_DEPTH")
        .env_remove("RLM_GOVERNOR__BUDGET__MAX_TIME_MS");
    cmd
}

#[test]
fn test_estimate_trivial_query() {
    govern_cmd()
        .args(["estimate", "What is 15 + 27?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"level\": \"easy\""))
        .stdout(predicate::str::contains("trivial:arithmetic"));
}

#[test]
fn test_estimate_hard_query() {
    govern_cmd()
        .args(["estimate", "Implement a lock-free queue in Rust"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"level\": \"hard\""));
}

#[test]
fn test_estimate_escalates_with_large_context() {
    govern_cmd()
        .args([
            "estimate",
            "Summarize this document",
            "--context-tokens",
            "12000",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"level\": \"hard\""))
        .stdout(predicate::str::contains("context:large(12000)"));
}

#[test]
fn test_allocate_prints_allocation_and_limits() {
    govern_cmd()
        .args(["allocate", "Explain how TCP congestion control works"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"model_tier\": \"balanced\""))
        .stdout(predicate::str::contains("\"depth_budget\": 5"))
        .stdout(predicate::str::contains("\"max_recursive_calls\": 40"));
}

#[test]
fn test_allocate_respects_settings_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("governor.toml");
    fs::write(&path, "[budget]\nmax_depth = 3\n").unwrap();

    govern_cmd()
        .args(["allocate", "Design a distributed cache"])
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"depth_budget\": 3"))
        .stdout(predicate::str::contains("\"model_tier\": \"quality\""));
}

#[test]
fn test_allocate_env_override() {
    govern_cmd()
        .env("RLM_GOVERNOR__BUDGET__MAX_DEPTH", "1")
        .args(["allocate", "Refactor the parser"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"depth_budget\": 1"));
}

#[test]
fn test_allocate_rejects_invalid_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("governor.toml");
    fs::write(&path, "[budget]\ncost_limit = -2.0\n").unwrap();

    govern_cmd()
        .args(["allocate", "What time is it?"])
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cost"));
}

#[test]
fn test_help_lists_subcommands() {
    govern_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("estimate"))
        .stdout(predicate::str::contains("allocate"));
}
