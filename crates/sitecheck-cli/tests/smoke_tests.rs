//! Smoke tests for the sitecheck CLI

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const HARNESS_KEYS: [&str; 12] = [
    "TARGET",
    "NODE_ENV",
    "TEST_ENV",
    "SITECHECK_ENV_FILE",
    "ADMIN_EMAIL",
    "ADMIN_PASSWORD",
    "TEST_USER_EMAIL",
    "TEST_USER_PASSWORD",
    "AUTH_DIR",
    "RESULTS_DIR",
    "CLEANUP_TEMP_FILES",
    "RUST_LOG",
];

/// Get a command for the sitecheck binary with a clean harness environment
fn sitecheck() -> Command {
    let mut cmd = Command::cargo_bin("sitecheck").expect("sitecheck binary should exist");
    for key in HARNESS_KEYS {
        cmd.env_remove(key);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_help_lists_commands() {
    sitecheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("setup-auth"))
        .stdout(predicate::str::contains("validate-state"))
        .stdout(predicate::str::contains("teardown"));
}

#[test]
fn test_no_args_fails() {
    sitecheck().assert().failure();
}

// ============================================================================
// config
// ============================================================================

#[test]
fn test_config_hides_secrets() {
    sitecheck()
        .arg("config")
        .env("TARGET", "staging")
        .env("TEST_BASE_URL_STAGING", "https://staging.example.org")
        .env("ADMIN_EMAIL", "ops@site.test")
        .env("ADMIN_PASSWORD", "hunter2-secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"target\": \"staging\""))
        .stdout(predicate::str::contains("https://staging.example.org"))
        .stdout(predicate::str::contains("\"adminConfigured\": true"))
        .stdout(predicate::str::contains("hunter2-secret").not())
        .stdout(predicate::str::contains("ops@site.test").not());
}

#[test]
fn test_bad_target_is_config_error() {
    sitecheck()
        .arg("config")
        .env("TARGET", "moon")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_dotenv_in_working_dir_is_read() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".env"),
        "TARGET=staging\nTEST_BASE_URL_STAGING=https://staging.example.org\nADMIN_EMAIL=ops@site.test\nADMIN_PASSWORD=file-secret\n",
    )
    .unwrap();

    sitecheck()
        .arg("config")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"target\": \"staging\""))
        .stdout(predicate::str::contains("\"adminConfigured\": true"))
        .stdout(predicate::str::contains("file-secret").not());

    sitecheck()
        .arg("config")
        .current_dir(dir.path())
        .env("TARGET", "local")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"target\": \"local\""));
}

#[test]
fn test_missing_explicit_env_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    sitecheck()
        .args(["config", "--env-file"])
        .arg(dir.path().join("nope.env"))
        .assert()
        .code(2);
}

// ============================================================================
// teardown
// ============================================================================

#[test]
fn test_purge_refused_on_production() {
    let dir = TempDir::new().unwrap();
    sitecheck()
        .args(["teardown", "--purge-test-data", "--results-dir"])
        .arg(dir.path())
        .env("TARGET", "prod")
        .env("ADMIN_EMAIL", "ops@site.test")
        .env("ADMIN_PASSWORD", "pw")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("PRODUCTION SAFETY"));
    assert!(!dir.path().join("test-run-summary.json").exists());
}

#[test]
fn test_teardown_writes_summary() {
    let dir = TempDir::new().unwrap();
    let results = dir.path().join("results");
    fs::create_dir_all(results.join("temp")).unwrap();

    sitecheck()
        .arg("teardown")
        .arg("--results-dir")
        .arg(&results)
        .env("CLEANUP_TEMP_FILES", "true")
        .assert()
        .success();

    let raw = fs::read_to_string(results.join("test-run-summary.json")).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(summary["environment"]["target"], "local");
    assert_eq!(summary["cleanup"]["testResultsDir"], "available");
    assert!(!results.join("temp").exists());
}

#[test]
fn test_teardown_json_output() {
    let dir = TempDir::new().unwrap();
    sitecheck()
        .args(["teardown", "--format", "json", "--results-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"baseUrl\": \"http://localhost:3000\""));
}

// ============================================================================
// validate-state
// ============================================================================

#[test]
fn test_validate_offline_accepts_structured_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("admin.json"),
        r#"{"cookies":[{"name":"sid","value":"v","domain":"localhost"}],
            "origins":[{"origin":"http://localhost:3000","localStorage":[{"name":"auth_token","value":"t"}]}]}"#,
    )
    .unwrap();

    sitecheck()
        .args(["validate-state", "--offline", "--role", "admin", "--auth-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("admin: valid"));
}

#[test]
fn test_validate_offline_rejects_malformed_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("admin.json"), "not json").unwrap();

    sitecheck()
        .args(["validate-state", "--offline", "--role", "admin", "--auth-dir"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Invalid auth file format"));
}

#[test]
fn test_validate_missing_requested_role_fails() {
    let dir = TempDir::new().unwrap();
    sitecheck()
        .args(["validate-state", "--offline", "--format", "json"])
        .args(["--role", "test-user", "--auth-dir"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"status\": \"missing\""));
}

// ============================================================================
// setup-auth
// ============================================================================

#[cfg(not(feature = "browser"))]
#[test]
fn test_setup_auth_needs_browser_feature() {
    let dir = TempDir::new().unwrap();
    sitecheck()
        .args(["setup-auth", "--auth-dir"])
        .arg(dir.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--features browser"));
}
