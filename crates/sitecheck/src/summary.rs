//! End-of-run teardown: temp artifact cleanup and the run summary file.

use crate::config::{Target, TestConfig};
use crate::logging::RunLog;
use crate::result::SiteResult;
use crate::session::{Role, SessionStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Summary file name inside the results directory
pub const SUMMARY_FILE: &str = "test-run-summary.json";

/// Results subdirectories removed when temp cleanup is enabled
pub const TEMP_DIRS: [&str; 2] = ["temp", "downloads"];

/// Where and how the run happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEnvironment {
    /// Target deployment
    pub target: Target,
    /// Running in CI
    pub ci: bool,
    /// Application base URL
    pub base_url: String,
}

/// What teardown left behind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupInfo {
    /// Session files still on disk
    pub auth_files_preserved: Vec<PathBuf>,
    /// `available` or `not found`
    pub test_results_dir: String,
    /// Temp directories removed
    pub removed: Vec<PathBuf>,
}

/// Contents of [`SUMMARY_FILE`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// When teardown ran
    pub timestamp: DateTime<Utc>,
    /// Environment
    pub environment: SummaryEnvironment,
    /// Cleanup
    pub cleanup: CleanupInfo,
}

/// Path of the summary file for `config`
#[must_use]
pub fn summary_path(config: &TestConfig) -> PathBuf {
    config.results_dir.join(SUMMARY_FILE)
}

fn remove_dir(dir: &Path, log: &RunLog) -> bool {
    if !dir.exists() {
        return false;
    }
    match std::fs::remove_dir_all(dir) {
        Ok(()) => true,
        Err(e) => {
            log.warn(format!("Failed to clean temp directory {}: {e}", dir.display()));
            false
        }
    }
}

/// Remove the temp directories if cleanup is enabled; returns what was removed
pub fn cleanup_temp_dirs(config: &TestConfig, log: &RunLog) -> Vec<PathBuf> {
    if !config.cleanup_temp_files {
        return Vec::new();
    }
    TEMP_DIRS
        .iter()
        .map(|d| config.results_dir.join(d))
        .filter(|d| remove_dir(d, log))
        .collect()
}

/// Clean up and write the run summary.
///
/// Cleanup problems are only logged. Failing to write the summary is
/// returned so the caller can decide; it should not fail the run.
pub fn global_teardown(config: &TestConfig, log: &RunLog) -> SiteResult<RunSummary> {
    let log = log.scoped("teardown");
    let removed = cleanup_temp_dirs(config, &log);

    let store = SessionStore::new(config.auth_dir.clone());
    let auth_files_preserved = Role::ALL
        .iter()
        .filter(|r| store.exists(**r))
        .map(|r| store.path_for(*r))
        .collect();
    let test_results_dir = if config.results_dir.is_dir() {
        "available"
    } else {
        "not found"
    };

    let summary = RunSummary {
        timestamp: Utc::now(),
        environment: SummaryEnvironment {
            target: config.target,
            ci: config.ci,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
        },
        cleanup: CleanupInfo {
            auth_files_preserved,
            test_results_dir: test_results_dir.to_string(),
            removed,
        },
    };

    std::fs::create_dir_all(&config.results_dir)?;
    let path = summary_path(config);
    std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
    log.info(format!("Run summary written to {}", path.display()));
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config(dir: &Path, cleanup: bool) -> TestConfig {
        let mut config = TestConfig::from_lookup(|_| None)
            .unwrap()
            .with_auth_dir(dir.join(".auth"))
            .with_results_dir(dir.join("results"));
        config.cleanup_temp_files = cleanup;
        config
    }

    #[test]
    fn test_summary_written_without_results_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), false);
        let summary = global_teardown(&config, &RunLog::new("t")).unwrap();
        assert_eq!(summary.cleanup.test_results_dir, "not found");

        let raw = std::fs::read_to_string(summary_path(&config)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["environment"]["baseUrl"], "http://localhost:3000");
        assert_eq!(json["environment"]["target"], "local");
        assert!(json["cleanup"]["authFilesPreserved"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_temp_dirs_removed_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("results/temp/nested");
        std::fs::create_dir_all(&temp).unwrap();

        let keep = config(dir.path(), false);
        assert!(cleanup_temp_dirs(&keep, &RunLog::new("t")).is_empty());
        assert!(temp.exists());

        let clean = config(dir.path(), true);
        let summary = global_teardown(&clean, &RunLog::new("t")).unwrap();
        assert_eq!(summary.cleanup.removed, vec![dir.path().join("results/temp")]);
        assert!(!dir.path().join("results/temp").exists());
        assert_eq!(summary.cleanup.test_results_dir, "available");
    }

    #[test]
    fn test_preserved_session_files_listed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), false);
        std::fs::create_dir_all(&config.auth_dir).unwrap();
        std::fs::write(config.auth_dir.join("admin.json"), "{}").unwrap();
        let summary = global_teardown(&config, &RunLog::new("t")).unwrap();
        assert_eq!(
            summary.cleanup.auth_files_preserved,
            vec![config.auth_dir.join("admin.json")]
        );
    }
}
