//! Sitecheck CLI Library
//!
//! Runner boundary for the sitecheck harness: builds the configuration and
//! run log, installs the tracing subscriber and drives auth setup, session
//! validation and run teardown.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{
    selected_roles, Cli, ColorArg, Commands, FormatArg, RoleArg, SetupAuthArgs, TeardownArgs,
    ValidateStateArgs,
};
pub use config::{CliConfig, ColorChoice, OutputFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::Reporter;
pub use runner::{RoleCheck, Runner, SessionCheck};

use sitecheck::{init_subscriber, messages, BrowserDriver, RunLog, TestConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Dotenv file read when `--env-file` is not given
pub const DEFAULT_ENV_FILE: &str = ".env";

/// CLI settings from parsed arguments
#[must_use]
pub fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.clone().into())
        .with_format(cli.format.into())
        .with_json_logs(cli.log_json)
}

/// Variables from a dotenv file.
///
/// An explicit `path` must exist; otherwise [`DEFAULT_ENV_FILE`] is read
/// when present and skipped when not.
pub fn read_env_file(path: Option<&Path>) -> CliResult<HashMap<String, String>> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_ENV_FILE), false),
    };
    if !path.is_file() {
        if required {
            return Err(CliError::config(format!(
                "env file {} not found",
                path.display()
            )));
        }
        return Ok(HashMap::new());
    }
    let entries = dotenvy::from_path_iter(&path)
        .map_err(|e| CliError::config(format!("{}: {e}", path.display())))?;
    entries
        .map(|entry| entry.map_err(|e| CliError::config(format!("{}: {e}", path.display()))))
        .collect()
}

/// Configuration from `process` variables, falling back to `file` entries
pub fn config_from_sources<F>(process: F, file: &HashMap<String, String>) -> CliResult<TestConfig>
where
    F: Fn(&str) -> Option<String>,
{
    TestConfig::from_lookup(|key| {
        process(key)
            .filter(|v| !v.is_empty())
            .or_else(|| file.get(key).cloned())
    })
    .map_err(|e| CliError::config(e.to_string()))
}

/// Harness configuration from the environment and dotenv file plus CLI overrides
pub fn load_test_config(cli: &Cli) -> CliResult<TestConfig> {
    let file = read_env_file(cli.env_file.as_deref())?;
    let mut config = config_from_sources(|key| std::env::var(key).ok(), &file)?;
    if let Some(dir) = &cli.auth_dir {
        config = config.with_auth_dir(dir);
    }
    if let Some(dir) = &cli.results_dir {
        config = config.with_results_dir(dir);
    }
    Ok(config)
}

#[cfg(feature = "browser")]
async fn launch_browser(
    config: &TestConfig,
    chrome: Option<&Path>,
    _command: &str,
) -> CliResult<Arc<dyn BrowserDriver>> {
    let mut options = sitecheck::LaunchOptions::new().headless(config.headless);
    if let Some(path) = chrome {
        options = options.executable(path);
    }
    Ok(Arc::new(sitecheck::ChromiumBrowser::launch(options).await?))
}

#[cfg(not(feature = "browser"))]
async fn launch_browser(
    _config: &TestConfig,
    _chrome: Option<&Path>,
    command: &str,
) -> CliResult<Arc<dyn BrowserDriver>> {
    Err(CliError::BrowserUnavailable {
        command: command.to_string(),
    })
}

async fn close_browser(browser: &dyn BrowserDriver) {
    if let Err(e) = browser.close().await {
        tracing::warn!(error = %e, "failed to close browser");
    }
}

/// Run the parsed command line
pub async fn execute(cli: Cli) -> CliResult<()> {
    let cli_config = build_config(&cli);
    let test_config = load_test_config(&cli)?;

    let filter = cli_config.verbosity.log_filter(&test_config.log_level);
    if let Err(e) = init_subscriber(&filter, cli_config.json_logs) {
        eprintln!("warning: {e}");
    }

    let log = RunLog::new("sitecheck");
    tracing::debug!(run_id = %log.run_id(), deployment = test_config.target.as_str(), "starting");
    if test_config.is_production() {
        log.info(messages::PROD_PROTECTION_ACTIVE);
    }
    let runner = Runner::new(test_config, &log, Reporter::new(&cli_config));

    match cli.command {
        Commands::SetupAuth(args) => {
            let browser =
                launch_browser(runner.config(), args.chrome.as_deref(), "setup-auth").await?;
            let result = runner.setup_auth(Arc::clone(&browser), &args).await;
            close_browser(browser.as_ref()).await;
            result.map(|_| ())
        }
        Commands::ValidateState(args) => {
            if args.offline {
                return runner.validate_state(None, &args).await.map(|_| ());
            }
            match launch_browser(runner.config(), args.chrome.as_deref(), "validate-state").await {
                Ok(browser) => {
                    let result = runner.validate_state(Some(browser.as_ref()), &args).await;
                    close_browser(browser.as_ref()).await;
                    result.map(|_| ())
                }
                Err(CliError::BrowserUnavailable { .. }) => {
                    log.warn("No browser in this build; checking session file structure only");
                    runner.validate_state(None, &args).await.map(|_| ())
                }
                Err(e) => Err(e),
            }
        }
        Commands::Teardown(args) => {
            if args.purge_test_data {
                runner.purge_test_data().await?;
            }
            runner.teardown().map(|_| ())
        }
        Commands::Config => {
            runner.show_config();
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use sitecheck::{Role, Target};
    use std::fs;

    fn env_file(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), contents).unwrap();
        file
    }

    #[test]
    fn test_env_file_supplies_credentials() {
        let file = env_file("TARGET=staging\nADMIN_EMAIL=ops@site.test\nADMIN_PASSWORD=from-file\n");
        let vars = read_env_file(Some(file.path())).unwrap();
        let config = config_from_sources(|_| None, &vars).unwrap();
        assert_eq!(config.target, Target::Staging);
        assert_eq!(config.credentials(Role::Admin).unwrap().password, "from-file");
    }

    #[test]
    fn test_process_environment_wins_over_file() {
        let file = env_file("TARGET=staging\nADMIN_EMAIL=ops@site.test\nADMIN_PASSWORD=from-file\n");
        let vars = read_env_file(Some(file.path())).unwrap();
        let process = |key: &str| match key {
            "TARGET" => Some("local".to_string()),
            "ADMIN_PASSWORD" => Some("from-process".to_string()),
            "ADMIN_EMAIL" => Some(String::new()),
            _ => None,
        };
        let config = config_from_sources(process, &vars).unwrap();
        assert_eq!(config.target, Target::Local);
        let admin = config.credentials(Role::Admin).unwrap();
        assert_eq!(admin.password, "from-process");
        assert_eq!(admin.email, "ops@site.test");
    }

    #[test]
    fn test_explicit_env_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_env_file(Some(&dir.path().join("missing.env"))).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_cli_env_file_flag_is_read() {
        let file = env_file("RESULTS_DIR=from-file-results\n");
        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["sitecheck", "--env-file", path.as_str(), "config"]);
        let config = load_test_config(&cli).unwrap();
        if std::env::var("RESULTS_DIR").is_err() {
            assert_eq!(config.results_dir, PathBuf::from("from-file-results"));
        }
    }
}
