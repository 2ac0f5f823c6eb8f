//! Command execution

use crate::commands::{selected_roles, SetupAuthArgs, ValidateStateArgs};
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use serde_json::{json, Value};
use sitecheck::api::{ApiClient, TestDataCleanup};
use sitecheck::{
    global_teardown, messages, summary_path, validate_session, AuthPipeline, BrowserDriver,
    PipelineOutcome, Role, RunLog, RunSummary, SessionStore, SiteError, TestConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Result of checking one role's session file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// Usable
    Valid,
    /// No file on disk
    Missing,
    /// File exists but cannot be used
    Invalid(String),
}

impl SessionCheck {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Missing => "missing",
            Self::Invalid(_) => "invalid",
        }
    }
}

/// Session check for one role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCheck {
    /// Role
    pub role: Role,
    /// Session file
    pub path: PathBuf,
    /// Outcome
    pub check: SessionCheck,
    /// Whether this outcome fails the command
    pub failed: bool,
}

/// Runs commands against one configuration and run log
#[derive(Debug)]
pub struct Runner {
    config: Arc<TestConfig>,
    log: RunLog,
    out: Reporter,
}

impl Runner {
    /// Create a runner
    #[must_use]
    pub fn new(config: TestConfig, log: &RunLog, out: Reporter) -> Self {
        Self {
            config: Arc::new(config),
            log: log.scoped("cli"),
            out,
        }
    }

    /// Effective configuration
    #[must_use]
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// `setup-auth`: all roles (admin fatal, test user soft) or one role (fatal)
    pub async fn setup_auth(
        &self,
        browser: Arc<dyn BrowserDriver>,
        args: &SetupAuthArgs,
    ) -> CliResult<Vec<PipelineOutcome>> {
        let pipeline = AuthPipeline::new(browser, Arc::clone(&self.config), &self.log);
        let outcomes = match args.role {
            None => pipeline.run_all(!args.force).await?,
            Some(role) if args.force => vec![pipeline.run(role.into()).await?],
            Some(role) => vec![pipeline.ensure(role.into()).await?],
        };

        for outcome in &outcomes {
            match outcome {
                PipelineOutcome::Completed { role, path } => self
                    .out
                    .success(&format!("{role}: session saved to {}", path.display())),
                PipelineOutcome::Reused { role, path } => self
                    .out
                    .success(&format!("{role}: reusing valid session {}", path.display())),
                PipelineOutcome::Skipped { role, reason } => {
                    self.out.warn(&format!("{role}: skipped ({reason})"));
                }
            }
        }
        self.out.json(&json!({
            "roles": outcomes.iter().map(outcome_json).collect::<Vec<_>>(),
        }));
        Ok(outcomes)
    }

    /// `validate-state`; `browser` of `None` checks file structure only
    pub async fn validate_state(
        &self,
        browser: Option<&dyn BrowserDriver>,
        args: &ValidateStateArgs,
    ) -> CliResult<Vec<RoleCheck>> {
        let store = SessionStore::new(self.config.auth_dir.clone());
        let mut checks = Vec::new();
        for role in selected_roles(args.role) {
            let path = store.path_for(role);
            let check = if !store.exists(role) {
                SessionCheck::Missing
            } else {
                let loaded = match store.load(role) {
                    Ok(state) => match browser {
                        Some(browser) => {
                            validate_session(browser, &self.config, role, &state, &self.log).await
                        }
                        None => Ok(()),
                    },
                    Err(e) => Err(e),
                };
                match loaded {
                    Ok(()) => SessionCheck::Valid,
                    Err(e) => SessionCheck::Invalid(e.to_string()),
                }
            };
            let failed = match &check {
                SessionCheck::Valid => false,
                SessionCheck::Invalid(_) => true,
                SessionCheck::Missing => {
                    args.role.is_some() || self.config.credentials(role).is_some()
                }
            };
            checks.push(RoleCheck {
                role,
                path,
                check,
                failed,
            });
        }

        for c in &checks {
            let line = match &c.check {
                SessionCheck::Valid => format!("{}: valid ({})", c.role, c.path.display()),
                SessionCheck::Missing => format!("{}: no session file at {}", c.role, c.path.display()),
                SessionCheck::Invalid(reason) => format!("{}: invalid - {reason}", c.role),
            };
            match (&c.check, c.failed) {
                (SessionCheck::Valid, _) => self.out.success(&line),
                (_, true) => self.out.failure(&line),
                (_, false) => self.out.warn(&line),
            }
        }
        let failed = checks.iter().filter(|c| c.failed).count();
        self.out.json(&json!({
            "live": browser.is_some(),
            "failed": failed,
            "roles": checks.iter().map(check_json).collect::<Vec<_>>(),
        }));

        if failed > 0 {
            return Err(CliError::Validation { failed });
        }
        Ok(checks)
    }

    /// `teardown`
    pub fn teardown(&self) -> CliResult<RunSummary> {
        let summary = global_teardown(&self.config, &self.log)?;
        self.out.success(&format!(
            "Run summary written to {}",
            summary_path(&self.config).display()
        ));
        for dir in &summary.cleanup.removed {
            self.out.info(&format!("  removed {}", dir.display()));
        }
        self.out.json(&serde_json::to_value(&summary).map_err(sitecheck::SiteError::from)?);
        Ok(summary)
    }

    /// `teardown --purge-test-data`: delete generated posts as admin.
    ///
    /// Refused on production before any request is made.
    pub async fn purge_test_data(&self) -> CliResult<usize> {
        self.log.info(messages::ENVIRONMENT_CHECK);
        self.config.assert_not_production("purge test data")?;
        let credentials = self
            .config
            .credentials(Role::Admin)
            .ok_or_else(|| SiteError::MissingCredentials {
                role: Role::Admin.to_string(),
            })?;

        let client = ApiClient::new(&self.config, &self.log)?;
        client.login(credentials).await?;
        let deleted = TestDataCleanup::new(client.clone(), &self.log)
            .cleanup_test_posts()
            .await?;
        if let Err(e) = client.logout().await {
            self.log
                .warn(format!("{}: {e}", messages::API_LOGOUT_FAILED));
        }
        self.out
            .success(&format!("Removed {deleted} generated test post(s)"));
        Ok(deleted)
    }

    /// `config`: always JSON, secrets left out
    pub fn show_config(&self) {
        let view = self.config.public_view();
        println!(
            "{}",
            serde_json::to_string_pretty(&view).unwrap_or_else(|_| view.to_string())
        );
    }
}

fn outcome_json(outcome: &PipelineOutcome) -> Value {
    match outcome {
        PipelineOutcome::Completed { role, path } => {
            json!({"role": role.as_str(), "status": "completed", "path": path})
        }
        PipelineOutcome::Reused { role, path } => {
            json!({"role": role.as_str(), "status": "reused", "path": path})
        }
        PipelineOutcome::Skipped { role, reason } => {
            json!({"role": role.as_str(), "status": "skipped", "reason": reason})
        }
    }
}

fn check_json(check: &RoleCheck) -> Value {
    let mut value = json!({
        "role": check.role.as_str(),
        "status": check.check.as_str(),
        "path": check.path,
        "failed": check.failed,
    });
    if let SessionCheck::Invalid(reason) = &check.check {
        value["reason"] = json!(reason);
    }
    value
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::RoleArg;
    use crate::config::{CliConfig, ColorChoice, Verbosity};
    use sitecheck::mock_driver::{MockBrowser, MockSite};
    use sitecheck::{Credentials, ProtectedPaths, StorageState};
    use std::path::Path;

    const ORIGIN: &str = "http://localhost:3000";

    fn quiet() -> Reporter {
        Reporter::new(
            &CliConfig::new()
                .with_color(ColorChoice::Never)
                .with_verbosity(Verbosity::Quiet),
        )
    }

    fn admin() -> Credentials {
        Credentials::new("ops@site.test", "correct-horse")
    }

    fn runner(dir: &Path, with_admin: bool) -> Runner {
        let mut config = TestConfig::from_lookup(|_| None)
            .unwrap()
            .with_auth_dir(dir.join(".auth"))
            .with_results_dir(dir.join("results"));
        if with_admin {
            config = config.with_credentials(Role::Admin, admin());
        }
        Runner::new(config, &RunLog::new("cli-test"), quiet())
    }

    fn browser() -> (MockSite, Arc<dyn BrowserDriver>) {
        let site = MockSite::blog_app(ORIGIN, &ProtectedPaths::default(), &admin()).unwrap();
        (site.clone(), Arc::new(MockBrowser::new(site)))
    }

    mod setup_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_setup_all_roles_skips_unconfigured_user() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(dir.path(), true);
            let (_, browser) = browser();
            let outcomes = runner
                .setup_auth(browser, &SetupAuthArgs::default())
                .await
                .unwrap();
            assert!(matches!(outcomes[0], PipelineOutcome::Completed { role: Role::Admin, .. }));
            assert!(matches!(outcomes[1], PipelineOutcome::Skipped { role: Role::TestUser, .. }));
            assert!(dir.path().join(".auth/admin.json").exists());
        }

        #[tokio::test(start_paused = true)]
        async fn test_second_setup_reuses_session() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(dir.path(), true);
            let (_, browser) = browser();
            let args = SetupAuthArgs {
                role: Some(RoleArg::Admin),
                ..SetupAuthArgs::default()
            };
            runner.setup_auth(Arc::clone(&browser), &args).await.unwrap();
            let again = runner.setup_auth(Arc::clone(&browser), &args).await.unwrap();
            assert!(matches!(again[0], PipelineOutcome::Reused { .. }));

            let forced = SetupAuthArgs { force: true, ..args };
            let fresh = runner.setup_auth(browser, &forced).await.unwrap();
            assert!(matches!(fresh[0], PipelineOutcome::Completed { .. }));
        }
    }

    mod validate_tests {
        use super::*;

        #[tokio::test]
        async fn test_offline_missing_files_only_fail_when_expected() {
            let dir = tempfile::tempdir().unwrap();
            let unconfigured = runner(dir.path(), false);
            let checks = unconfigured
                .validate_state(None, &ValidateStateArgs::default())
                .await
                .unwrap();
            assert!(checks.iter().all(|c| c.check == SessionCheck::Missing && !c.failed));

            let configured = runner(dir.path(), true);
            let err = configured
                .validate_state(None, &ValidateStateArgs::default())
                .await
                .unwrap_err();
            assert!(matches!(err, CliError::Validation { failed: 1 }));
        }

        #[tokio::test]
        async fn test_offline_rejects_empty_state() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(dir.path(), false);
            let store = SessionStore::new(dir.path().join(".auth"));
            store.ensure_dir().unwrap();
            std::fs::write(store.path_for(Role::Admin), r#"{"cookies":[],"origins":[]}"#).unwrap();

            let args = ValidateStateArgs {
                role: Some(RoleArg::Admin),
                ..ValidateStateArgs::default()
            };
            let err = runner.validate_state(None, &args).await.unwrap_err();
            assert!(matches!(err, CliError::Validation { failed: 1 }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_live_check_detects_revoked_session() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(dir.path(), true);
            let (site, browser) = browser();
            let args = SetupAuthArgs {
                role: Some(RoleArg::Admin),
                ..SetupAuthArgs::default()
            };
            runner.setup_auth(Arc::clone(&browser), &args).await.unwrap();

            let validate = ValidateStateArgs {
                role: Some(RoleArg::Admin),
                ..ValidateStateArgs::default()
            };
            let checks = runner
                .validate_state(Some(browser.as_ref()), &validate)
                .await
                .unwrap();
            assert_eq!(checks[0].check, SessionCheck::Valid);

            site.revoke_sessions();
            let err = runner
                .validate_state(Some(browser.as_ref()), &validate)
                .await
                .unwrap_err();
            assert!(matches!(err, CliError::Validation { failed: 1 }));

            // structure alone still passes
            let offline = runner.validate_state(None, &validate).await.unwrap();
            assert_eq!(offline[0].check, SessionCheck::Valid);
        }

        #[test]
        fn test_check_json_carries_reason() {
            let check = RoleCheck {
                role: Role::Admin,
                path: PathBuf::from("a.json"),
                check: SessionCheck::Invalid(messages::ADMIN_STATE_REDIRECTED.to_string()),
                failed: true,
            };
            let value = check_json(&check);
            assert_eq!(value["status"], "invalid");
            assert_eq!(value["reason"], messages::ADMIN_STATE_REDIRECTED);
            assert!(StorageState::default().validate_structure().is_err());
        }
    }

    mod teardown_tests {
        use super::*;

        #[tokio::test]
        async fn test_purge_refused_on_production() {
            let dir = tempfile::tempdir().unwrap();
            let config = TestConfig::from_lookup(|key| (key == "TARGET").then(|| "prod".to_string()))
                .unwrap()
                .with_credentials(Role::Admin, admin());
            let log = RunLog::new("cli-test");
            let runner = Runner::new(config.with_results_dir(dir.path()), &log, quiet());
            let err = runner.purge_test_data().await.unwrap_err();
            assert!(matches!(err, CliError::Site(SiteError::ProductionGuard { .. })));
            assert_eq!(err.exit_code(), 5);
            assert!(log.contains(sitecheck::LogLevel::Info, messages::ENVIRONMENT_CHECK));
        }

        #[tokio::test]
        async fn test_purge_needs_admin_credentials() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(dir.path(), false);
            let err = runner.purge_test_data().await.unwrap_err();
            assert!(matches!(err, CliError::Site(SiteError::MissingCredentials { .. })));
        }

        #[test]
        fn test_teardown_writes_summary() {
            let dir = tempfile::tempdir().unwrap();
            let runner = runner(dir.path(), false);
            let summary = runner.teardown().unwrap();
            assert_eq!(summary.environment.base_url, ORIGIN);
            assert!(summary_path(runner.config()).exists());
        }
    }
}
