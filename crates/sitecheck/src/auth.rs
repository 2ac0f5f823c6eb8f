//! Authentication state pipeline.
//!
//! ```text
//! prepare-directories ──► login ──► capture-state ──► validate-state
//!   auth dir +             form,     dashboard ready,   fresh context seeded
//!   screenshots dir        redirect  save {role}.json   from file, visit the
//!                                                       dashboard, no redirect
//! ```
//!
//! Each step runs only if the previous one succeeded. Steps are not retried
//! here; the action wrapper inside the login step already retries. A failed
//! step aborts the pipeline with [`SiteError::Auth`] naming the step. A
//! failed login leaves no session file behind and takes a screenshot under
//! the results directory.

use crate::config::{Credentials, TestConfig};
use crate::driver::{BrowserDriver, ContextDriver, ContextOptions, PageDriver};
use crate::logging::RunLog;
use crate::messages;
use crate::pages::{AdminDashboardPage, AdminLoginPage, BasePage, LoginOptions, PageReadiness};
use crate::result::{AuthStep, SiteError, SiteResult};
use crate::session::{Role, SessionStore, StorageState};
use crate::timeouts::TimeoutTier;
use crate::wait::wait_for_page_load;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

/// What the pipeline did for a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Logged in, captured and validated a new session
    Completed {
        /// Role
        role: Role,
        /// Session file
        path: PathBuf,
    },
    /// An existing session file was still valid
    Reused {
        /// Role
        role: Role,
        /// Session file
        path: PathBuf,
    },
    /// Nothing was done
    Skipped {
        /// Role
        role: Role,
        /// Why
        reason: String,
    },
}

impl PipelineOutcome {
    /// Role this outcome is for
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Completed { role, .. } | Self::Reused { role, .. } | Self::Skipped { role, .. } => {
                *role
            }
        }
    }

    /// Whether a usable session file exists afterwards
    #[must_use]
    pub const fn has_session(&self) -> bool {
        !matches!(self, Self::Skipped { .. })
    }
}

fn is_login_url(url: &str, login_path: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().starts_with(login_path),
        Err(_) => url.contains(login_path),
    }
}

/// Visit a protected route with `state` in a fresh context.
///
/// Structure is checked before any browser work. The context is closed on
/// every path.
pub async fn validate_session(
    browser: &dyn BrowserDriver,
    config: &TestConfig,
    role: Role,
    state: &StorageState,
    log: &RunLog,
) -> SiteResult<()> {
    state.validate_structure()?;

    let context = browser
        .new_context(ContextOptions::with_storage_state(state.clone()))
        .await?;
    let outcome = visit_protected_route(context.as_ref(), config, role).await;
    if let Err(e) = context.close().await {
        log.warn(format!("Failed to close validation context: {e}"));
    }
    outcome
}

async fn visit_protected_route(
    context: &dyn ContextDriver,
    config: &TestConfig,
    role: Role,
) -> SiteResult<()> {
    let page = context.new_page().await?;
    page.goto(
        &config.url_for(&config.paths.dashboard),
        TimeoutTier::Navigation.duration(),
    )
    .await?;
    wait_for_page_load(page.as_ref(), TimeoutTier::PageLoad.duration()).await?;
    let url = page.url().await?;
    if is_login_url(&url, &config.paths.login) {
        let reason = match role {
            Role::Admin => messages::ADMIN_STATE_REDIRECTED,
            Role::TestUser => messages::STATE_REDIRECTED,
        };
        return Err(SiteError::session(reason));
    }
    Ok(())
}

/// Runs the four setup steps for each role
#[derive(Clone)]
pub struct AuthPipeline {
    browser: Arc<dyn BrowserDriver>,
    config: Arc<TestConfig>,
    store: SessionStore,
    log: RunLog,
}

impl std::fmt::Debug for AuthPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPipeline")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl AuthPipeline {
    /// Pipeline writing to the configured auth directory
    #[must_use]
    pub fn new(browser: Arc<dyn BrowserDriver>, config: Arc<TestConfig>, log: &RunLog) -> Self {
        let store = SessionStore::new(config.auth_dir.clone());
        Self {
            browser,
            config,
            store,
            log: log.scoped("auth"),
        }
    }

    /// Session files
    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Step 1: create the auth and screenshot directories. Idempotent.
    pub fn prepare_directories(&self) -> SiteResult<()> {
        self.store.ensure_dir()?;
        std::fs::create_dir_all(self.config.screenshots_dir())?;
        Ok(())
    }

    /// Run all steps for `role`, skipping when it has no credentials
    pub async fn run(&self, role: Role) -> SiteResult<PipelineOutcome> {
        let Some(credentials) = self.config.credentials(role).cloned() else {
            self.log
                .warn(format!("{} ({role})", messages::CREDENTIALS_MISSING));
            return Ok(PipelineOutcome::Skipped {
                role,
                reason: messages::CREDENTIALS_MISSING.to_string(),
            });
        };
        let role_name = role.as_str();

        self.log
            .info(messages::auth_step(role_name, AuthStep::PrepareDirectories.as_str()));
        self.prepare_directories()
            .map_err(|e| SiteError::auth(AuthStep::PrepareDirectories, e))?;

        let context = self
            .browser
            .new_context(ContextOptions::fresh())
            .await
            .map_err(|e| SiteError::auth(AuthStep::Login, e))?;
        let captured = self.login_and_capture(context.as_ref(), role, &credentials).await;
        if let Err(e) = context.close().await {
            self.log.warn(format!("Failed to close setup context: {e}"));
        }
        let path = captured?;
        self.log
            .info(messages::auth_state_saved(role_name, &path.display().to_string()));

        self.log
            .info(messages::auth_step(role_name, AuthStep::ValidateState.as_str()));
        self.validate_session_file(role)
            .await
            .map_err(|e| SiteError::auth(AuthStep::ValidateState, e))?;

        Ok(PipelineOutcome::Completed { role, path })
    }

    /// Reuse a still-valid session file, or run the pipeline
    pub async fn ensure(&self, role: Role) -> SiteResult<PipelineOutcome> {
        if self.store.exists(role) {
            match self.validate_session_file(role).await {
                Ok(()) => {
                    self.log
                        .info(format!("Reusing valid {role} session state"));
                    return Ok(PipelineOutcome::Reused {
                        role,
                        path: self.store.path_for(role),
                    });
                }
                Err(e) => self
                    .log
                    .info(format!("Existing {role} session unusable ({e}), re-authenticating")),
            }
        }
        self.run(role).await
    }

    /// Admin setup is fatal; test-user setup only warns
    pub async fn run_all(&self, reuse: bool) -> SiteResult<Vec<PipelineOutcome>> {
        let mut outcomes = Vec::with_capacity(Role::ALL.len());
        for role in Role::ALL {
            let result = if reuse {
                self.ensure(role).await
            } else {
                self.run(role).await
            };
            match (role, result) {
                (_, Ok(outcome)) => outcomes.push(outcome),
                (Role::Admin, Err(e)) => {
                    self.log.error(format!("Admin authentication setup failed: {e}"));
                    return Err(e);
                }
                (Role::TestUser, Err(e)) => {
                    self.log
                        .warn(format!("Test user authentication setup failed: {e}"));
                    outcomes.push(PipelineOutcome::Skipped {
                        role,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    /// Load a role's session file and visit a protected route with it
    pub async fn validate_session_file(&self, role: Role) -> SiteResult<()> {
        let state = self.store.load(role)?;
        validate_session(self.browser.as_ref(), &self.config, role, &state, &self.log).await
    }

    async fn login_and_capture(
        &self,
        context: &dyn ContextDriver,
        role: Role,
        credentials: &Credentials,
    ) -> SiteResult<PathBuf> {
        let role_name = role.as_str();
        let page = context
            .new_page()
            .await
            .map_err(|e| SiteError::auth(AuthStep::Login, e))?;
        let base = BasePage::new(Arc::clone(&page), Arc::clone(&self.config), &self.log, "auth-setup");

        self.log
            .info(messages::auth_step(role_name, AuthStep::Login.as_str()));
        let login = AdminLoginPage::new(base.clone());
        let options = LoginOptions {
            expected_redirect: Some(self.config.paths.dashboard.clone()),
            ..LoginOptions::default()
        };
        if let Err(e) = login.login(credentials, &options).await {
            self.failure_screenshot(page.as_ref()).await;
            return Err(SiteError::auth(AuthStep::Login, e));
        }

        self.log
            .info(messages::auth_step(role_name, AuthStep::CaptureState.as_str()));
        let capture = async {
            AdminDashboardPage::new(base).assert_page_loaded().await?;
            let state = context.storage_state().await?;
            state.validate_structure()?;
            self.store.save(role, &state)
        };
        match capture.await {
            Ok(path) => Ok(path),
            Err(e) => {
                self.failure_screenshot(page.as_ref()).await;
                Err(SiteError::auth(AuthStep::CaptureState, e))
            }
        }
    }

    async fn failure_screenshot(&self, page: &dyn PageDriver) {
        let path = self.config.results_dir.join(format!(
            "auth-setup-failure-{}.png",
            Utc::now().timestamp_millis()
        ));
        match page.screenshot(&path, true).await {
            Ok(()) => self
                .log
                .error(format!("Authentication failed, screenshot: {}", path.display())),
            Err(e) => self
                .log
                .warn(format!("Authentication failed and screenshot failed: {e}")),
        }
    }
}
