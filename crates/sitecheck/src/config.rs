//! Environment configuration for a test run.
//!
//! Every value has a fallback except credentials. A role without
//! credentials makes its auth pipeline skip instead of fail.

use crate::messages;
use crate::result::{SiteError, SiteResult};
use crate::session::Role;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// Placeholder admin email shipped in sample env files
pub const PLACEHOLDER_ADMIN_EMAIL: &str = "admin@example.com";

/// Stand-in for secret values in logs, errors and debug output
pub const REDACTED: &str = "<redacted>";

/// Default backend port for local health checks
pub const DEFAULT_BACKEND_PORT: u16 = 3001;

/// Test-title tags that mark destructive tests, as a regex
pub const DESTRUCTIVE_TAGS: &str = "@create|@update|@delete|@remove|@modify|@crud";

const LOCAL_BASE_URL: &str = "http://localhost:3000";
const PRODUCTION_BASE_URL: &str = "https://reginaonline.de";

/// Deployment the suite runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Developer machine
    #[default]
    Local,
    /// Staging deployment
    Staging,
    /// Production deployment
    Prod,
}

impl Target {
    /// Lowercase name, also used as env-var suffix in uppercase
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::Prod => PRODUCTION_BASE_URL,
            Self::Local | Self::Staging => LOCAL_BASE_URL,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = SiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "" => Ok(Self::Local),
            "staging" => Ok(Self::Staging),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(SiteError::config(format!("unknown TARGET '{other}'"))),
        }
    }
}

/// Whether a test title carries a destructive tag
#[must_use]
pub fn is_destructive(title: &str) -> bool {
    regex::Regex::new(DESTRUCTIVE_TAGS).is_ok_and(|re| re.is_match(title))
}

/// Login credentials for one role
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Application routes that require a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedPaths {
    /// Login route unauthenticated visitors are redirected to
    pub login: String,
    /// Landing route after login
    pub dashboard: String,
    /// Blog editor route
    pub blog_editor: String,
}

impl Default for ProtectedPaths {
    fn default() -> Self {
        Self {
            login: "/admin/login".to_string(),
            dashboard: "/admin/dashboard".to_string(),
            blog_editor: "/admin/blog".to_string(),
        }
    }
}

/// Effective configuration for a run
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Target deployment
    pub target: Target,
    /// Production guard active (prod target or a production `NODE_ENV`/`TEST_ENV`)
    pub production: bool,
    /// Base URL of the application under test
    pub base_url: Url,
    /// Base URL of its HTTP API
    pub api_url: Url,
    /// Admin credentials
    pub admin: Option<Credentials>,
    /// Regular test user credentials
    pub test_user: Option<Credentials>,
    /// Running in CI
    pub ci: bool,
    /// Running inside Docker
    pub docker: bool,
    /// Run the browser headless
    pub headless: bool,
    /// Log filter directive
    pub log_level: String,
    /// Backend port for local health checks
    pub backend_port: u16,
    /// Protected routes
    pub paths: ProtectedPaths,
    /// Directory holding persisted session files
    pub auth_dir: PathBuf,
    /// Directory for screenshots and run artifacts
    pub results_dir: PathBuf,
    /// Remove temp artifacts at teardown
    pub cleanup_temp_files: bool,
}

fn flag(value: Option<String>) -> bool {
    value.is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TestConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> SiteResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> SiteResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));

        let target: Target = get("TARGET").unwrap_or_default().parse()?;
        let suffix = target.as_str().to_ascii_uppercase();

        let base_raw = get(&format!("TEST_BASE_URL_{suffix}"))
            .unwrap_or_else(|| target.default_base_url().to_string());
        let base_url = Url::parse(&base_raw)?;

        let api_raw = get(&format!("API_BASE_URL_{suffix}"))
            .unwrap_or_else(|| format!("{}/api", base_raw.trim_end_matches('/')));
        let api_url = Url::parse(&api_raw)?;

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if email != PLACEHOLDER_ADMIN_EMAIL => {
                Some(Credentials::new(email, password))
            }
            _ => None,
        };
        let test_user = match (get("TEST_USER_EMAIL"), get("TEST_USER_PASSWORD")) {
            (Some(email), Some(password)) => Some(Credentials::new(email, password)),
            _ => None,
        };

        let backend_port = match get("BACKEND_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| SiteError::config(format!("BACKEND_PORT '{raw}' is not a port")))?,
            None => DEFAULT_BACKEND_PORT,
        };

        let production = target == Target::Prod
            || ["NODE_ENV", "TEST_ENV"]
                .iter()
                .any(|key| get(key).is_some_and(|v| v.eq_ignore_ascii_case("production")));

        let defaults = ProtectedPaths::default();
        let paths = ProtectedPaths {
            login: get("PROTECTED_LOGIN_PATH").unwrap_or(defaults.login),
            dashboard: get("PROTECTED_DASHBOARD_PATH").unwrap_or(defaults.dashboard),
            blog_editor: get("PROTECTED_BLOG_EDITOR_PATH").unwrap_or(defaults.blog_editor),
        };

        Ok(Self {
            target,
            production,
            base_url,
            api_url,
            admin,
            test_user,
            ci: flag(lookup("CI")),
            docker: flag(lookup("DOCKER")),
            headless: get("HEADLESS").map_or(true, |v| !matches!(v.as_str(), "0" | "false" | "no")),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            backend_port,
            paths,
            auth_dir: get("AUTH_DIR").map_or_else(|| PathBuf::from("e2e/.auth"), PathBuf::from),
            results_dir: get("RESULTS_DIR")
                .map_or_else(|| PathBuf::from("test-results"), PathBuf::from),
            cleanup_temp_files: flag(lookup("CLEANUP_TEMP_FILES")),
        })
    }

    /// Whether destructive operations must be refused
    #[must_use]
    pub const fn is_production(&self) -> bool {
        self.production
    }

    /// Fail with [`SiteError::ProductionGuard`] when running against production
    pub fn assert_not_production(&self, operation: &str) -> SiteResult<()> {
        if self.production {
            return Err(SiteError::ProductionGuard {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Why a test titled `title` must be skipped here, if it must
    #[must_use]
    pub fn skip_reason(&self, title: &str) -> Option<&'static str> {
        (self.production && is_destructive(title)).then_some(messages::SKIPPED_ON_PROD)
    }

    /// Override the application base URL
    pub fn with_base_url(mut self, base: &str) -> SiteResult<Self> {
        self.base_url = Url::parse(base)?;
        Ok(self)
    }

    /// Override the API base URL
    pub fn with_api_url(mut self, api: &str) -> SiteResult<Self> {
        self.api_url = Url::parse(api)?;
        Ok(self)
    }

    /// Set credentials for a role
    #[must_use]
    pub fn with_credentials(mut self, role: Role, credentials: Credentials) -> Self {
        match role {
            Role::Admin => self.admin = Some(credentials),
            Role::TestUser => self.test_user = Some(credentials),
        }
        self
    }

    /// Set the session directory
    #[must_use]
    pub fn with_auth_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.auth_dir = dir.into();
        self
    }

    /// Set the artifacts directory
    #[must_use]
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    /// Credentials configured for a role
    #[must_use]
    pub const fn credentials(&self, role: Role) -> Option<&Credentials> {
        match role {
            Role::Admin => self.admin.as_ref(),
            Role::TestUser => self.test_user.as_ref(),
        }
    }

    /// Absolute URL for an application path
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Backend health endpoint for this target
    #[must_use]
    pub fn health_url(&self) -> String {
        if self.target == Target::Local {
            let host = if self.docker {
                "host.docker.internal"
            } else {
                "localhost"
            };
            format!("http://{host}:{}/health", self.backend_port)
        } else {
            format!("{}/health", self.base_url.as_str().trim_end_matches('/'))
        }
    }

    /// Screenshot directory
    #[must_use]
    pub fn screenshots_dir(&self) -> PathBuf {
        self.results_dir.join("screenshots")
    }

    /// Configuration view without secrets
    #[must_use]
    pub fn public_view(&self) -> serde_json::Value {
        serde_json::json!({
            "target": self.target,
            "production": self.production,
            "baseUrl": self.base_url.as_str(),
            "apiUrl": self.api_url.as_str(),
            "healthUrl": self.health_url(),
            "adminConfigured": self.admin.is_some(),
            "testUserConfigured": self.test_user.is_some(),
            "ci": self.ci,
            "docker": self.docker,
            "headless": self.headless,
            "logLevel": self.log_level,
            "paths": self.paths,
            "authDir": self.auth_dir,
            "resultsDir": self.results_dir,
            "cleanupTempFiles": self.cleanup_temp_files,
        })
    }
}
