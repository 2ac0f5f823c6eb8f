//! Result and error types for sitecheck.

use std::fmt;
use thiserror::Error;

/// Result type for sitecheck operations
pub type SiteResult<T> = Result<T, SiteError>;

/// Step of the authentication pipeline that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthStep {
    /// Ensure the session output directories exist
    PrepareDirectories,
    /// Submit credentials and wait for the protected redirect
    Login,
    /// Serialize cookies and per-origin storage to disk
    CaptureState,
    /// Reload the captured state and visit a protected route
    ValidateState,
}

impl AuthStep {
    /// All steps in execution order
    pub const ALL: [Self; 4] = [
        Self::PrepareDirectories,
        Self::Login,
        Self::CaptureState,
        Self::ValidateState,
    ];

    /// Short name used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrepareDirectories => "prepare-directories",
            Self::Login => "login",
            Self::CaptureState => "capture-state",
            Self::ValidateState => "validate-state",
        }
    }
}

impl fmt::Display for AuthStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in sitecheck
#[derive(Debug, Error)]
pub enum SiteError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page error reported by the driver
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Timed out after {ms}ms waiting for {what}")]
    Timeout {
        /// What was being waited for
        what: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Locator resolved to zero elements
    #[error("No element matches {selector}")]
    ElementNotFound {
        /// Locator description
        selector: String,
    },

    /// UI action failed after exhausting its retries
    #[error("{action} on {selector} failed after {attempts} attempt(s): {source}")]
    Action {
        /// Action name (click, fill, select)
        action: String,
        /// Locator description
        selector: String,
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        source: Box<SiteError>,
    },

    /// Element value differs from what was written
    #[error("Value of {selector} is {actual:?}, expected {expected:?}")]
    ValueMismatch {
        /// Locator description
        selector: String,
        /// Value that was written
        expected: String,
        /// Value read back
        actual: String,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Fixture acquisition or release failed
    #[error("Fixture '{name}' failed: {message}")]
    Fixture {
        /// Fixture name
        name: String,
        /// Error message
        message: String,
    },

    /// Fixture graph contains a cycle
    #[error("Fixture dependency cycle: {path}")]
    FixtureCycle {
        /// Cycle path, e.g. `a -> b -> a`
        path: String,
    },

    /// Fixture declares a dependency nobody defined
    #[error("Fixture '{name}' depends on undefined fixture '{dependency}'")]
    UnknownFixture {
        /// Fixture name
        name: String,
        /// Missing dependency
        dependency: String,
    },

    /// Fixture defined twice
    #[error("Fixture '{name}' is defined more than once")]
    DuplicateFixture {
        /// Fixture name
        name: String,
    },

    /// Authentication pipeline failure
    #[error("Authentication setup failed at {step}: {source}")]
    Auth {
        /// Step that failed
        step: AuthStep,
        /// Underlying error
        #[source]
        source: Box<SiteError>,
    },

    /// Persisted session state is unusable
    #[error("Session state invalid: {reason}")]
    SessionInvalid {
        /// Reason
        reason: String,
    },

    /// Credentials for a role are not configured
    #[error("No credentials configured for role '{role}'")]
    MissingCredentials {
        /// Role name
        role: String,
    },

    /// HTTP API returned an error envelope or status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Destructive operation attempted against production
    #[error("PRODUCTION SAFETY: refusing destructive operation '{operation}' on production")]
    ProductionGuard {
        /// Operation that was refused
        operation: String,
    },

    /// Dialog handling error
    #[error("Dialog error: {message}")]
    Dialog {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl SiteError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create a config error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a session error
    #[must_use]
    pub fn session(reason: impl Into<String>) -> Self {
        Self::SessionInvalid {
            reason: reason.into(),
        }
    }

    /// Create a timeout error from a duration
    #[must_use]
    pub fn timeout(what: impl Into<String>, after: std::time::Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            ms: after.as_millis() as u64,
        }
    }

    /// Wrap an error as a failed pipeline step
    #[must_use]
    pub fn auth(step: AuthStep, source: Self) -> Self {
        Self::Auth {
            step,
            source: Box::new(source),
        }
    }

    /// Whether this error (or the error it wraps) is a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Action { source, .. } | Self::Auth { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Whether retrying the same operation could succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Config { .. }
                | Self::SessionInvalid { .. }
                | Self::MissingCredentials { .. }
                | Self::ProductionGuard { .. }
                | Self::FixtureCycle { .. }
                | Self::UnknownFixture { .. }
                | Self::DuplicateFixture { .. }
                | Self::Url(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    mod error_tests {
        use super::*;

        #[test]
        fn test_timeout_display() {
            let err = SiteError::timeout("element visible", Duration::from_millis(1500));
            assert_eq!(
                err.to_string(),
                "Timed out after 1500ms waiting for element visible"
            );
        }

        #[test]
        fn test_is_timeout_sees_through_wrappers() {
            let inner = SiteError::timeout("click", Duration::from_secs(1));
            let action = SiteError::Action {
                action: "click".into(),
                selector: "#save".into(),
                attempts: 3,
                source: Box::new(inner),
            };
            assert!(action.is_timeout());
            let auth = SiteError::auth(AuthStep::Login, action);
            assert!(auth.is_timeout());
            assert!(!SiteError::page("boom").is_timeout());
        }

        #[test]
        fn test_retryable_classification() {
            assert!(SiteError::page("detached").is_retryable());
            assert!(SiteError::timeout("x", Duration::from_millis(1)).is_retryable());
            assert!(!SiteError::config("bad").is_retryable());
            assert!(!SiteError::session("expired").is_retryable());
            let guard = SiteError::ProductionGuard {
                operation: "delete post".into(),
            };
            assert!(!guard.is_retryable());
            assert!(guard.to_string().contains("delete post"));
        }

        #[test]
        fn test_auth_display_names_step() {
            let err = SiteError::auth(AuthStep::ValidateState, SiteError::session("redirected"));
            assert!(err.to_string().contains("validate-state"));
            assert!(err.to_string().contains("redirected"));
        }
    }

    mod auth_step_tests {
        use super::*;

        #[test]
        fn test_steps_in_order() {
            let names: Vec<_> = AuthStep::ALL.iter().map(|s| s.as_str()).collect();
            assert_eq!(
                names,
                ["prepare-directories", "login", "capture-state", "validate-state"]
            );
        }
    }
}
