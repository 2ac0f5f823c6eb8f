//! Symbolic log and error messages.

/// Admin session check landed on the login route
pub const ADMIN_STATE_REDIRECTED: &str =
    "Admin authentication state is invalid - redirected to login";
/// Session check landed on the login route
pub const STATE_REDIRECTED: &str = "Authentication state is invalid - redirected to login";
/// Session file missing
pub const AUTH_FILE_NOT_FOUND: &str = "Authentication file not found";
/// Session file is not a storage state document
pub const INVALID_AUTH_FILE_FORMAT: &str = "Invalid auth file format";
/// Session file has no cookies or no origins
pub const EMPTY_AUTH_STATE: &str = "Authentication state has no cookies or origins";
/// API login handshake failed inside a fixture
pub const API_LOGIN_FAILED: &str = "API client login failed, continuing unauthenticated";
/// API logout failed during fixture release
pub const API_LOGOUT_FAILED: &str = "API client logout failed during teardown";
/// Credentials missing for a pipeline
pub const CREDENTIALS_MISSING: &str = "Credentials not configured, skipping authentication setup";

/// Destructive test skipped because the target is production
pub const SKIPPED_ON_PROD: &str = "Test skipped: Destructive operations not allowed on production";
/// Environment check before destructive work
pub const ENVIRONMENT_CHECK: &str = "Checking environment safety before running destructive test";
/// Production guard is on for this run
pub const PROD_PROTECTION_ACTIVE: &str =
    "Production protection is active - destructive tests will be skipped";

/// Retry notice for a click
#[must_use]
pub fn click_retry(attempt: u32, max: u32) -> String {
    format!("Click attempt {attempt}/{max} failed, retrying")
}

/// Retry notice for any wrapped action
#[must_use]
pub fn action_retry(action: &str, target: &str, attempt: u32, max: u32, error: &str) -> String {
    format!("{action} on {target}: attempt {attempt}/{max} failed ({error}), retrying")
}

/// Retry notice for an arbitrary async action
#[must_use]
pub fn retry_action(attempt: u32, max: u32, error: &str) -> String {
    format!("Action attempt {attempt}/{max} failed: {error}")
}

/// Dialog text did not match the expected substring
#[must_use]
pub fn unexpected_dialog(expected: &str, actual: &str) -> String {
    format!("Unexpected dialog message: expected to contain {expected:?}, got {actual:?}")
}

/// Passed assertion
#[must_use]
pub fn assertion_passed(description: &str) -> String {
    format!("✓ {description}")
}

/// Failed assertion
#[must_use]
pub fn assertion_failed(description: &str, detail: &str) -> String {
    format!("❌ {description}: {detail}")
}

/// Pipeline step started
#[must_use]
pub fn auth_step(role: &str, step: &str) -> String {
    format!("[auth:{role}] {step}")
}

/// Session saved
#[must_use]
pub fn auth_state_saved(role: &str, path: &str) -> String {
    format!("[auth:{role}] session state saved to {path}")
}

/// Fixture lifecycle event
#[must_use]
pub fn fixture_event(name: &str, event: &str) -> String {
    format!("fixture {name}: {event}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_retry_numbers() {
        assert_eq!(click_retry(2, 3), "Click attempt 2/3 failed, retrying");
    }

    #[test]
    fn test_unexpected_dialog_mentions_both() {
        let msg = unexpected_dialog("Delete", "Are you sure?");
        assert!(msg.contains("Delete"));
        assert!(msg.contains("Are you sure?"));
    }

    #[test]
    fn test_assertion_failed_prefix() {
        assert!(assertion_failed("title", "was empty").starts_with("❌ title"));
    }
}
