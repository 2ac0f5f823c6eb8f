//! Retrying element actions.
//!
//! Each attempt waits for the element to be visible, scrolls it into view
//! and then performs the action under its own timeout. A failed attempt is
//! logged and retried after a fixed polling interval. The error from the
//! last attempt is returned wrapped in [`SiteError::Action`].

use crate::config::REDACTED;
use crate::driver::PageDriver;
use crate::locator::Locator;
use crate::logging::RunLog;
use crate::messages;
use crate::result::{SiteError, SiteResult};
use crate::timeouts::TimeoutTier;
use crate::wait::{wait_for_element, ElementState};
use std::time::Duration;
use tokio::time::Instant;

/// Default number of attempts
pub const DEFAULT_RETRIES: u32 = 3;

/// One logical UI action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Click
    Click,
    /// Replace the value and read it back
    Fill(String),
    /// Select options of a `<select>`
    Select(Vec<String>),
}

impl Action {
    /// Short name used in logs and errors
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Fill(_) => "fill",
            Self::Select(_) => "select",
        }
    }

    /// Timeout tier used when no explicit timeout is given
    #[must_use]
    pub const fn timeout_tier(&self) -> TimeoutTier {
        match self {
            Self::Click => TimeoutTier::Click,
            Self::Fill(_) => TimeoutTier::Fill,
            Self::Select(_) => TimeoutTier::Select,
        }
    }
}

/// Action wrapper options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOptions {
    /// Per-attempt timeout; the action's tier when `None`
    pub timeout: Option<Duration>,
    /// Maximum attempts
    pub retries: u32,
    /// Wait for visibility first
    pub wait_for_visible: bool,
    /// Scroll into view first
    pub scroll_into_view: bool,
    /// Pause between attempts
    pub poll_interval: Duration,
    /// Mask written and read-back values in errors and logs
    pub sensitive: bool,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            retries: DEFAULT_RETRIES,
            wait_for_visible: true,
            scroll_into_view: true,
            poll_interval: TimeoutTier::PollingInterval.duration(),
            sensitive: false,
        }
    }
}

impl ActionOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the maximum number of attempts
    #[must_use]
    pub const fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Toggle the visibility precondition
    #[must_use]
    pub const fn wait_for_visible(mut self, wait: bool) -> Self {
        self.wait_for_visible = wait;
        self
    }

    /// Toggle scrolling
    #[must_use]
    pub const fn scroll_into_view(mut self, scroll: bool) -> Self {
        self.scroll_into_view = scroll;
        self
    }

    /// Set the pause between attempts
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Treat the written value as a secret (passwords, tokens)
    #[must_use]
    pub const fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }
}

/// Outcome of a successful action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionReport {
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Wall time spent including pauses
    pub elapsed: Duration,
}

/// Perform `action` on `locator` with retries
pub async fn perform(
    page: &dyn PageDriver,
    locator: &Locator,
    action: &Action,
    options: &ActionOptions,
    log: &RunLog,
) -> SiteResult<ActionReport> {
    let max = options.retries.max(1);
    let timeout = options
        .timeout
        .unwrap_or_else(|| action.timeout_tier().duration());
    let started = Instant::now();
    let target = locator.to_string();

    let mut attempt = 0;
    loop {
        attempt += 1;
        match attempt_once(page, locator, action, options, timeout).await {
            Ok(()) => {
                return Ok(ActionReport {
                    attempts: attempt,
                    elapsed: started.elapsed(),
                })
            }
            Err(e) if attempt < max && e.is_retryable() => {
                let message = match action {
                    Action::Click => format!("{}: {e}", messages::click_retry(attempt, max)),
                    _ => messages::action_retry(action.name(), &target, attempt, max, &e.to_string()),
                };
                log.warn(message);
                tokio::time::sleep(options.poll_interval).await;
            }
            Err(e) => {
                log.error(format!("{} on {target} failed: {e}", action.name()));
                return Err(SiteError::Action {
                    action: action.name().to_string(),
                    selector: target,
                    attempts: attempt,
                    source: Box::new(e),
                });
            }
        }
    }
}

/// One attempt; the visibility wait and the action share one `timeout` budget
async fn attempt_once(
    page: &dyn PageDriver,
    locator: &Locator,
    action: &Action,
    options: &ActionOptions,
    timeout: Duration,
) -> SiteResult<()> {
    let deadline = Instant::now() + timeout;
    if options.wait_for_visible {
        wait_for_element(page, locator, ElementState::Visible, timeout).await?;
    }
    let act = async {
        if options.scroll_into_view {
            page.scroll_into_view(locator).await?;
        }
        match action {
            Action::Click => page.click(locator).await,
            Action::Fill(value) => fill_and_verify(page, locator, value, options.sensitive).await,
            Action::Select(values) => {
                select_and_verify(page, locator, values, options.sensitive).await
            }
        }
    };
    match tokio::time::timeout_at(deadline, act).await {
        Ok(result) => result,
        Err(_) => Err(SiteError::timeout(
            format!("{} on {locator}", action.name()),
            timeout,
        )),
    }
}

fn value_mismatch(locator: &Locator, expected: String, actual: String, sensitive: bool) -> SiteError {
    let (expected, actual) = if sensitive {
        (REDACTED.to_string(), REDACTED.to_string())
    } else {
        (expected, actual)
    };
    SiteError::ValueMismatch {
        selector: locator.to_string(),
        expected,
        actual,
    }
}

async fn fill_and_verify(
    page: &dyn PageDriver,
    locator: &Locator,
    value: &str,
    sensitive: bool,
) -> SiteResult<()> {
    page.clear(locator).await?;
    page.fill(locator, value).await?;
    let actual = page.query(locator).await?.value.unwrap_or_default();
    if actual != value {
        return Err(value_mismatch(locator, value.to_string(), actual, sensitive));
    }
    Ok(())
}

async fn select_and_verify(
    page: &dyn PageDriver,
    locator: &Locator,
    values: &[String],
    sensitive: bool,
) -> SiteResult<()> {
    let selected = page.select_options(locator, values).await?;
    if selected != values {
        return Err(value_mismatch(
            locator,
            values.join(","),
            selected.join(","),
            sensitive,
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{BrowserDriver, ContextOptions};
    use crate::locator::Selector;
    use crate::logging::LogLevel;
    use crate::mock_driver::{MockBrowser, MockElement, MockPage, MockSite, ValueTransform};
    use std::sync::Arc;

    fn site() -> MockSite {
        MockSite::new("http://localhost:3000").unwrap().page(
            "/form",
            MockPage::new("Form")
                .element(MockElement::new(Selector::css("#email")).input(""))
                .element(
                    MockElement::new(Selector::css("#lower"))
                        .input("")
                        .transform(ValueTransform::Lowercase),
                )
                .element(
                    MockElement::new(Selector::css("#short"))
                        .input("")
                        .transform(ValueTransform::Truncate(5)),
                )
                .element(MockElement::new(Selector::css("#save")).fail_clicks(2))
                .element(MockElement::new(Selector::css("#broken")).fail_clicks(10))
                .element(MockElement::new(Selector::css("#country")).options(&["de", "fr"]))
                .element(
                    MockElement::new(Selector::css("#late"))
                        .reveal_after(Duration::from_millis(400)),
                )
                .element(
                    MockElement::new(Selector::css("#slow"))
                        .reveal_after(Duration::from_millis(400))
                        .slow_click(Duration::from_millis(400)),
                ),
        )
    }

    async fn open(site: &MockSite) -> Arc<dyn crate::driver::PageDriver> {
        let browser = MockBrowser::new(site.clone());
        let context = browser.new_context(ContextOptions::fresh()).await.unwrap();
        let page = context.new_page().await.unwrap();
        page.goto("/form", Duration::from_secs(1)).await.unwrap();
        page
    }

    fn fast() -> ActionOptions {
        ActionOptions::new().timeout(Duration::from_millis(500))
    }

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let opts = ActionOptions::default();
            assert_eq!(opts.retries, 3);
            assert!(opts.wait_for_visible);
            assert!(opts.scroll_into_view);
            assert!(opts.timeout.is_none());
            assert_eq!(opts.poll_interval, Duration::from_millis(1000));
            assert!(!opts.sensitive);
        }

        #[test]
        fn test_tiers_by_action() {
            assert_eq!(Action::Click.timeout_tier(), TimeoutTier::Click);
            assert_eq!(Action::Fill(String::new()).timeout_tier(), TimeoutTier::Fill);
            assert_eq!(Action::Select(vec![]).timeout_tier(), TimeoutTier::Select);
        }
    }

    mod fill_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_fill_sets_exact_value() {
            let site = site();
            let page = open(&site).await;
            let email = Locator::css("#email");
            let report = perform(
                page.as_ref(),
                &email,
                &Action::Fill("hello@example.com".into()),
                &fast(),
                &RunLog::new("test"),
            )
            .await
            .unwrap();
            assert_eq!(report.attempts, 1);
            let value = page.query(&email).await.unwrap().value;
            assert_eq!(value.as_deref(), Some("hello@example.com"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_fill_detects_lowercasing() {
            let site = site();
            let page = open(&site).await;
            let err = perform(
                page.as_ref(),
                &Locator::css("#lower"),
                &Action::Fill("Hello@Example.com".into()),
                &fast(),
                &RunLog::new("test"),
            )
            .await
            .unwrap_err();
            match err {
                SiteError::Action { attempts, source, .. } => {
                    assert_eq!(attempts, 3);
                    assert!(matches!(*source, SiteError::ValueMismatch { .. }));
                }
                other => panic!("unexpected error {other:?}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_fill_detects_truncation() {
            let site = site();
            let page = open(&site).await;
            let err = perform(
                page.as_ref(),
                &Locator::css("#short"),
                &Action::Fill("hello@example.com".into()),
                &fast().retries(1),
                &RunLog::new("test"),
            )
            .await
            .unwrap_err();
            assert!(err.to_string().contains("hello"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_sensitive_fill_masks_values() {
            let site = site();
            let page = open(&site).await;
            let log = RunLog::new("test");
            let err = perform(
                page.as_ref(),
                &Locator::css("#short"),
                &Action::Fill("SuperSecret-42".into()),
                &fast().sensitive(true),
                &log,
            )
            .await
            .unwrap_err();

            assert!(err.to_string().contains(REDACTED));
            assert!(!err.to_string().contains("Super"));
            assert!(!format!("{err:?}").contains("Super"));
            let records = log.records();
            assert_eq!(records.len(), 3);
            assert!(records.iter().all(|r| !r.message.contains("Super")));
        }
    }

    mod retry_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_click_recovers_after_transient_failures() {
            let site = site();
            let page = open(&site).await;
            let log = RunLog::new("test");
            let save = Locator::css("#save");
            let report = perform(page.as_ref(), &save, &Action::Click, &fast(), &log)
                .await
                .unwrap();
            assert_eq!(report.attempts, 3);
            assert_eq!(site.click_attempts(&save), 3);
            assert_eq!(log.records_at(LogLevel::Warn).len(), 2);
            assert!(log.contains(LogLevel::Warn, "Click attempt 1/3"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_attempts_never_exceed_retries() {
            let site = site();
            let page = open(&site).await;
            let broken = Locator::css("#broken");
            for retries in 1..=4 {
                let before = site.click_attempts(&broken);
                let result = perform(
                    page.as_ref(),
                    &broken,
                    &Action::Click,
                    &fast().retries(retries),
                    &RunLog::new("test"),
                )
                .await;
                assert!(result.is_err());
                assert_eq!(site.click_attempts(&broken) - before, retries);
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_between_attempts_is_poll_interval() {
            let site = site();
            let page = open(&site).await;
            let interval = Duration::from_millis(1000);
            let err = perform(
                page.as_ref(),
                &Locator::css("#broken"),
                &Action::Click,
                &fast().poll_interval(interval),
                &RunLog::new("test"),
            )
            .await;
            assert!(err.is_err());

            let started = Instant::now();
            let report = perform(
                page.as_ref(),
                &Locator::css("#save"),
                &Action::Click,
                &fast().poll_interval(interval),
                &RunLog::new("test"),
            )
            .await
            .unwrap();
            assert_eq!(report.attempts, 3);
            assert_eq!(started.elapsed(), interval * (report.attempts - 1));
        }

        #[tokio::test(start_paused = true)]
        async fn test_zero_retries_still_tries_once() {
            let site = site();
            let page = open(&site).await;
            let report = perform(
                page.as_ref(),
                &Locator::css("#email"),
                &Action::Click,
                &fast().retries(0),
                &RunLog::new("test"),
            )
            .await
            .unwrap();
            assert_eq!(report.attempts, 1);
        }
    }

    mod precondition_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_waits_for_late_element() {
            let site = site();
            let page = open(&site).await;
            let report = perform(
                page.as_ref(),
                &Locator::css("#late"),
                &Action::Click,
                &ActionOptions::new().timeout(Duration::from_secs(2)),
                &RunLog::new("test"),
            )
            .await
            .unwrap();
            assert_eq!(report.attempts, 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_visibility_wait_counts_against_attempt_timeout() {
            let site = site();
            let page = open(&site).await;
            let started = Instant::now();
            let err = perform(
                page.as_ref(),
                &Locator::css("#slow"),
                &Action::Click,
                &fast().retries(1),
                &RunLog::new("test"),
            )
            .await
            .unwrap_err();
            assert!(err.is_timeout());
            assert!(started.elapsed() <= Duration::from_millis(500));
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_element_times_out_each_attempt() {
            let site = site();
            let page = open(&site).await;
            let err = perform(
                page.as_ref(),
                &Locator::css("#nowhere"),
                &Action::Click,
                &fast().retries(2),
                &RunLog::new("test"),
            )
            .await
            .unwrap_err();
            assert!(err.is_timeout());
        }

        #[tokio::test(start_paused = true)]
        async fn test_without_visibility_wait_fails_fast() {
            let site = site();
            let page = open(&site).await;
            let err = perform(
                page.as_ref(),
                &Locator::css("#nowhere"),
                &Action::Click,
                &fast().retries(1).wait_for_visible(false),
                &RunLog::new("test"),
            )
            .await
            .unwrap_err();
            match err {
                SiteError::Action { source, .. } => {
                    assert!(matches!(*source, SiteError::ElementNotFound { .. }));
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
    }

    mod select_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_select_known_option() {
            let site = site();
            let page = open(&site).await;
            let country = Locator::css("#country");
            perform(
                page.as_ref(),
                &country,
                &Action::Select(vec!["fr".into()]),
                &fast(),
                &RunLog::new("test"),
            )
            .await
            .unwrap();
            assert_eq!(page.query(&country).await.unwrap().value.as_deref(), Some("fr"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_select_unknown_option_fails() {
            let site = site();
            let page = open(&site).await;
            let result = perform(
                page.as_ref(),
                &Locator::css("#country"),
                &Action::Select(vec!["xx".into()]),
                &fast().retries(2),
                &RunLog::new("test"),
            )
            .await;
            assert!(result.is_err());
        }
    }
}
