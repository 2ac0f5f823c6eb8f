//! Shared page capabilities.
//!
//! Concrete pages hold a [`BasePage`] and implement the capability traits
//! instead of inheriting from a base class:
//!
//! - [`PageObject`]: access to the shared base
//! - [`PageReadiness`]: the page-specific "is loaded" check (required)
//! - [`Navigable`]: pages reachable by path
//! - [`ViewportAware`]: viewport classification, implemented for every page

use crate::action::{perform, Action, ActionOptions, ActionReport};
use crate::assertion::Assertions;
use crate::config::TestConfig;
use crate::driver::{DialogEvent, DialogResponse, ElementSnapshot, PageDriver, Viewport};
use crate::locator::{Locator, Selector};
use crate::logging::RunLog;
use crate::messages;
use crate::result::SiteResult;
use crate::timeouts::TimeoutTier;
use crate::wait::{self, ElementState, UrlPattern};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Widest viewport still classified as mobile
pub const MOBILE_MAX_WIDTH: u32 = 768;
/// Widest viewport still classified as tablet
pub const TABLET_MAX_WIDTH: u32 = 1024;

/// Key delay used by [`BasePage::safe_type`]
pub const TYPE_DELAY: Duration = Duration::from_millis(100);

/// Device class derived from viewport width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportClass {
    /// Up to 768px
    Mobile,
    /// Up to 1024px
    Tablet,
    /// Wider
    Desktop,
}

impl ViewportClass {
    /// Classify a viewport width
    #[must_use]
    pub const fn classify(width: u32) -> Self {
        if width <= MOBILE_MAX_WIDTH {
            Self::Mobile
        } else if width <= TABLET_MAX_WIDTH {
            Self::Tablet
        } else {
            Self::Desktop
        }
    }
}

/// Navigation, actions, queries and dialogs shared by every page
#[derive(Clone)]
pub struct BasePage {
    page: Arc<dyn PageDriver>,
    config: Arc<TestConfig>,
    log: RunLog,
    expect: Assertions,
}

impl std::fmt::Debug for BasePage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasePage")
            .field("module", &self.log.module())
            .field("base_url", &self.config.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl BasePage {
    /// Base for a page named `name`, logging under `page:{name}`
    #[must_use]
    pub fn new(page: Arc<dyn PageDriver>, config: Arc<TestConfig>, log: &RunLog, name: &str) -> Self {
        let log = log.scoped(&format!("page:{name}"));
        let expect = Assertions::new(log.clone());
        Self {
            page,
            config,
            log,
            expect,
        }
    }

    /// Replace the assertion front end (e.g. soft mode)
    #[must_use]
    pub fn with_assertions(mut self, expect: Assertions) -> Self {
        self.expect = expect;
        self
    }

    /// Underlying page
    #[must_use]
    pub fn page(&self) -> &dyn PageDriver {
        self.page.as_ref()
    }

    /// Shared handle to the underlying page
    #[must_use]
    pub fn driver(&self) -> Arc<dyn PageDriver> {
        Arc::clone(&self.page)
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Page log
    #[must_use]
    pub const fn log(&self) -> &RunLog {
        &self.log
    }

    /// Assertions bound to this page's log
    #[must_use]
    pub const fn expect(&self) -> &Assertions {
        &self.expect
    }

    /// Navigate to an application path and wait for the page to load
    pub async fn goto(&self, path: &str) -> SiteResult<()> {
        let url = self.config.url_for(path);
        self.log.debug(format!("Navigating to {url}"));
        self.page
            .goto(&url, TimeoutTier::Navigation.duration())
            .await?;
        self.wait_for_page_load(None).await
    }

    /// Reload and wait for the page to load
    pub async fn reload(&self) -> SiteResult<()> {
        self.page.reload(TimeoutTier::Navigation.duration()).await?;
        self.wait_for_page_load(None).await
    }

    /// History back and wait for the page to load
    pub async fn go_back(&self) -> SiteResult<()> {
        self.page.go_back(TimeoutTier::Navigation.duration()).await?;
        self.wait_for_page_load(None).await
    }

    /// History forward and wait for the page to load
    pub async fn go_forward(&self) -> SiteResult<()> {
        self.page
            .go_forward(TimeoutTier::Navigation.duration())
            .await?;
        self.wait_for_page_load(None).await
    }

    /// Wait until network idle and document ready both hold
    pub async fn wait_for_page_load(&self, timeout: Option<Duration>) -> SiteResult<()> {
        let timeout = timeout.unwrap_or_else(|| TimeoutTier::PageLoad.duration());
        wait::wait_for_page_load(self.page(), timeout).await
    }

    /// Wait for the URL to match `pattern`
    pub async fn wait_for_url(
        &self,
        pattern: &UrlPattern,
        timeout: Option<Duration>,
    ) -> SiteResult<String> {
        let timeout = timeout.unwrap_or_else(|| TimeoutTier::Navigation.duration());
        wait::wait_for_url(self.page(), pattern, timeout).await
    }

    /// Wait for an element state
    pub async fn wait_for_element(
        &self,
        locator: &Locator,
        state: ElementState,
        timeout: Option<Duration>,
    ) -> SiteResult<ElementSnapshot> {
        let timeout = timeout.unwrap_or_else(|| TimeoutTier::ElementVisible.duration());
        wait::wait_for_element(self.page(), locator, state, timeout).await
    }

    /// Current URL
    pub async fn current_url(&self) -> SiteResult<String> {
        self.page.url().await
    }

    /// Document title
    pub async fn title(&self) -> SiteResult<String> {
        self.page.title().await
    }

    /// Click with retries
    pub async fn safe_click(
        &self,
        locator: &Locator,
        options: &ActionOptions,
    ) -> SiteResult<ActionReport> {
        perform(self.page(), locator, &Action::Click, options, &self.log).await
    }

    /// Fill with retries, verifying the value afterwards
    pub async fn safe_fill(
        &self,
        locator: &Locator,
        value: &str,
        options: &ActionOptions,
    ) -> SiteResult<ActionReport> {
        let action = Action::Fill(value.to_string());
        perform(self.page(), locator, &action, options, &self.log).await
    }

    /// Select options with retries
    pub async fn safe_select(
        &self,
        locator: &Locator,
        values: &[&str],
        options: &ActionOptions,
    ) -> SiteResult<ActionReport> {
        let action = Action::Select(values.iter().map(|v| (*v).to_string()).collect());
        perform(self.page(), locator, &action, options, &self.log).await
    }

    /// Type key by key with [`TYPE_DELAY`] between keys, with retries
    pub async fn safe_type(&self, locator: &Locator, text: &str) -> SiteResult<()> {
        let timeout = TimeoutTier::Type.duration();
        self.retry_action(crate::action::DEFAULT_RETRIES, move || async move {
            wait::wait_for_element(self.page(), locator, ElementState::Visible, timeout).await?;
            self.page.clear(locator).await?;
            self.page.type_text(locator, text, TYPE_DELAY).await?;
            let actual = self.page.query(locator).await?.value.unwrap_or_default();
            if actual == text {
                Ok(())
            } else {
                Err(crate::result::SiteError::ValueMismatch {
                    selector: locator.to_string(),
                    expected: text.to_string(),
                    actual,
                })
            }
        })
        .await
    }

    /// Run `action` up to `max` times, pausing between failures
    pub async fn retry_action<T, F, Fut>(&self, max: u32, mut action: F) -> SiteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SiteResult<T>>,
    {
        let max = max.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match action().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max && e.is_retryable() => {
                    self.log
                        .warn(messages::retry_action(attempt, max, &e.to_string()));
                    tokio::time::sleep(TimeoutTier::PollingInterval.duration()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Whether the element becomes visible within `timeout` (default Short).
    ///
    /// Never fails: timeouts and driver errors read as `false`.
    pub async fn is_element_visible(&self, locator: &Locator, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or_else(|| TimeoutTier::Short.duration());
        wait::wait_for_element(self.page(), locator, ElementState::Visible, timeout)
            .await
            .is_ok()
    }

    /// Whether the first match is present and enabled right now
    pub async fn is_element_enabled(&self, locator: &Locator) -> bool {
        self.page
            .query(locator)
            .await
            .is_ok_and(|s| s.count > 0 && s.enabled)
    }

    /// Number of matches
    pub async fn element_count(&self, locator: &Locator) -> SiteResult<usize> {
        Ok(self.page.query(locator).await?.count)
    }

    /// Text of the first match
    pub async fn element_text(&self, locator: &Locator) -> SiteResult<Option<String>> {
        Ok(self.page.query(locator).await?.text)
    }

    /// Form value of the first match
    pub async fn element_value(&self, locator: &Locator) -> SiteResult<Option<String>> {
        Ok(self.page.query(locator).await?.value)
    }

    /// Arm a one-shot dialog handler, run `trigger`, then wait for the dialog.
    ///
    /// A dialog whose message lacks `expected` is still answered; the
    /// mismatch is logged as a warning. If `trigger` fails the handler is
    /// disarmed before the error is returned.
    pub async fn with_dialog<T, F, Fut>(
        &self,
        response: DialogResponse,
        expected: Option<&str>,
        trigger: F,
    ) -> SiteResult<(T, DialogEvent)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SiteResult<T>>,
    {
        let guard = self.page.arm_dialog(response).await?;
        let output = match trigger().await {
            Ok(output) => output,
            Err(e) => {
                guard.disarm();
                self.log.debug("Dialog handler disarmed after failed trigger");
                return Err(e);
            }
        };
        let event = guard.wait(TimeoutTier::Short.duration()).await?;
        if let Some(expected) = expected {
            if !event.message.contains(expected) {
                self.log
                    .warn(messages::unexpected_dialog(expected, &event.message));
            }
        }
        self.log
            .debug(format!("Handled {:?} dialog: {}", event.kind, event.message));
        Ok((output, event))
    }

    /// Full-page screenshot under the results directory; returns its path
    pub async fn take_screenshot(&self, name: &str) -> SiteResult<PathBuf> {
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
        let path = self
            .config
            .screenshots_dir()
            .join(format!("screenshot-{name}-{stamp}.png"));
        self.page.screenshot(&path, true).await?;
        self.log.info(format!("Screenshot saved: {}", path.display()));
        Ok(path)
    }

    /// Locator for a form field by `name`, `data-testid` or id
    #[must_use]
    pub fn form_field(field: &str) -> Locator {
        Locator::css(format!("[name=\"{field}\"]"))
            .or(Selector::test_id(field))
            .or(Selector::css(format!("#{field}")))
    }

    /// Fill several fields in order
    pub async fn fill_form(&self, fields: &[(&str, &str)]) -> SiteResult<()> {
        let options = ActionOptions::default();
        for (field, value) in fields {
            self.safe_fill(&Self::form_field(field), value, &options)
                .await?;
        }
        Ok(())
    }

    /// Click the submit control and wait for the resulting load
    pub async fn submit_form(&self, submit: Option<&Locator>) -> SiteResult<()> {
        let fallback = Locator::css("button[type=\"submit\"]")
            .or(Selector::css("input[type=\"submit\"]"));
        let submit = submit.unwrap_or(&fallback);
        self.safe_click(submit, &ActionOptions::default()).await?;
        self.wait_for_page_load(Some(TimeoutTier::FormSubmit.duration()))
            .await
    }

    /// Time from navigation start until the page is loaded
    pub async fn measure_page_load(&self, path: &str) -> SiteResult<Duration> {
        let started = Instant::now();
        self.goto(path).await?;
        let elapsed = started.elapsed();
        self.log
            .info(format!("Page {path} loaded in {}ms", elapsed.as_millis()));
        Ok(elapsed)
    }
}

/// A page object built on [`BasePage`]
pub trait PageObject: Send + Sync {
    /// Shared capabilities
    fn base(&self) -> &BasePage;
}

/// Page-specific readiness check
#[async_trait]
pub trait PageReadiness: PageObject {
    /// Succeed once the page's identifying elements are present
    async fn assert_page_loaded(&self) -> SiteResult<()>;
}

/// Page reachable by a path
#[async_trait]
pub trait Navigable: PageReadiness {
    /// Application path
    fn path(&self) -> String;

    /// Navigate and assert readiness
    async fn open(&self) -> SiteResult<()> {
        self.base().goto(&self.path()).await?;
        self.assert_page_loaded().await
    }
}

/// Viewport inspection, available on every page object
#[async_trait]
pub trait ViewportAware: PageObject {
    /// Classify the current viewport
    async fn viewport_class(&self) -> SiteResult<ViewportClass> {
        let viewport = self.base().page().viewport().await?;
        Ok(ViewportClass::classify(viewport.width))
    }

    /// Resize and return the new class
    async fn resize(&self, viewport: Viewport) -> SiteResult<ViewportClass> {
        self.base().page().set_viewport(viewport).await?;
        Ok(ViewportClass::classify(viewport.width))
    }
}

impl<T: PageObject> ViewportAware for T {}
