//! Logging assertions.
//!
//! Every assertion logs its outcome through the run's [`RunLog`]: passes at
//! debug, failures at error. What happens after a failure depends on the
//! [`AssertMode`]:
//!
//! - `Hard` (default): the failure is returned as
//!   [`SiteError::AssertionFailed`].
//! - `Soft`: the failure is recorded and `Ok(AssertionResult { passed: false, .. })`
//!   is returned. [`Assertions::assert_all`] turns the collected failures into
//!   one error at the end of a test.
//!
//! Element and page assertions poll until the condition holds or the
//! timeout elapses.

use crate::driver::{ElementSnapshot, PageDriver};
use crate::locator::Locator;
use crate::logging::RunLog;
use crate::messages;
use crate::result::{SiteError, SiteResult};
use crate::timeouts::TimeoutTier;
use crate::wait::{poll_until, UrlPattern, ELEMENT_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Result of an assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Human-readable message
    pub message: String,
}

impl AssertionResult {
    /// Create a passing assertion result
    #[must_use]
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    /// Create a failing assertion result
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// What a failed assertion does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssertMode {
    /// Return an error
    #[default]
    Hard,
    /// Log, record and continue
    Soft,
}

/// Per-assertion options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertOptions {
    /// How long to poll; the check's tier when `None`
    pub timeout: Option<Duration>,
    /// Message replacing the generated description
    pub message: Option<String>,
    /// Mode override for this assertion
    pub mode: Option<AssertMode>,
}

impl AssertOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a custom failure message
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Record instead of failing
    #[must_use]
    pub const fn soft(mut self) -> Self {
        self.mode = Some(AssertMode::Soft);
        self
    }

    /// Fail immediately
    #[must_use]
    pub const fn hard(mut self) -> Self {
        self.mode = Some(AssertMode::Hard);
        self
    }
}

/// Condition on the elements a locator matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementCheck {
    /// Visible
    Visible,
    /// Hidden or absent
    Hidden,
    /// Enabled
    Enabled,
    /// Disabled
    Disabled,
    /// Checked
    Checked,
    /// Exact text
    Text(String),
    /// Text containing a substring
    ContainsText(String),
    /// Exact form value
    Value(String),
    /// Exact match count
    Count(usize),
    /// Match count above a bound
    CountGreaterThan(usize),
    /// Match count below a bound
    CountLessThan(usize),
}

impl ElementCheck {
    /// Whether the snapshot satisfies this check
    #[must_use]
    pub fn evaluate(&self, snapshot: &ElementSnapshot) -> bool {
        let present = snapshot.count > 0;
        match self {
            Self::Visible => present && snapshot.visible,
            Self::Hidden => !present || !snapshot.visible,
            Self::Enabled => present && snapshot.enabled,
            Self::Disabled => present && !snapshot.enabled,
            Self::Checked => present && snapshot.checked,
            Self::Text(expected) => snapshot.text.as_deref().map(str::trim) == Some(expected.as_str()),
            Self::ContainsText(needle) => snapshot
                .text
                .as_deref()
                .is_some_and(|t| t.contains(needle.as_str())),
            Self::Value(expected) => snapshot.value.as_deref() == Some(expected.as_str()),
            Self::Count(n) => snapshot.count == *n,
            Self::CountGreaterThan(n) => snapshot.count > *n,
            Self::CountLessThan(n) => snapshot.count < *n,
        }
    }

    /// Default timeout tier
    #[must_use]
    pub const fn timeout_tier(&self) -> TimeoutTier {
        match self {
            Self::Visible => TimeoutTier::ElementVisible,
            Self::Hidden => TimeoutTier::ElementHidden,
            _ => TimeoutTier::Default,
        }
    }

    fn describe(&self, locator: &Locator) -> String {
        match self {
            Self::Visible => format!("{locator} is visible"),
            Self::Hidden => format!("{locator} is hidden"),
            Self::Enabled => format!("{locator} is enabled"),
            Self::Disabled => format!("{locator} is disabled"),
            Self::Checked => format!("{locator} is checked"),
            Self::Text(t) => format!("{locator} has text {t:?}"),
            Self::ContainsText(t) => format!("{locator} contains text {t:?}"),
            Self::Value(v) => format!("{locator} has value {v:?}"),
            Self::Count(n) => format!("{locator} matches {n} element(s)"),
            Self::CountGreaterThan(n) => format!("{locator} matches more than {n} element(s)"),
            Self::CountLessThan(n) => format!("{locator} matches fewer than {n} element(s)"),
        }
    }

    fn actual(&self, snapshot: &ElementSnapshot) -> String {
        match self {
            Self::Visible | Self::Hidden => {
                format!("count={} visible={}", snapshot.count, snapshot.visible)
            }
            Self::Enabled | Self::Disabled => {
                format!("count={} enabled={}", snapshot.count, snapshot.enabled)
            }
            Self::Checked => format!("count={} checked={}", snapshot.count, snapshot.checked),
            Self::Text(_) | Self::ContainsText(_) => format!("text was {:?}", snapshot.text),
            Self::Value(_) => format!("value was {:?}", snapshot.value),
            Self::Count(_) | Self::CountGreaterThan(_) | Self::CountLessThan(_) => {
                format!("count was {}", snapshot.count)
            }
        }
    }
}

/// Expected text of a header or similar value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    /// Exact string
    Exact(String),
    /// Regex searched anywhere in the value
    Pattern(String),
}

impl TextMatch {
    /// Whether `actual` satisfies this match; an invalid regex never matches
    #[must_use]
    pub fn matches(&self, actual: &str) -> bool {
        match self {
            Self::Exact(expected) => actual == expected,
            Self::Pattern(pattern) => {
                regex::Regex::new(pattern).is_ok_and(|re| re.is_match(actual))
            }
        }
    }
}

impl std::fmt::Display for TextMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(expected) => write!(f, "{expected:?}"),
            Self::Pattern(pattern) => write!(f, "/{pattern}/"),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Assertion front end bound to one run's log
#[derive(Debug, Clone)]
pub struct Assertions {
    log: RunLog,
    mode: AssertMode,
    failures: Arc<Mutex<Vec<String>>>,
}

impl Assertions {
    /// Hard assertions logging to `log`
    #[must_use]
    pub fn new(log: RunLog) -> Self {
        Self::with_mode(log, AssertMode::Hard)
    }

    /// Assertions with a default mode
    #[must_use]
    pub fn with_mode(log: RunLog, mode: AssertMode) -> Self {
        Self {
            log,
            mode,
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Default mode
    #[must_use]
    pub const fn mode(&self) -> AssertMode {
        self.mode
    }

    /// Soft failures recorded so far
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fail if any soft assertion failed, then forget them
    pub fn assert_all(&self) -> SiteResult<()> {
        let failures = std::mem::take(
            &mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if failures.is_empty() {
            return Ok(());
        }
        Err(SiteError::AssertionFailed {
            message: format!(
                "{} soft assertion(s) failed: {}",
                failures.len(),
                failures.join("; ")
            ),
        })
    }

    fn conclude(
        &self,
        description: &str,
        passed: bool,
        detail: &str,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        if passed {
            self.log.debug(messages::assertion_passed(description));
            return Ok(AssertionResult::pass(description));
        }

        let headline = options.message.as_deref().unwrap_or(description);
        self.log.error(messages::assertion_failed(headline, detail));
        let message = format!("{headline}: {detail}");
        match options.mode.unwrap_or(self.mode) {
            AssertMode::Hard => Err(SiteError::AssertionFailed { message }),
            AssertMode::Soft => {
                self.failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(message.clone());
                Ok(AssertionResult::fail(message))
            }
        }
    }

    /// Poll `locator` until `check` holds
    pub async fn element(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        check: ElementCheck,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = check.describe(locator);
        let timeout = options
            .timeout
            .unwrap_or_else(|| check.timeout_tier().duration());
        let wanted = &check;
        let outcome = poll_until(&description, timeout, ELEMENT_POLL_INTERVAL, move || async move {
            let snapshot = page.query(locator).await?;
            Ok(wanted.evaluate(&snapshot).then_some(()))
        })
        .await;

        match outcome {
            Ok(()) => self.conclude(&description, true, "", options),
            Err(e) if e.is_timeout() => {
                let detail = match page.query(locator).await {
                    Ok(snapshot) => check.actual(&snapshot),
                    Err(e) => e.to_string(),
                };
                self.conclude(&description, false, &detail, options)
            }
            Err(e) => self.conclude(&description, false, &e.to_string(), options),
        }
    }

    /// Element is visible
    pub async fn visible(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(page, locator, ElementCheck::Visible, options).await
    }

    /// Element is hidden or absent
    pub async fn hidden(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(page, locator, ElementCheck::Hidden, options).await
    }

    /// Element is enabled
    pub async fn enabled(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(page, locator, ElementCheck::Enabled, options).await
    }

    /// Element is disabled
    pub async fn disabled(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(page, locator, ElementCheck::Disabled, options).await
    }

    /// Checkbox or radio is checked
    pub async fn checked(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(page, locator, ElementCheck::Checked, options).await
    }

    /// Either `primary` or `alternative` is visible
    pub async fn alternative_visible(
        &self,
        page: &dyn PageDriver,
        primary: &Locator,
        alternative: &Locator,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let either = alternative
            .selectors()
            .fold(primary.clone(), |either, selector| either.or(selector.clone()));
        self.element(page, &either, ElementCheck::Visible, options).await
    }

    /// Element text equals `expected` (trimmed)
    pub async fn text(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        expected: &str,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(page, locator, ElementCheck::Text(expected.to_string()), options)
            .await
    }

    /// Element text contains `needle`
    pub async fn contains_text(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        needle: &str,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(
            page,
            locator,
            ElementCheck::ContainsText(needle.to_string()),
            options,
        )
        .await
    }

    /// Input value equals `expected`
    pub async fn value(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        expected: &str,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(page, locator, ElementCheck::Value(expected.to_string()), options)
            .await
    }

    /// Locator matches exactly `n` elements
    pub async fn count(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        n: usize,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(page, locator, ElementCheck::Count(n), options).await
    }

    /// Locator matches more than `n` elements
    pub async fn count_greater_than(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        n: usize,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(page, locator, ElementCheck::CountGreaterThan(n), options)
            .await
    }

    /// Locator matches fewer than `n` elements
    pub async fn count_less_than(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        n: usize,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.element(page, locator, ElementCheck::CountLessThan(n), options)
            .await
    }

    /// Attribute of the first match equals `expected`
    pub async fn attribute(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        name: &str,
        expected: &str,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = format!("{locator} has {name}={expected:?}");
        let timeout = options
            .timeout
            .unwrap_or_else(|| TimeoutTier::Default.duration());
        let outcome = poll_until(&description, timeout, ELEMENT_POLL_INTERVAL, move || async move {
            // not attached yet counts as "not there yet"
            let actual = match page.attribute(locator, name).await {
                Ok(actual) => actual,
                Err(SiteError::ElementNotFound { .. }) => None,
                Err(e) => return Err(e),
            };
            Ok((actual.as_deref() == Some(expected)).then_some(()))
        })
        .await;
        match outcome {
            Ok(()) => self.conclude(&description, true, "", options),
            Err(e) => {
                let detail = match page.attribute(locator, name).await {
                    Ok(actual) => format!("{name} was {actual:?}"),
                    Err(_) => e.to_string(),
                };
                self.conclude(&description, false, &detail, options)
            }
        }
    }

    /// Class list of the first match includes `class`
    pub async fn has_class(
        &self,
        page: &dyn PageDriver,
        locator: &Locator,
        class: &str,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = format!("{locator} has class {class:?}");
        let timeout = options
            .timeout
            .unwrap_or_else(|| TimeoutTier::Default.duration());
        let has = |classes: Option<&str>| {
            classes.is_some_and(|list| list.split_whitespace().any(|c| c == class))
        };
        let outcome = poll_until(&description, timeout, ELEMENT_POLL_INTERVAL, move || async move {
            let classes = match page.attribute(locator, "class").await {
                Ok(classes) => classes,
                Err(SiteError::ElementNotFound { .. }) => None,
                Err(e) => return Err(e),
            };
            Ok(has(classes.as_deref()).then_some(()))
        })
        .await;
        match outcome {
            Ok(()) => self.conclude(&description, true, "", options),
            Err(e) => {
                let detail = match page.attribute(locator, "class").await {
                    Ok(classes) => format!("class was {classes:?}"),
                    Err(_) => e.to_string(),
                };
                self.conclude(&description, false, &detail, options)
            }
        }
    }

    /// Page URL matches `pattern`
    pub async fn url(
        &self,
        page: &dyn PageDriver,
        pattern: &UrlPattern,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = pattern.to_string();
        let timeout = options
            .timeout
            .unwrap_or_else(|| TimeoutTier::Navigation.duration());
        let outcome = poll_until(&description, timeout, ELEMENT_POLL_INTERVAL, move || async move {
            let url = page.url().await?;
            Ok(pattern.matches(&url).then_some(()))
        })
        .await;
        match outcome {
            Ok(()) => self.conclude(&description, true, "", options),
            Err(e) => {
                let detail = match page.url().await {
                    Ok(url) => format!("url was {url}"),
                    Err(_) => e.to_string(),
                };
                self.conclude(&description, false, &detail, options)
            }
        }
    }

    /// Page URL contains `needle`
    pub async fn url_contains(
        &self,
        page: &dyn PageDriver,
        needle: &str,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.url(page, &UrlPattern::Contains(needle.to_string()), options)
            .await
    }

    /// Page title equals `expected`
    pub async fn title(
        &self,
        page: &dyn PageDriver,
        expected: &str,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = format!("title is {expected:?}");
        let timeout = options
            .timeout
            .unwrap_or_else(|| TimeoutTier::Default.duration());
        let outcome = poll_until(&description, timeout, ELEMENT_POLL_INTERVAL, move || async move {
            let title = page.title().await?;
            Ok((title == expected).then_some(()))
        })
        .await;
        match outcome {
            Ok(()) => self.conclude(&description, true, "", options),
            Err(e) => {
                let detail = match page.title().await {
                    Ok(title) => format!("title was {title:?}"),
                    Err(_) => e.to_string(),
                };
                self.conclude(&description, false, &detail, options)
            }
        }
    }

    /// Condition is true
    pub fn truthy(
        &self,
        condition: bool,
        description: &str,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.conclude(description, condition, "expected true, got false", options)
    }

    /// Condition is false
    pub fn falsy(
        &self,
        condition: bool,
        description: &str,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.conclude(description, !condition, "expected false, got true", options)
    }

    /// Values are equal
    pub fn equal<T: PartialEq + Debug>(
        &self,
        actual: &T,
        expected: &T,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = format!("value equals {expected:?}");
        let detail = format!("expected {expected:?}, got {actual:?}");
        self.conclude(&description, actual == expected, &detail, options)
    }

    /// `actual > bound`
    pub fn greater_than<T: PartialOrd + Debug>(
        &self,
        actual: &T,
        bound: &T,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = format!("value greater than {bound:?}");
        let detail = format!("got {actual:?}");
        self.conclude(&description, actual > bound, &detail, options)
    }

    /// `actual >= bound`
    pub fn greater_than_or_equal<T: PartialOrd + Debug>(
        &self,
        actual: &T,
        bound: &T,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = format!("value greater than or equal to {bound:?}");
        let detail = format!("got {actual:?}");
        self.conclude(&description, actual >= bound, &detail, options)
    }

    /// `actual < bound`
    pub fn less_than<T: PartialOrd + Debug>(
        &self,
        actual: &T,
        bound: &T,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = format!("value less than {bound:?}");
        let detail = format!("got {actual:?}");
        self.conclude(&description, actual < bound, &detail, options)
    }

    /// JSON value is an array
    pub fn is_array(
        &self,
        value: &serde_json::Value,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.conclude(
            "value is an array",
            value.is_array(),
            &format!("got {}", json_kind(value)),
            options,
        )
    }

    /// JSON value is an array of exactly `length` items
    pub fn array_with_length(
        &self,
        value: &serde_json::Value,
        length: usize,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = format!("value is an array with length {length}");
        let (passed, detail) = match value.as_array() {
            Some(items) => (
                items.len() == length,
                format!("got array with length {}", items.len()),
            ),
            None => (false, format!("got {}", json_kind(value))),
        };
        self.conclude(&description, passed, &detail, options)
    }

    /// JSON array contains `item`
    pub fn array_contains(
        &self,
        value: &serde_json::Value,
        item: &serde_json::Value,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = format!("array contains {item}");
        let (passed, detail) = match value.as_array() {
            Some(items) => (items.contains(item), format!("got {value}")),
            None => (false, format!("got {}", json_kind(value))),
        };
        self.conclude(&description, passed, &detail, options)
    }

    /// JSON value is null
    pub fn null(
        &self,
        value: &serde_json::Value,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.conclude("value is null", value.is_null(), &format!("got {value}"), options)
    }

    /// JSON value is not null
    pub fn not_null(
        &self,
        value: &serde_json::Value,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.conclude("value is not null", !value.is_null(), "got null", options)
    }

    /// HTTP status is one of `allowed`
    pub fn status_in(
        &self,
        status: u16,
        allowed: &[u16],
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        let description = format!("status in {allowed:?}");
        self.conclude(
            &description,
            allowed.contains(&status),
            &format!("got {status}"),
            options,
        )
    }

    /// HTTP status is below `bound`
    pub fn status_less_than(
        &self,
        status: u16,
        bound: u16,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult> {
        self.conclude(
            &format!("status less than {bound}"),
            status < bound,
            &format!("got {status}"),
            options,
        )
    }

    /// Response carries header `name`, optionally with a matching value.
    ///
    /// Header names compare case-insensitively.
    pub fn header<K, V>(
        &self,
        headers: impl IntoIterator<Item = (K, V)>,
        name: &str,
        expected: Option<&TextMatch>,
        options: &AssertOptions,
    ) -> SiteResult<AssertionResult>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let description = match expected {
            Some(expected) => format!("response has header {name} = {expected}"),
            None => format!("response has header {name}"),
        };
        let found = headers
            .into_iter()
            .find(|(key, _)| key.as_ref().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_ref().to_string());
        let (passed, detail) = match (found, expected) {
            (None, _) => (false, "header missing".to_string()),
            (Some(actual), None) => (true, format!("{name} was {actual:?}")),
            (Some(actual), Some(expected)) => {
                (expected.matches(&actual), format!("{name} was {actual:?}"))
            }
        };
        self.conclude(&description, passed, &detail, options)
    }

    /// HTTP status is 2xx
    pub fn response_ok(&self, status: u16, options: &AssertOptions) -> SiteResult<AssertionResult> {
        self.conclude(
            "response is ok",
            (200..300).contains(&status),
            &format!("got status {status}"),
            options,
        )
    }
}
