//! Wait primitives: load states, element states, URL patterns.
//!
//! Every wait races a fixed timeout against the operation. There is no
//! cancellation token; a timed-out wait returns [`SiteError::Timeout`] and
//! the caller decides whether to retry.

use crate::driver::{ElementSnapshot, PageDriver};
use crate::locator::Locator;
use crate::result::{SiteError, SiteResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Interval between element re-queries
pub const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Page load milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoadState {
    /// `load` event fired (document ready state `complete`)
    #[default]
    Load,
    /// `DOMContentLoaded` fired
    DomContentLoaded,
    /// No network activity for a quiet period
    NetworkIdle,
}

impl LoadState {
    /// Browser event name
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::NetworkIdle => "networkidle",
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event_name())
    }
}

/// Element condition to wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementState {
    /// At least one match and it is visible
    Visible,
    /// No match, or the match is not visible
    Hidden,
    /// At least one match exists
    Attached,
    /// No match exists
    Detached,
    /// Visible match that accepts input
    Enabled,
}

impl ElementState {
    /// Whether a snapshot satisfies this state
    #[must_use]
    pub const fn is_satisfied_by(self, snapshot: &ElementSnapshot) -> bool {
        match self {
            Self::Visible => snapshot.count > 0 && snapshot.visible,
            Self::Hidden => snapshot.count == 0 || !snapshot.visible,
            Self::Attached => snapshot.count > 0,
            Self::Detached => snapshot.count == 0,
            Self::Enabled => snapshot.count > 0 && snapshot.visible && snapshot.enabled,
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Attached => "attached",
            Self::Detached => "detached",
            Self::Enabled => "enabled",
        }
    }
}

/// URL pattern for navigation waits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Regex match
    Regex(String),
    /// Glob pattern (e.g., "**/admin/dashboard*")
    Glob(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern),
            Self::Contains(pattern) => url.contains(pattern),
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(url))
                .unwrap_or(false),
            Self::Glob(pattern) => Self::glob_matches(pattern, url),
            Self::Any => true,
        }
    }

    /// `*` matches any run of characters, including `/`
    fn glob_matches(pattern: &str, url: &str) -> bool {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 1 {
            return pattern == url;
        }

        let first = parts[0];
        let last = parts[parts.len() - 1];
        if !url.starts_with(first) || url.len() < first.len() + last.len() {
            return false;
        }
        if !url.ends_with(last) {
            return false;
        }

        let mut pos = first.len();
        let end = url.len() - last.len();
        for part in &parts[1..parts.len() - 1] {
            if part.is_empty() {
                continue;
            }
            match url[pos..end].find(part) {
                Some(found) => pos += found + part.len(),
                None => return false,
            }
        }
        true
    }
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(p) => write!(f, "url == {p}"),
            Self::Prefix(p) => write!(f, "url starts with {p}"),
            Self::Contains(p) => write!(f, "url contains {p}"),
            Self::Regex(p) => write!(f, "url =~ /{p}/"),
            Self::Glob(p) => write!(f, "url like {p}"),
            Self::Any => f.write_str("any url"),
        }
    }
}

async fn poll_loop<T, F, Fut>(interval: Duration, mut condition: F) -> SiteResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SiteResult<Option<T>>>,
{
    loop {
        if let Some(value) = condition().await? {
            return Ok(value);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Re-run `condition` every `interval` until it yields a value or `timeout`
/// elapses. Condition errors end the wait immediately.
pub async fn poll_until<T, F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    condition: F,
) -> SiteResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SiteResult<Option<T>>>,
{
    match tokio::time::timeout(timeout, poll_loop(interval, condition)).await {
        Ok(result) => result,
        Err(_) => Err(SiteError::timeout(what, timeout)),
    }
}

/// Wait until the element reaches `state`, re-querying on every poll
pub async fn wait_for_element(
    page: &dyn PageDriver,
    locator: &Locator,
    state: ElementState,
    timeout: Duration,
) -> SiteResult<ElementSnapshot> {
    let what = format!("{locator} to be {}", state.describe());
    poll_until(&what, timeout, ELEMENT_POLL_INTERVAL, move || async move {
        let snapshot = page.query(locator).await?;
        Ok(state.is_satisfied_by(&snapshot).then_some(snapshot))
    })
    .await
}

/// Resolve once network-idle and document-ready both hold within `timeout`
pub async fn wait_for_page_load(page: &dyn PageDriver, timeout: Duration) -> SiteResult<()> {
    let both = futures::future::try_join(
        page.wait_for_load_state(LoadState::NetworkIdle, timeout),
        page.wait_for_load_state(LoadState::Load, timeout),
    );
    match tokio::time::timeout(timeout, both).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => Err(SiteError::timeout(
            "page load (network idle and document ready)",
            timeout,
        )),
    }
}

/// Wait for the page URL to match `pattern`; returns the matching URL
pub async fn wait_for_url(
    page: &dyn PageDriver,
    pattern: &UrlPattern,
    timeout: Duration,
) -> SiteResult<String> {
    let what = pattern.to_string();
    poll_until(&what, timeout, ELEMENT_POLL_INTERVAL, move || async move {
        let url = page.url().await?;
        Ok(pattern.matches(&url).then_some(url))
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod load_state_tests {
        use super::*;

        #[test]
        fn test_load_state_event_names() {
            assert_eq!(LoadState::Load.event_name(), "load");
            assert_eq!(LoadState::DomContentLoaded.event_name(), "DOMContentLoaded");
            assert_eq!(LoadState::NetworkIdle.event_name(), "networkidle");
        }

        #[test]
        fn test_load_state_default() {
            assert_eq!(LoadState::default(), LoadState::Load);
        }
    }

    mod element_state_tests {
        use super::*;

        fn snap(count: usize, visible: bool, enabled: bool) -> ElementSnapshot {
            ElementSnapshot {
                count,
                visible,
                enabled,
                ..ElementSnapshot::default()
            }
        }

        #[test]
        fn test_zero_matches_is_hidden_and_detached() {
            let none = snap(0, false, false);
            assert!(!ElementState::Visible.is_satisfied_by(&none));
            assert!(ElementState::Hidden.is_satisfied_by(&none));
            assert!(ElementState::Detached.is_satisfied_by(&none));
        }

        #[test]
        fn test_disabled_is_not_enabled() {
            let disabled = snap(1, true, false);
            assert!(ElementState::Visible.is_satisfied_by(&disabled));
            assert!(!ElementState::Enabled.is_satisfied_by(&disabled));
        }
    }

    mod url_pattern_tests {
        use super::*;

        #[test]
        fn test_glob_dashboard_redirect() {
            let p = UrlPattern::Glob("**/admin/dashboard*".to_string());
            assert!(p.matches("http://localhost:3000/admin/dashboard"));
            assert!(p.matches("http://localhost:3000/admin/dashboard?tab=posts"));
            assert!(!p.matches("http://localhost:3000/admin/login"));
        }

        #[test]
        fn test_glob_suffix_anchor() {
            let p = UrlPattern::Glob("*.png".to_string());
            assert!(p.matches("shot.png.png"));
            assert!(!p.matches("shot.png.txt"));
        }

        #[test]
        fn test_glob_without_wildcards_is_exact() {
            let p = UrlPattern::Glob("/blog".to_string());
            assert!(p.matches("/blog"));
            assert!(!p.matches("/blog/1"));
        }

        #[test]
        fn test_other_patterns() {
            assert!(UrlPattern::Contains("/admin".into()).matches("http://x/admin/a"));
            assert!(UrlPattern::Prefix("http://x".into()).matches("http://x/a"));
            assert!(UrlPattern::Regex(r"/blog/\d+$".into()).matches("http://x/blog/12"));
            assert!(!UrlPattern::Regex("(".into()).matches("anything"));
            assert!(UrlPattern::Any.matches(""));
        }

        proptest! {
            #[test]
            fn prop_double_star_glob_matches_any_path(path in "[a-z/]{0,20}") {
                let url = format!("http://host/{path}");
                prop_assert!(UrlPattern::Glob("**".to_string()).matches(&url));
            }

            #[test]
            fn prop_glob_with_literal_middle(prefix in "[a-z]{0,8}", suffix in "[a-z]{0,8}") {
                let url = format!("http://h/{prefix}/admin/dashboard{suffix}");
                prop_assert!(UrlPattern::Glob("**/admin/dashboard*".to_string()).matches(&url));
            }
        }
    }

    mod poll_tests {
        use super::*;
        use std::sync::atomic::{AtomicU32, Ordering};

        #[tokio::test(start_paused = true)]
        async fn test_poll_until_returns_value() {
            let calls = AtomicU32::new(0);
            let value = poll_until("third call", Duration::from_secs(5), ELEMENT_POLL_INTERVAL, || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok((n >= 3).then_some(n)) }
            })
            .await
            .unwrap();
            assert_eq!(value, 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_poll_until_times_out() {
            let start = tokio::time::Instant::now();
            let err = poll_until::<(), _, _>(
                "never",
                Duration::from_millis(500),
                ELEMENT_POLL_INTERVAL,
                || async { Ok(None) },
            )
            .await
            .unwrap_err();
            assert!(err.is_timeout());
            assert_eq!(start.elapsed(), Duration::from_millis(500));
        }

        #[tokio::test(start_paused = true)]
        async fn test_poll_until_propagates_condition_error() {
            let err = poll_until::<(), _, _>(
                "broken",
                Duration::from_secs(1),
                ELEMENT_POLL_INTERVAL,
                || async { Err(SiteError::page("target closed")) },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, SiteError::Page { .. }));
        }
    }
}
