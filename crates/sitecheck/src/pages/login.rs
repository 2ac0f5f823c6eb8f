//! Admin login page.

use super::base::{BasePage, Navigable, PageObject, PageReadiness};
use crate::action::ActionOptions;
use crate::assertion::AssertOptions;
use crate::config::Credentials;
use crate::locator::{Locator, Selector};
use crate::result::{SiteError, SiteResult};
use crate::session::Role;
use crate::timeouts::TimeoutTier;
use crate::wait::UrlPattern;
use async_trait::async_trait;
use std::time::Duration;

/// Options for [`AdminLoginPage::login`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOptions {
    /// Wait for the post-login redirect
    pub wait_for_redirect: bool,
    /// Redirect target path; the configured dashboard when `None`
    pub expected_redirect: Option<String>,
    /// Redirect timeout
    pub timeout: Duration,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            wait_for_redirect: true,
            expected_redirect: None,
            timeout: TimeoutTier::Long.duration(),
        }
    }
}

/// Admin login form
#[derive(Debug, Clone)]
pub struct AdminLoginPage {
    base: BasePage,
    heading: Locator,
    email: Locator,
    password: Locator,
    submit: Locator,
    error: Locator,
}

impl AdminLoginPage {
    /// Page object over `base`
    #[must_use]
    pub fn new(base: BasePage) -> Self {
        Self {
            base,
            heading: Self::heading(),
            email: Self::email_field(),
            password: Self::password_field(),
            submit: Self::submit_button(),
            error: Self::error_message(),
        }
    }

    /// Page heading
    #[must_use]
    pub fn heading() -> Locator {
        Locator::role("heading", Some("Admin Login")).or(Selector::css("h1"))
    }

    /// Email input
    #[must_use]
    pub fn email_field() -> Locator {
        Locator::label("Email")
            .or(Selector::css("#email"))
            .or(Selector::css("input[type=\"email\"]"))
    }

    /// Password input
    #[must_use]
    pub fn password_field() -> Locator {
        Locator::label("Password")
            .or(Selector::css("#password"))
            .or(Selector::css("input[type=\"password\"]"))
    }

    /// Submit button
    #[must_use]
    pub fn submit_button() -> Locator {
        Locator::role("button", Some("Sign in")).or(Selector::css("button[type=\"submit\"]"))
    }

    /// Error banner shown after a rejected login
    #[must_use]
    pub fn error_message() -> Locator {
        Locator::test_id("login-error")
            .or(Selector::css(".error-message"))
            .or(Selector::role("alert", None))
    }

    /// Open the page, submit `credentials` and, if asked, wait for the redirect
    pub async fn login(&self, credentials: &Credentials, options: &LoginOptions) -> SiteResult<()> {
        let base = &self.base;
        base.log()
            .info(format!("Logging in as {}", credentials.email));
        self.open().await?;

        let action = ActionOptions::default();
        base.safe_fill(&self.email, &credentials.email, &action)
            .await?;
        base.safe_fill(&self.password, &credentials.password, &action.sensitive(true))
            .await?;
        base.safe_click(&self.submit, &action).await?;

        if options.wait_for_redirect {
            let target = options
                .expected_redirect
                .as_deref()
                .unwrap_or(base.config().paths.dashboard.as_str());
            let pattern = UrlPattern::Glob(format!("**{target}*"));
            base.wait_for_url(&pattern, Some(options.timeout)).await?;
            base.log().info("Login redirect completed");
        }
        Ok(())
    }

    /// Log in with the configured credentials for `role`
    pub async fn login_as(&self, role: Role, options: &LoginOptions) -> SiteResult<()> {
        let credentials = self
            .base
            .config()
            .credentials(role)
            .cloned()
            .ok_or_else(|| SiteError::MissingCredentials {
                role: role.to_string(),
            })?;
        self.login(&credentials, options).await
    }

    /// Whether the error banner shows up within the short timeout
    pub async fn has_error(&self) -> bool {
        self.base.is_element_visible(&self.error, None).await
    }

    /// Error banner text, if shown
    pub async fn error_text(&self) -> SiteResult<Option<String>> {
        if !self.has_error().await {
            return Ok(None);
        }
        self.base.element_text(&self.error).await
    }
}

impl PageObject for AdminLoginPage {
    fn base(&self) -> &BasePage {
        &self.base
    }
}

#[async_trait]
impl PageReadiness for AdminLoginPage {
    async fn assert_page_loaded(&self) -> SiteResult<()> {
        let page = self.base.page();
        let expect = self.base.expect();
        let options = AssertOptions::new();
        expect.visible(page, &self.heading, &options).await?;
        expect.visible(page, &self.email, &options).await?;
        expect.visible(page, &self.password, &options).await?;
        Ok(())
    }
}

impl Navigable for AdminLoginPage {
    fn path(&self) -> String {
        self.base.config().paths.login.clone()
    }
}
