//! Admin dashboard page.

use super::base::{BasePage, Navigable, PageObject, PageReadiness};
use crate::action::ActionOptions;
use crate::assertion::AssertOptions;
use crate::locator::{Locator, Selector};
use crate::result::SiteResult;
use crate::timeouts::TimeoutTier;
use crate::wait::UrlPattern;
use async_trait::async_trait;

/// Landing page after admin login
#[derive(Debug, Clone)]
pub struct AdminDashboardPage {
    base: BasePage,
    heading: Locator,
    posts_stat: Locator,
    logout: Locator,
}

impl AdminDashboardPage {
    /// Page object over `base`
    #[must_use]
    pub fn new(base: BasePage) -> Self {
        Self {
            base,
            heading: Self::heading(),
            posts_stat: Self::posts_stat(),
            logout: Self::logout_button(),
        }
    }

    /// Dashboard heading
    #[must_use]
    pub fn heading() -> Locator {
        Locator::role("heading", Some("Dashboard")).or(Selector::css("h1"))
    }

    /// Post count card
    #[must_use]
    pub fn posts_stat() -> Locator {
        Locator::test_id("stats-posts")
    }

    /// Logout button
    #[must_use]
    pub fn logout_button() -> Locator {
        Locator::role("button", Some("Logout")).or(Selector::test_id("logout-button"))
    }

    /// Number shown on the post count card
    pub async fn post_count(&self) -> SiteResult<Option<u64>> {
        let text = self.base.element_text(&self.posts_stat).await?;
        Ok(text.and_then(|t| t.trim().parse().ok()))
    }

    /// Log out and wait for the login route
    pub async fn logout(&self) -> SiteResult<()> {
        self.base
            .safe_click(&self.logout, &ActionOptions::default())
            .await?;
        let login = &self.base.config().paths.login;
        self.base
            .wait_for_url(
                &UrlPattern::Glob(format!("**{login}*")),
                Some(TimeoutTier::Logout.duration()),
            )
            .await?;
        self.base.log().info("Logged out");
        Ok(())
    }
}

impl PageObject for AdminDashboardPage {
    fn base(&self) -> &BasePage {
        &self.base
    }
}

#[async_trait]
impl PageReadiness for AdminDashboardPage {
    async fn assert_page_loaded(&self) -> SiteResult<()> {
        let expect = self.base.expect();
        let options = AssertOptions::new();
        expect
            .url_contains(self.base.page(), &self.base.config().paths.dashboard, &options)
            .await?;
        expect
            .visible(self.base.page(), &self.heading, &options)
            .await?;
        Ok(())
    }
}

impl Navigable for AdminDashboardPage {
    fn path(&self) -> String {
        self.base.config().paths.dashboard.clone()
    }
}
