//! Public home page.

use super::base::{BasePage, Navigable, PageObject, PageReadiness};
use crate::action::ActionOptions;
use crate::assertion::AssertOptions;
use crate::locator::{Locator, Selector};
use crate::result::SiteResult;
use crate::wait::UrlPattern;
use async_trait::async_trait;

/// Landing page with hero section and navigation
#[derive(Debug, Clone)]
pub struct HomePage {
    base: BasePage,
    hero: Locator,
    blog_link: Locator,
}

impl HomePage {
    /// Page object over `base`
    #[must_use]
    pub fn new(base: BasePage) -> Self {
        Self {
            base,
            hero: Self::hero(),
            blog_link: Self::blog_link(),
        }
    }

    /// Hero section
    #[must_use]
    pub fn hero() -> Locator {
        Locator::test_id("hero").or(Selector::css("section.hero"))
    }

    /// Navigation link to the blog
    #[must_use]
    pub fn blog_link() -> Locator {
        Locator::role("link", Some("Blog"))
    }

    /// Follow the blog link
    pub async fn go_to_blog(&self) -> SiteResult<()> {
        self.base
            .safe_click(&self.blog_link, &ActionOptions::default())
            .await?;
        self.base
            .wait_for_url(&UrlPattern::Glob("**/blog*".to_string()), None)
            .await?;
        self.base.wait_for_page_load(None).await
    }
}

impl PageObject for HomePage {
    fn base(&self) -> &BasePage {
        &self.base
    }
}

#[async_trait]
impl PageReadiness for HomePage {
    async fn assert_page_loaded(&self) -> SiteResult<()> {
        self.base
            .expect()
            .visible(self.base.page(), &self.hero, &AssertOptions::new())
            .await
            .map(|_| ())
    }
}

impl Navigable for HomePage {
    fn path(&self) -> String {
        "/".to_string()
    }
}
