//! Public blog list.

use super::base::{BasePage, Navigable, PageObject, PageReadiness};
use crate::action::ActionOptions;
use crate::assertion::AssertOptions;
use crate::driver::{DialogEvent, DialogResponse};
use crate::locator::{Locator, Selector, TestIdFamily};
use crate::result::SiteResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Blog post identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// List of published posts
#[derive(Debug, Clone)]
pub struct BlogPage {
    base: BasePage,
    heading: Locator,
    search: Locator,
}

impl BlogPage {
    /// One row per post, `data-testid="blog-post-{id}"`
    pub const ROWS: TestIdFamily<PostId> = TestIdFamily::new("blog-post-");

    /// Page object over `base`
    #[must_use]
    pub fn new(base: BasePage) -> Self {
        Self {
            base,
            heading: Self::heading(),
            search: Self::search_field(),
        }
    }

    /// Page heading
    #[must_use]
    pub fn heading() -> Locator {
        Locator::role("heading", Some("Blog")).or(Selector::css("h1"))
    }

    /// Search input
    #[must_use]
    pub fn search_field() -> Locator {
        Locator::label("Search").or(Selector::css("input[type=\"search\"]"))
    }

    /// Delete button inside a post row
    #[must_use]
    pub fn delete_button(id: &PostId) -> Locator {
        Locator::role("button", Some("Delete")).within(&Self::ROWS.at(id))
    }

    /// Number of post rows
    pub async fn post_count(&self) -> SiteResult<usize> {
        self.base.element_count(&Self::ROWS.all()).await
    }

    /// Title shown in a post row
    pub async fn post_title(&self, id: &PostId) -> SiteResult<Option<String>> {
        self.base.element_text(&Self::ROWS.at(id)).await
    }

    /// Type a search term
    pub async fn search(&self, term: &str) -> SiteResult<()> {
        self.base
            .safe_fill(&self.search, term, &ActionOptions::default())
            .await
            .map(|_| ())
    }

    /// Click a row's delete button and answer the confirmation
    pub async fn delete_post(&self, id: &PostId, confirm: bool) -> SiteResult<DialogEvent> {
        let response = if confirm {
            DialogResponse::Accept
        } else {
            DialogResponse::Dismiss
        };
        let button = Self::delete_button(id);
        let options = ActionOptions::default();
        let (_, event) = self
            .base
            .with_dialog(response, Some("Delete"), || {
                self.base.safe_click(&button, &options)
            })
            .await?;
        Ok(event)
    }
}

impl PageObject for BlogPage {
    fn base(&self) -> &BasePage {
        &self.base
    }
}

#[async_trait]
impl PageReadiness for BlogPage {
    async fn assert_page_loaded(&self) -> SiteResult<()> {
        self.base
            .expect()
            .visible(self.base.page(), &self.heading, &AssertOptions::new())
            .await
            .map(|_| ())
    }
}

impl Navigable for BlogPage {
    fn path(&self) -> String {
        "/blog".to_string()
    }
}
