//! Test data creation and cleanup.
//!
//! Everything the factory creates carries [`TEST_MARKER`] so the cleanup
//! pass can find it again by title or content. Creating and deleting data
//! through the API is refused when the client points at production.

use super::types::{
    BlogPost, NewPost, NewUser, PostQuery, PostStatus, SeoMeta, User, UserRole,
};
use super::ApiClient;
use crate::logging::RunLog;
use crate::result::SiteResult;
use uuid::Uuid;

/// Marker embedded in generated titles and emails
pub const TEST_MARKER: &str = "E2E";

const CLEANUP_PAGE_SIZE: u32 = 100;

/// Builds uniquely named posts and users
#[derive(Debug, Clone, Default)]
pub struct TestDataFactory;

impl TestDataFactory {
    fn tag() -> String {
        Uuid::new_v4().simple().to_string()[..8].to_string()
    }

    /// Short draft post
    #[must_use]
    pub fn simple_post(&self) -> NewPost {
        NewPost {
            title: format!("{TEST_MARKER} Test Post {}", Self::tag()),
            content: "This is an automated test post created by E2E testing.".to_string(),
            excerpt: Some("A simple test post for E2E validation".to_string()),
            ..NewPost::default()
        }
    }

    /// Markdown post with SEO metadata, published
    #[must_use]
    pub fn detailed_post(&self) -> NewPost {
        let title = format!("Detailed {TEST_MARKER} Test Post {}", Self::tag());
        NewPost {
            content: format!(
                "# Test Blog Post\n\nThis is a comprehensive test blog post created by automated E2E testing.\n\n\
                 ## Features Tested\n1. Blog post creation\n2. Content formatting\n3. Publishing workflow\n\n\
                 Created: {}",
                chrono::Utc::now().to_rfc3339()
            ),
            excerpt: Some("A detailed test post with comprehensive content for E2E validation".to_string()),
            status: PostStatus::Published,
            seo_meta: SeoMeta {
                title: title.clone(),
                description: "E2E generated post".to_string(),
                keywords: "e2e,test".to_string(),
            },
            title,
            ..NewPost::default()
        }
    }

    /// Account with a unique email
    #[must_use]
    pub fn user(&self, role: UserRole) -> NewUser {
        let tag = Self::tag();
        NewUser {
            name: format!("{TEST_MARKER} User {tag}"),
            email: format!("e2e-{tag}@example.test"),
            password: format!("E2e-{}!", Uuid::new_v4().simple()),
            role,
        }
    }

    /// Create `post` through `client`; refused on production
    pub async fn create_post(&self, client: &ApiClient, post: &NewPost) -> SiteResult<BlogPost> {
        client.assert_not_production("create test post")?;
        client.create_post(post).await
    }

    /// Create a fresh account with `role`; refused on production
    pub async fn create_user(&self, client: &ApiClient, role: UserRole) -> SiteResult<User> {
        client.assert_not_production("create test user")?;
        client.create_user(&self.user(role)).await
    }
}

/// Removes posts left behind by test runs
#[derive(Debug, Clone)]
pub struct TestDataCleanup {
    client: ApiClient,
    log: RunLog,
}

impl TestDataCleanup {
    /// Cleanup through `client`
    #[must_use]
    pub fn new(client: ApiClient, log: &RunLog) -> Self {
        Self {
            client,
            log: log.scoped("cleanup"),
        }
    }

    /// Whether a post looks generated by a test
    #[must_use]
    pub fn is_test_post(post: &BlogPost) -> bool {
        post.title.contains("Test Blog Post")
            || post.title.contains(TEST_MARKER)
            || post.content.contains("E2E testing")
    }

    /// Delete matching posts from the first page; returns how many were deleted.
    ///
    /// Individual delete failures are logged and skipped. Refused on
    /// production before anything is listed.
    pub async fn cleanup_test_posts(&self) -> SiteResult<usize> {
        self.client.assert_not_production("cleanup test posts")?;
        let page = self
            .client
            .list_posts(&PostQuery {
                limit: Some(CLEANUP_PAGE_SIZE),
                ..PostQuery::default()
            })
            .await?;
        let mut deleted = 0;
        for post in page.posts.iter().filter(|p| Self::is_test_post(p)) {
            let id = post.id_string();
            match self.client.delete_post(&id).await {
                Ok(()) => deleted += 1,
                Err(e) => self.log.warn(format!("Failed to delete test post {id}: {e}")),
            }
        }
        self.log.info(format!("Removed {deleted} test post(s)"));
        Ok(deleted)
    }
}
