//! Page objects.
//!
//! Each page is a [`BasePage`] plus its locators. Locator constructors are
//! associated functions so the same definitions drive both the page
//! objects and the in-memory test site.

mod base;
mod blog;
mod dashboard;
mod home;
mod login;

pub use base::{
    BasePage, Navigable, PageObject, PageReadiness, ViewportAware, ViewportClass,
    MOBILE_MAX_WIDTH, TABLET_MAX_WIDTH, TYPE_DELAY,
};
pub use blog::{BlogPage, PostId};
pub use dashboard::AdminDashboardPage;
pub use home::HomePage;
pub use login::{AdminLoginPage, LoginOptions};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{Credentials, ProtectedPaths, TestConfig};
    use crate::driver::{BrowserDriver, ContextOptions, PageDriver, Viewport};
    use crate::logging::RunLog;
    use crate::mock_driver::{MockBrowser, MockSite};
    use std::sync::Arc;

    async fn driver() -> (MockSite, Arc<dyn PageDriver>) {
        let admin = Credentials::new("ops@site.test", "correct-horse");
        let site =
            MockSite::blog_app("http://localhost:3000", &ProtectedPaths::default(), &admin).unwrap();
        let browser = MockBrowser::new(site.clone());
        let context = browser.new_context(ContextOptions::fresh()).await.unwrap();
        (site, context.new_page().await.unwrap())
    }

    fn base(page: Arc<dyn PageDriver>, name: &str) -> BasePage {
        let config = Arc::new(TestConfig::from_lookup(|_| None).unwrap());
        BasePage::new(page, config, &RunLog::new("test"), name)
    }

    mod home_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_open_and_follow_blog_link() {
            let (_, page) = driver().await;
            let home = HomePage::new(base(Arc::clone(&page), "home"));
            home.open().await.unwrap();
            home.go_to_blog().await.unwrap();
            let blog = BlogPage::new(base(page, "blog"));
            blog.assert_page_loaded().await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_viewport_classification() {
            let (_, page) = driver().await;
            let home = HomePage::new(base(page, "home"));
            assert_eq!(home.viewport_class().await.unwrap(), ViewportClass::Desktop);
            let class = home.resize(Viewport::new(390, 844)).await.unwrap();
            assert_eq!(class, ViewportClass::Mobile);
            assert_eq!(home.viewport_class().await.unwrap(), ViewportClass::Mobile);
        }
    }

    mod blog_tests {
        use super::*;

        #[test]
        fn test_row_family_is_typed() {
            assert_eq!(BlogPage::ROWS.at(&PostId(7)).to_string(), "testid=blog-post-7");
            let delete = BlogPage::delete_button(&PostId(7));
            assert_eq!(delete.parent().unwrap(), &BlogPage::ROWS.at(&PostId(7)));
        }

        #[tokio::test(start_paused = true)]
        async fn test_rows_and_titles() {
            let (_, page) = driver().await;
            let blog = BlogPage::new(base(page, "blog"));
            blog.open().await.unwrap();
            assert_eq!(blog.post_count().await.unwrap(), 2);
            assert_eq!(
                blog.post_title(&PostId(2)).await.unwrap().as_deref(),
                Some("Second Post")
            );
            blog.search("rust").await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_delete_answers_confirmation() {
            let (site, page) = driver().await;
            let blog = BlogPage::new(base(page, "blog"));
            blog.open().await.unwrap();
            let event = blog.delete_post(&PostId(1), false).await.unwrap();
            assert!(event.message.contains("Hello World"));
            assert_eq!(site.count("dialog.unhandled"), 0);
        }
    }

    mod dashboard_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_dashboard_requires_login_then_logs_out() {
            let (_, page) = driver().await;
            let dashboard = AdminDashboardPage::new(base(Arc::clone(&page), "dashboard"));
            let err = dashboard.open().await.unwrap_err();
            assert!(matches!(err, crate::result::SiteError::AssertionFailed { .. }));

            let login = AdminLoginPage::new(base(page, "login"));
            login
                .login(
                    &Credentials::new("ops@site.test", "correct-horse"),
                    &LoginOptions::default(),
                )
                .await
                .unwrap();
            dashboard.assert_page_loaded().await.unwrap();
            assert_eq!(dashboard.post_count().await.unwrap(), Some(2));
            dashboard.logout().await.unwrap();
            assert!(login.base().current_url().await.unwrap().ends_with("/admin/login"));
        }
    }
}
