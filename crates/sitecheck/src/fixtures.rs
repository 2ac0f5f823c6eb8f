//! Standard fixture bindings.
//!
//! Three universes bind the same fixture names differently:
//!
//! | fixture                | Authenticated                  | Guest           | ApiOnly          |
//! |------------------------|--------------------------------|-----------------|------------------|
//! | `page`                 | context seeded with admin state | fresh context   |                  |
//! | `admin_page`           | `page` after a dashboard check  |                 |                  |
//! | `guest_page`           | fresh context                  |                 |                  |
//! | `api`                  | unauthenticated client         |                 | unauthenticated  |
//! | `api_client`           | admin handshake, logout on release |             | no handshake     |
//! | `home_page`/`blog_page`| over `page`                    | over `page`     |                  |
//! | `admin_login_page`     | over `guest_page`              | over `page`     |                  |
//! | `admin_dashboard_page` | over `admin_page`              |                 |                  |
//!
//! Browser fixtures release by closing their context.

use crate::api::ApiClient;
use crate::config::TestConfig;
use crate::driver::{BrowserDriver, ContextDriver, ContextOptions, PageDriver};
use crate::fixture::{Acquired, FixtureDeps, FixtureGraph};
use crate::logging::RunLog;
use crate::messages;
use crate::pages::{AdminDashboardPage, AdminLoginPage, BasePage, BlogPage, HomePage};
use crate::result::{SiteError, SiteResult};
use crate::session::{Role, SessionStore};
use crate::timeouts::TimeoutTier;
use crate::wait::wait_for_page_load;
use futures::future::{ready, Ready};
use std::sync::Arc;

/// Raw page fixture
pub const PAGE: &str = "page";
/// Page verified to be logged in as admin
pub const ADMIN_PAGE: &str = "admin_page";
/// Page in a fresh context
pub const GUEST_PAGE: &str = "guest_page";
/// Unauthenticated API client
pub const API: &str = "api";
/// API client after the admin handshake
pub const API_CLIENT: &str = "api_client";
/// [`HomePage`]
pub const HOME_PAGE: &str = "home_page";
/// [`BlogPage`]
pub const BLOG_PAGE: &str = "blog_page";
/// [`AdminLoginPage`]
pub const ADMIN_LOGIN_PAGE: &str = "admin_login_page";
/// [`AdminDashboardPage`]
pub const ADMIN_DASHBOARD_PAGE: &str = "admin_dashboard_page";

/// Which binding set a test opts into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Universe {
    /// Pages seeded from the persisted admin session
    Authenticated,
    /// Pages without any persisted session
    Guest,
    /// API clients only
    ApiOnly,
}

/// What the standard factories build from
#[derive(Clone)]
pub struct HarnessEnv {
    /// Browser to open contexts in
    pub browser: Arc<dyn BrowserDriver>,
    /// Run configuration
    pub config: Arc<TestConfig>,
    /// Run log
    pub log: RunLog,
}

impl std::fmt::Debug for HarnessEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessEnv")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A page and the context that owns it
#[derive(Clone)]
pub struct PageFixture {
    context: Arc<dyn ContextDriver>,
    page: Arc<dyn PageDriver>,
}

impl std::fmt::Debug for PageFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFixture").finish_non_exhaustive()
    }
}

impl PageFixture {
    /// The page
    #[must_use]
    pub fn page(&self) -> Arc<dyn PageDriver> {
        Arc::clone(&self.page)
    }

    /// Its context
    #[must_use]
    pub fn context(&self) -> Arc<dyn ContextDriver> {
        Arc::clone(&self.context)
    }
}

async fn open_page(env: &HarnessEnv, options: ContextOptions) -> SiteResult<Acquired> {
    let context = env.browser.new_context(options).await?;
    let page = match context.new_page().await {
        Ok(page) => page,
        Err(e) => {
            if let Err(close) = context.close().await {
                env.log.warn(messages::fixture_event(
                    PAGE,
                    &format!("context close after failed page open failed: {close}"),
                ));
            }
            return Err(e);
        }
    };
    let fixture = PageFixture {
        context: Arc::clone(&context),
        page,
    };
    Ok(Acquired::new(fixture).with_release(move || async move { context.close().await }))
}

async fn seeded_page(env: HarnessEnv, _: FixtureDeps) -> SiteResult<Acquired> {
    let store = SessionStore::new(env.config.auth_dir.clone());
    let state = store.load(Role::Admin)?;
    open_page(&env, ContextOptions::with_storage_state(state)).await
}

async fn fresh_page(env: HarnessEnv, _: FixtureDeps) -> SiteResult<Acquired> {
    open_page(&env, ContextOptions::fresh()).await
}

async fn verified_admin_page(env: HarnessEnv, deps: FixtureDeps) -> SiteResult<Acquired> {
    let fixture = deps.get::<PageFixture>(PAGE)?;
    let page = fixture.page();
    let config = &env.config;
    let landing = async {
        page.goto(
            &config.url_for(&config.paths.dashboard),
            TimeoutTier::Navigation.duration(),
        )
        .await?;
        wait_for_page_load(page.as_ref(), TimeoutTier::PageLoad.duration()).await?;
        let url = page.url().await?;
        if url.contains(&config.paths.login) {
            return Err(SiteError::session(messages::ADMIN_STATE_REDIRECTED));
        }
        Ok(())
    };
    if let Err(e) = landing.await {
        env.log.error(format!("Admin page setup failed: {e}"));
        return Err(e);
    }
    Ok(Acquired::shared(fixture))
}

async fn api(env: HarnessEnv, _: FixtureDeps) -> SiteResult<Acquired> {
    Ok(Acquired::new(ApiClient::new(&env.config, &env.log)?))
}

async fn anonymous_api_client(_: HarnessEnv, deps: FixtureDeps) -> SiteResult<Acquired> {
    let client = deps.get::<ApiClient>(API)?.detached();
    Ok(Acquired::new(client))
}

async fn admin_api_client(env: HarnessEnv, deps: FixtureDeps) -> SiteResult<Acquired> {
    let client = deps.get::<ApiClient>(API)?.detached();
    match env.config.credentials(Role::Admin) {
        Some(credentials) => {
            if let Err(e) = client.login(credentials).await {
                env.log.warn(format!("{}: {e}", messages::API_LOGIN_FAILED));
            }
        }
        None => env.log.warn(format!(
            "{}: {}",
            messages::API_LOGIN_FAILED,
            messages::CREDENTIALS_MISSING
        )),
    }
    let held = client.clone();
    let log = env.log.clone();
    Ok(Acquired::new(client).with_release(move || async move {
        if held.is_authenticated() {
            if let Err(e) = held.logout().await {
                log.warn(format!("{}: {e}", messages::API_LOGOUT_FAILED));
            }
        }
        Ok(())
    }))
}

fn bind<F, Fut>(env: &HarnessEnv, factory: F) -> impl Fn(FixtureDeps) -> Fut + Send + Sync + 'static
where
    F: Fn(HarnessEnv, FixtureDeps) -> Fut + Send + Sync + 'static,
{
    let env = env.clone();
    move |deps| factory(env.clone(), deps)
}

fn page_object<P: Send + Sync + 'static>(
    env: &HarnessEnv,
    from: &'static str,
    name: &'static str,
    make: fn(BasePage) -> P,
) -> impl Fn(FixtureDeps) -> Ready<SiteResult<Acquired>> + Send + Sync + 'static {
    let env = env.clone();
    move |deps| {
        ready(deps.get::<PageFixture>(from).map(|fixture| {
            let base = BasePage::new(fixture.page(), Arc::clone(&env.config), &env.log, name);
            Acquired::new(make(base))
        }))
    }
}

/// Fixture graph for `universe`
pub fn standard_graph(universe: Universe, env: &HarnessEnv) -> SiteResult<FixtureGraph> {
    let builder = FixtureGraph::builder(&env.log);
    let builder = match universe {
        Universe::Authenticated => builder
            .define(PAGE, &[], bind(env, seeded_page))
            .define(ADMIN_PAGE, &[PAGE], bind(env, verified_admin_page))
            .define(GUEST_PAGE, &[], bind(env, fresh_page))
            .define(API, &[], bind(env, api))
            .define(API_CLIENT, &[API], bind(env, admin_api_client))
            .define(HOME_PAGE, &[PAGE], page_object(env, PAGE, "home", HomePage::new))
            .define(BLOG_PAGE, &[PAGE], page_object(env, PAGE, "blog", BlogPage::new))
            .define(
                ADMIN_LOGIN_PAGE,
                &[GUEST_PAGE],
                page_object(env, GUEST_PAGE, "admin-login", AdminLoginPage::new),
            )
            .define(
                ADMIN_DASHBOARD_PAGE,
                &[ADMIN_PAGE],
                page_object(env, ADMIN_PAGE, "admin-dashboard", AdminDashboardPage::new),
            ),
        Universe::Guest => builder
            .define(PAGE, &[], bind(env, fresh_page))
            .define(HOME_PAGE, &[PAGE], page_object(env, PAGE, "home", HomePage::new))
            .define(BLOG_PAGE, &[PAGE], page_object(env, PAGE, "blog", BlogPage::new))
            .define(
                ADMIN_LOGIN_PAGE,
                &[PAGE],
                page_object(env, PAGE, "admin-login", AdminLoginPage::new),
            ),
        Universe::ApiOnly => builder
            .define(API, &[], bind(env, api))
            .define(API_CLIENT, &[API], bind(env, anonymous_api_client)),
    };
    builder.build()
}
