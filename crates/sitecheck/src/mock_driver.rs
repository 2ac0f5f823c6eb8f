//! In-memory browser for tests.
//!
//! A [`MockSite`] models the application under test: pages with elements,
//! protected routes that bounce to the login route without a valid session
//! cookie, and a login form that issues one. [`MockBrowser`] opens isolated
//! contexts against it. All state sits behind `std::sync::Mutex` and no lock
//! is held across an `.await`.

use crate::config::{Credentials, ProtectedPaths};
use crate::driver::{
    BrowserDriver, ContextDriver, ContextOptions, DialogEvent, DialogGuard, DialogKind,
    DialogResponse, ElementSnapshot, PageDriver, Viewport,
};
use crate::locator::{Locator, Selector};
use crate::pages::{AdminDashboardPage, AdminLoginPage, BlogPage, HomePage, PostId};
use crate::result::{SiteError, SiteResult};
use crate::session::{Cookie, LocalStorageItem, OriginState, StorageState};
use crate::wait::LoadState;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use url::Url;

/// Cookie carrying the mock session token
pub const SESSION_COOKIE: &str = "sid";
/// Local storage key the mock login writes
pub const AUTH_STORAGE_KEY: &str = "auth_token";

const BLANK: &str = "about:blank";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn closed_error() -> SiteError {
    SiteError::page("Target page, context or browser has been closed")
}

/// How an input rewrites what is typed into it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueTransform {
    /// Keep as typed
    #[default]
    Identity,
    /// Force lowercase
    Lowercase,
    /// Force uppercase
    Uppercase,
    /// Keep at most n characters
    Truncate(usize),
    /// Refuse all input
    Reject,
}

impl ValueTransform {
    fn apply(self, input: &str) -> String {
        match self {
            Self::Identity => input.to_string(),
            Self::Lowercase => input.to_lowercase(),
            Self::Uppercase => input.to_uppercase(),
            Self::Truncate(n) => input.chars().take(n).collect(),
            Self::Reject => String::new(),
        }
    }
}

/// What clicking an element does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickEffect {
    /// Navigate to a path
    Navigate(String),
    /// Read the two fields and log in
    SubmitLogin {
        /// Email field
        email: Locator,
        /// Password field
        password: Locator,
        /// Element revealed on bad credentials
        error: Option<Locator>,
    },
    /// Open a native dialog
    OpenDialog {
        /// Kind
        kind: DialogKind,
        /// Message
        message: String,
    },
    /// Drop the session and go to the login route
    Logout,
    /// Make another element visible
    Reveal(Locator),
}

/// Element template
#[derive(Debug, Clone)]
pub struct MockElement {
    keys: Vec<Selector>,
    scopes: Vec<Selector>,
    visible: bool,
    enabled: bool,
    checked: bool,
    text: Option<String>,
    value: Option<String>,
    options: Vec<String>,
    attributes: BTreeMap<String, String>,
    transform: ValueTransform,
    fail_clicks: u32,
    reveal_after: Option<Duration>,
    click_delay: Duration,
    on_click: Option<ClickEffect>,
}

impl MockElement {
    /// Visible, enabled element found by `selector`
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            keys: vec![selector],
            scopes: Vec::new(),
            visible: true,
            enabled: true,
            checked: false,
            text: None,
            value: None,
            options: Vec::new(),
            attributes: BTreeMap::new(),
            transform: ValueTransform::Identity,
            fail_clicks: 0,
            reveal_after: None,
            click_delay: Duration::ZERO,
            on_click: None,
        }
    }

    /// Element found by every selector of `locator`, scoped like it
    #[must_use]
    pub fn matching(locator: &Locator) -> Self {
        let mut element = Self::new(locator.selector().clone());
        element.keys = locator.selectors().cloned().collect();
        if let Some(parent) = locator.parent() {
            element.scopes = parent.selectors().cloned().collect();
        }
        element
    }

    /// Also found by `selector`
    #[must_use]
    pub fn also(mut self, selector: Selector) -> Self {
        self.keys.push(selector);
        self
    }

    /// Nested under elements found by `parent`
    #[must_use]
    pub fn within(mut self, parent: &Locator) -> Self {
        self.scopes.extend(parent.selectors().cloned());
        self
    }

    /// Text content
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Make this a form input with an initial value
    #[must_use]
    pub fn input(mut self, initial: impl Into<String>) -> Self {
        self.value = Some(initial.into());
        self
    }

    /// Not visible
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Not enabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Checked
    #[must_use]
    pub const fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    /// Make this a `<select>` with the given options
    #[must_use]
    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| (*o).to_string()).collect();
        self.value = Some(String::new());
        self
    }

    /// Attribute
    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Input rewrites typed values
    #[must_use]
    pub const fn transform(mut self, transform: ValueTransform) -> Self {
        self.transform = transform;
        self
    }

    /// First `n` clicks fail as intercepted
    #[must_use]
    pub const fn fail_clicks(mut self, n: u32) -> Self {
        self.fail_clicks = n;
        self
    }

    /// Hidden until `delay` after the page loads
    #[must_use]
    pub const fn reveal_after(mut self, delay: Duration) -> Self {
        self.visible = false;
        self.reveal_after = Some(delay);
        self
    }

    /// Clicks take `delay` to complete
    #[must_use]
    pub const fn slow_click(mut self, delay: Duration) -> Self {
        self.click_delay = delay;
        self
    }

    /// Click behavior
    #[must_use]
    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = Some(effect);
        self
    }
}

/// Page template
#[derive(Debug, Clone)]
pub struct MockPage {
    title: String,
    elements: Vec<MockElement>,
    network_idle: bool,
    ready: bool,
}

impl MockPage {
    /// Empty, fully loaded page
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            elements: Vec::new(),
            network_idle: true,
            ready: true,
        }
    }

    /// Add an element
    #[must_use]
    pub fn element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Network never goes idle
    #[must_use]
    pub const fn never_idle(mut self) -> Self {
        self.network_idle = false;
        self
    }

    /// Document never reaches `complete`
    #[must_use]
    pub const fn never_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    fn not_found() -> Self {
        Self::new("404 Not Found")
    }
}

#[derive(Debug)]
struct SiteState {
    origin: Url,
    pages: HashMap<String, MockPage>,
    protected: Vec<String>,
    login_path: String,
    dashboard_path: String,
    accounts: Vec<Credentials>,
    issued: HashSet<String>,
    counters: HashMap<String, u32>,
    click_attempts: HashMap<String, u32>,
    navigations: Vec<String>,
}

/// The application under test, shared by every context of a [`MockBrowser`]
#[derive(Debug, Clone)]
pub struct MockSite {
    inner: Arc<Mutex<SiteState>>,
}

impl MockSite {
    /// Empty site at `origin`
    pub fn new(origin: &str) -> SiteResult<Self> {
        let defaults = ProtectedPaths::default();
        Ok(Self {
            inner: Arc::new(Mutex::new(SiteState {
                origin: Url::parse(origin)?,
                pages: HashMap::new(),
                protected: Vec::new(),
                login_path: defaults.login,
                dashboard_path: defaults.dashboard,
                accounts: Vec::new(),
                issued: HashSet::new(),
                counters: HashMap::new(),
                click_attempts: HashMap::new(),
                navigations: Vec::new(),
            })),
        })
    }

    /// Blog application with home, blog list, admin login and dashboard.
    ///
    /// Everything under `/admin` except the login route needs a session.
    pub fn blog_app(origin: &str, paths: &ProtectedPaths, admin: &Credentials) -> SiteResult<Self> {
        let email = AdminLoginPage::email_field();
        let password = AdminLoginPage::password_field();
        let error = AdminLoginPage::error_message();

        let login = MockPage::new("Admin Login")
            .element(MockElement::matching(&AdminLoginPage::heading()).text("Admin Login"))
            .element(MockElement::matching(&email).input(""))
            .element(MockElement::matching(&password).input(""))
            .element(
                MockElement::matching(&AdminLoginPage::submit_button())
                    .text("Sign in")
                    .on_click(ClickEffect::SubmitLogin {
                        email,
                        password,
                        error: Some(error.clone()),
                    }),
            )
            .element(MockElement::matching(&error).text("Invalid credentials").hidden());

        let dashboard = MockPage::new("Dashboard")
            .element(MockElement::matching(&AdminDashboardPage::heading()).text("Dashboard"))
            .element(MockElement::matching(&AdminDashboardPage::posts_stat()).text("2"))
            .element(
                MockElement::matching(&AdminDashboardPage::logout_button())
                    .text("Logout")
                    .on_click(ClickEffect::Logout),
            );

        let home = MockPage::new("Home")
            .element(MockElement::matching(&HomePage::hero()).text("Welcome"))
            .element(
                MockElement::matching(&HomePage::blog_link())
                    .text("Blog")
                    .on_click(ClickEffect::Navigate("/blog".to_string())),
            );

        let mut blog = MockPage::new("Blog")
            .element(MockElement::matching(&BlogPage::heading()).text("Blog"))
            .element(MockElement::matching(&BlogPage::search_field()).input(""));
        for (id, title) in [(1, "Hello World"), (2, "Second Post")] {
            let post = PostId(id);
            blog = blog
                .element(
                    MockElement::matching(&BlogPage::ROWS.at(&post))
                        .also(BlogPage::ROWS.all().selector().clone())
                        .text(title),
                )
                .element(
                    MockElement::matching(&BlogPage::delete_button(&post))
                        .text("Delete")
                        .on_click(ClickEffect::OpenDialog {
                            kind: DialogKind::Confirm,
                            message: format!("Delete \"{title}\"?"),
                        }),
                );
        }

        let site = Self::new(origin)?
            .page("/", home)
            .page("/blog", blog)
            .page(&paths.login, login)
            .page(&paths.dashboard, dashboard)
            .protect("/admin")
            .routes(paths);
        site.add_account(admin.clone());
        Ok(site)
    }

    /// Register a page template at `path`
    #[must_use]
    pub fn page(self, path: &str, page: MockPage) -> Self {
        lock(&self.inner).pages.insert(path.to_string(), page);
        self
    }

    /// Require a session for every path starting with `prefix`
    #[must_use]
    pub fn protect(self, prefix: &str) -> Self {
        lock(&self.inner).protected.push(prefix.to_string());
        self
    }

    /// Use these login and dashboard routes
    #[must_use]
    pub fn routes(self, paths: &ProtectedPaths) -> Self {
        {
            let mut state = lock(&self.inner);
            state.login_path.clone_from(&paths.login);
            state.dashboard_path.clone_from(&paths.dashboard);
        }
        self
    }

    /// Accept these credentials at the login form
    pub fn add_account(&self, credentials: Credentials) {
        lock(&self.inner).accounts.push(credentials);
    }

    /// Expire every issued session
    pub fn revoke_sessions(&self) {
        lock(&self.inner).issued.clear();
    }

    /// Times the named operation ran (`goto`, `click`, `context.open`, ...)
    #[must_use]
    pub fn count(&self, op: &str) -> u32 {
        lock(&self.inner).counters.get(op).copied().unwrap_or(0)
    }

    /// Click attempts against a locator
    #[must_use]
    pub fn click_attempts(&self, locator: &Locator) -> u32 {
        lock(&self.inner)
            .click_attempts
            .get(&locator.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Final URLs of all navigations, in order
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        lock(&self.inner).navigations.clone()
    }

    /// Contexts opened and not yet closed
    #[must_use]
    pub fn open_contexts(&self) -> u32 {
        self.count("context.open")
            .saturating_sub(self.count("context.close"))
    }

    /// Origin as `scheme://host:port`
    #[must_use]
    pub fn origin(&self) -> String {
        lock(&self.inner).origin.origin().ascii_serialization()
    }

    fn bump(&self, op: &str) {
        *lock(&self.inner).counters.entry(op.to_string()).or_insert(0) += 1;
    }

    fn record_click(&self, locator: &Locator) {
        *lock(&self.inner)
            .click_attempts
            .entry(locator.to_string())
            .or_insert(0) += 1;
    }

    fn resolve_url(&self, raw: &str) -> SiteResult<Url> {
        let state = lock(&self.inner);
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => state.origin.join(raw)?,
            Err(e) => return Err(e.into()),
        };
        if url.origin() != state.origin.origin() {
            return Err(SiteError::Navigation {
                url: raw.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        Ok(url)
    }

    fn session_valid(&self, cookies: &[Cookie]) -> bool {
        let state = lock(&self.inner);
        cookies
            .iter()
            .any(|c| c.name == SESSION_COOKIE && state.issued.contains(&c.value))
    }

    /// Resolve a navigation, applying the login redirect
    fn load(&self, target: &Url, authenticated: bool) -> SiteResult<(String, MockPage)> {
        let mut state = lock(&self.inner);
        let path = target.path().to_string();
        let protected = path != state.login_path
            && state.protected.iter().any(|prefix| path.starts_with(prefix.as_str()));
        let (url, path) = if protected && !authenticated {
            let login = state.login_path.clone();
            (state.origin.join(&login)?, login)
        } else {
            (target.clone(), path)
        };
        let page = state
            .pages
            .get(&path)
            .cloned()
            .unwrap_or_else(MockPage::not_found);
        state.navigations.push(url.to_string());
        Ok((url.to_string(), page))
    }

    fn authenticate(&self, email: &str, password: &str) -> Option<String> {
        let mut state = lock(&self.inner);
        let known = state
            .accounts
            .iter()
            .any(|a| a.email == email && a.password == password);
        if !known {
            return None;
        }
        let token = uuid::Uuid::new_v4().simple().to_string();
        state.issued.insert(token.clone());
        Some(token)
    }

    fn paths(&self) -> (String, String) {
        let state = lock(&self.inner);
        (state.login_path.clone(), state.dashboard_path.clone())
    }

    fn host(&self) -> String {
        lock(&self.inner)
            .origin
            .host_str()
            .unwrap_or("localhost")
            .to_string()
    }
}

/// Browser whose contexts all talk to one [`MockSite`]
#[derive(Debug, Clone)]
pub struct MockBrowser {
    site: MockSite,
    closed: Arc<AtomicBool>,
}

impl MockBrowser {
    /// Browser for `site`
    #[must_use]
    pub fn new(site: MockSite) -> Self {
        Self {
            site,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The site this browser talks to
    #[must_use]
    pub const fn site(&self) -> &MockSite {
        &self.site
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn new_context(&self, options: ContextOptions) -> SiteResult<Arc<dyn ContextDriver>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(closed_error());
        }
        self.site.bump("context.open");
        let mut state = ContextState {
            cookies: Vec::new(),
            storage: BTreeMap::new(),
            viewport: options.viewport.unwrap_or_default(),
            closed: false,
        };
        if let Some(seed) = options.storage_state {
            state.cookies = seed.cookies;
            for origin in seed.origins {
                state.storage.insert(origin.origin, origin.local_storage);
            }
        }
        Ok(Arc::new(MockContext {
            site: self.site.clone(),
            state: Arc::new(Mutex::new(state)),
        }))
    }

    async fn close(&self) -> SiteResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
struct ContextState {
    cookies: Vec<Cookie>,
    storage: BTreeMap<String, Vec<LocalStorageItem>>,
    viewport: Viewport,
    closed: bool,
}

/// Isolated cookie and storage jar
#[derive(Debug)]
pub struct MockContext {
    site: MockSite,
    state: Arc<Mutex<ContextState>>,
}

#[async_trait]
impl ContextDriver for MockContext {
    async fn new_page(&self) -> SiteResult<Arc<dyn PageDriver>> {
        let viewport = {
            let state = lock(&self.state);
            if state.closed {
                return Err(closed_error());
            }
            state.viewport
        };
        self.site.bump("page.open");
        Ok(Arc::new(MockPageDriver {
            site: self.site.clone(),
            context: Arc::clone(&self.state),
            doc: Mutex::new(PageDoc::blank(viewport)),
        }))
    }

    async fn storage_state(&self) -> SiteResult<StorageState> {
        let state = lock(&self.state);
        if state.closed {
            return Err(closed_error());
        }
        Ok(StorageState {
            cookies: state.cookies.clone(),
            origins: state
                .storage
                .iter()
                .filter(|(_, items)| !items.is_empty())
                .map(|(origin, items)| OriginState {
                    origin: origin.clone(),
                    local_storage: items.clone(),
                })
                .collect(),
        })
    }

    async fn close(&self) -> SiteResult<()> {
        let was_open = {
            let mut state = lock(&self.state);
            !std::mem::replace(&mut state.closed, true)
        };
        if was_open {
            self.site.bump("context.close");
        }
        Ok(())
    }
}

#[derive(Debug)]
struct LiveElement {
    spec: MockElement,
    reveal_at: Option<Instant>,
}

impl LiveElement {
    fn visible_at(&self, now: Instant) -> bool {
        self.spec.visible || self.reveal_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug)]
struct PageDoc {
    url: String,
    title: String,
    elements: Vec<LiveElement>,
    network_idle: bool,
    ready: bool,
    history: Vec<String>,
    cursor: usize,
    dialog: Option<(DialogResponse, oneshot::Sender<DialogEvent>)>,
    viewport: Viewport,
    closed: bool,
}

impl PageDoc {
    fn blank(viewport: Viewport) -> Self {
        Self {
            url: BLANK.to_string(),
            title: String::new(),
            elements: Vec::new(),
            network_idle: true,
            ready: true,
            history: vec![BLANK.to_string()],
            cursor: 0,
            dialog: None,
            viewport,
            closed: false,
        }
    }
}

fn in_scope(element: &LiveElement, parent: Option<&Locator>) -> bool {
    parent.map_or(true, |p| p.selectors().any(|s| element.spec.scopes.contains(s)))
}

/// Indices matched by `locator`, trying its selectors in priority order
fn resolve(elements: &[LiveElement], locator: &Locator) -> Vec<usize> {
    for selector in locator.selectors() {
        let hits: Vec<usize> = elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.spec.keys.contains(selector) && in_scope(e, locator.parent()))
            .map(|(i, _)| i)
            .collect();
        if !hits.is_empty() {
            return match locator.nth_index() {
                Some(n) => hits.get(n).copied().into_iter().collect(),
                None => hits,
            };
        }
    }
    Vec::new()
}

fn first_match(elements: &[LiveElement], locator: &Locator) -> SiteResult<usize> {
    resolve(elements, locator)
        .first()
        .copied()
        .ok_or_else(|| SiteError::ElementNotFound {
            selector: locator.to_string(),
        })
}

/// Page of a [`MockContext`]
#[derive(Debug)]
pub struct MockPageDriver {
    site: MockSite,
    context: Arc<Mutex<ContextState>>,
    doc: Mutex<PageDoc>,
}

impl MockPageDriver {
    fn ensure_open(&self) -> SiteResult<()> {
        if lock(&self.doc).closed || lock(&self.context).closed {
            return Err(closed_error());
        }
        Ok(())
    }

    fn has_session(&self) -> bool {
        let cookies = lock(&self.context).cookies.clone();
        self.site.session_valid(&cookies)
    }

    fn navigate(&self, raw: &str, push_history: bool) -> SiteResult<()> {
        self.ensure_open()?;
        if raw == BLANK {
            let viewport = lock(&self.doc).viewport;
            *lock(&self.doc) = PageDoc::blank(viewport);
            return Ok(());
        }
        let target = self.site.resolve_url(raw)?;
        let authenticated = self.has_session();
        let (url, page) = self.site.load(&target, authenticated)?;
        self.site.bump("goto");

        let now = Instant::now();
        let mut doc = lock(&self.doc);
        doc.url.clone_from(&url);
        doc.title = page.title;
        doc.network_idle = page.network_idle;
        doc.ready = page.ready;
        doc.elements = page
            .elements
            .into_iter()
            .map(|spec| LiveElement {
                reveal_at: spec.reveal_after.map(|d| now + d),
                spec,
            })
            .collect();
        if push_history {
            let keep = doc.cursor + 1;
            doc.history.truncate(keep);
            doc.history.push(url);
            doc.cursor = doc.history.len() - 1;
        }
        Ok(())
    }

    fn store_session(&self, token: &str) {
        let host = self.site.host();
        let origin = self.site.origin();
        let mut context = lock(&self.context);
        context.cookies.retain(|c| c.name != SESSION_COOKIE);
        context.cookies.push(Cookie::new(SESSION_COOKIE, token, host));
        context.storage.insert(
            origin,
            vec![LocalStorageItem {
                name: AUTH_STORAGE_KEY.to_string(),
                value: token.to_string(),
            }],
        );
    }

    fn clear_session(&self) {
        let origin = self.site.origin();
        let mut context = lock(&self.context);
        context.cookies.retain(|c| c.name != SESSION_COOKIE);
        context.storage.remove(&origin);
    }

    fn value_of(&self, locator: &Locator) -> String {
        let doc = lock(&self.doc);
        resolve(&doc.elements, locator)
            .first()
            .and_then(|&i| doc.elements[i].spec.value.clone())
            .unwrap_or_default()
    }

    fn reveal(&self, locator: &Locator) {
        let mut doc = lock(&self.doc);
        for i in resolve(&doc.elements, locator) {
            doc.elements[i].spec.visible = true;
        }
    }

    fn apply_effect(&self, effect: ClickEffect) -> SiteResult<()> {
        match effect {
            ClickEffect::Navigate(path) => self.navigate(&path, true),
            ClickEffect::SubmitLogin {
                email,
                password,
                error,
            } => {
                let email = self.value_of(&email);
                let password = self.value_of(&password);
                match self.site.authenticate(&email, &password) {
                    Some(token) => {
                        self.store_session(&token);
                        let (_, dashboard) = self.site.paths();
                        self.navigate(&dashboard, true)
                    }
                    None => {
                        if let Some(error) = error {
                            self.reveal(&error);
                        }
                        Ok(())
                    }
                }
            }
            ClickEffect::OpenDialog { kind, message } => {
                let armed = lock(&self.doc).dialog.take();
                match armed {
                    Some((response, tx)) if !tx.is_closed() => {
                        let _ = tx.send(DialogEvent {
                            kind,
                            message,
                            response,
                        });
                        self.site.bump("dialog.handled");
                    }
                    _ => self.site.bump("dialog.unhandled"),
                }
                Ok(())
            }
            ClickEffect::Logout => {
                self.clear_session();
                let (login, _) = self.site.paths();
                self.navigate(&login, true)
            }
            ClickEffect::Reveal(target) => {
                self.reveal(&target);
                Ok(())
            }
        }
    }

    /// Run `edit` on the first interactable input matched by `locator`
    fn edit_input<F>(&self, locator: &Locator, edit: F) -> SiteResult<()>
    where
        F: FnOnce(&str, ValueTransform) -> String,
    {
        self.ensure_open()?;
        let now = Instant::now();
        let mut doc = lock(&self.doc);
        let idx = first_match(&doc.elements, locator)?;
        let element = &mut doc.elements[idx];
        if !element.visible_at(now) {
            return Err(SiteError::page(format!("{locator} is not visible")));
        }
        if !element.spec.enabled {
            return Err(SiteError::page(format!("{locator} is disabled")));
        }
        let current = element
            .spec
            .value
            .as_deref()
            .ok_or_else(|| SiteError::page(format!("{locator} is not an input")))?;
        let next = edit(current, element.spec.transform);
        element.spec.value = Some(next);
        Ok(())
    }
}

#[async_trait]
impl PageDriver for MockPageDriver {
    async fn goto(&self, url: &str, _timeout: Duration) -> SiteResult<()> {
        self.navigate(url, true)
    }

    async fn reload(&self, _timeout: Duration) -> SiteResult<()> {
        let url = lock(&self.doc).url.clone();
        self.navigate(&url, false)
    }

    async fn go_back(&self, _timeout: Duration) -> SiteResult<()> {
        let url = {
            let mut doc = lock(&self.doc);
            if doc.cursor == 0 {
                return Ok(());
            }
            doc.cursor -= 1;
            doc.history[doc.cursor].clone()
        };
        self.navigate(&url, false)
    }

    async fn go_forward(&self, _timeout: Duration) -> SiteResult<()> {
        let url = {
            let mut doc = lock(&self.doc);
            if doc.cursor + 1 >= doc.history.len() {
                return Ok(());
            }
            doc.cursor += 1;
            doc.history[doc.cursor].clone()
        };
        self.navigate(&url, false)
    }

    async fn url(&self) -> SiteResult<String> {
        self.ensure_open()?;
        Ok(lock(&self.doc).url.clone())
    }

    async fn title(&self) -> SiteResult<String> {
        self.ensure_open()?;
        Ok(lock(&self.doc).title.clone())
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> SiteResult<()> {
        self.ensure_open()?;
        let reached = {
            let doc = lock(&self.doc);
            match state {
                LoadState::Load | LoadState::DomContentLoaded => doc.ready,
                LoadState::NetworkIdle => doc.network_idle,
            }
        };
        if reached {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(SiteError::timeout(format!("load state {state}"), timeout))
    }

    async fn query(&self, locator: &Locator) -> SiteResult<ElementSnapshot> {
        self.ensure_open()?;
        self.site.bump("query");
        let now = Instant::now();
        let doc = lock(&self.doc);
        let hits = resolve(&doc.elements, locator);
        let Some(&first) = hits.first() else {
            return Ok(ElementSnapshot::default());
        };
        let element = &doc.elements[first];
        Ok(ElementSnapshot {
            count: hits.len(),
            visible: element.visible_at(now),
            enabled: element.spec.enabled,
            checked: element.spec.checked,
            text: element.spec.text.clone(),
            value: element.spec.value.clone(),
        })
    }

    async fn scroll_into_view(&self, locator: &Locator) -> SiteResult<()> {
        self.ensure_open()?;
        self.site.bump("scroll");
        first_match(&lock(&self.doc).elements, locator).map(|_| ())
    }

    async fn click(&self, locator: &Locator) -> SiteResult<()> {
        self.ensure_open()?;
        self.site.bump("click");
        let (effect, delay) = {
            let now = Instant::now();
            let mut doc = lock(&self.doc);
            let idx = first_match(&doc.elements, locator)?;
            self.site.record_click(locator);
            let element = &mut doc.elements[idx];
            if !element.visible_at(now) {
                return Err(SiteError::page(format!("{locator} is not visible")));
            }
            if !element.spec.enabled {
                return Err(SiteError::page(format!("{locator} is disabled")));
            }
            if element.spec.fail_clicks > 0 {
                element.spec.fail_clicks -= 1;
                return Err(SiteError::page(format!(
                    "{locator} click intercepted by another element"
                )));
            }
            (element.spec.on_click.clone(), element.spec.click_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match effect {
            Some(effect) => self.apply_effect(effect),
            None => Ok(()),
        }
    }

    async fn fill(&self, locator: &Locator, value: &str) -> SiteResult<()> {
        self.site.bump("fill");
        self.edit_input(locator, |_, transform| transform.apply(value))
    }

    async fn clear(&self, locator: &Locator) -> SiteResult<()> {
        self.edit_input(locator, |_, _| String::new())
    }

    async fn type_text(&self, locator: &Locator, text: &str, delay: Duration) -> SiteResult<()> {
        self.site.bump("type");
        for ch in text.chars() {
            tokio::time::sleep(delay).await;
            self.edit_input(locator, |current, transform| {
                transform.apply(&format!("{current}{ch}"))
            })?;
        }
        Ok(())
    }

    async fn select_options(
        &self,
        locator: &Locator,
        values: &[String],
    ) -> SiteResult<Vec<String>> {
        self.ensure_open()?;
        let mut doc = lock(&self.doc);
        let idx = first_match(&doc.elements, locator)?;
        let element = &mut doc.elements[idx];
        if let Some(missing) = values.iter().find(|v| !element.spec.options.contains(v)) {
            return Err(SiteError::page(format!(
                "{locator} has no option {missing:?}"
            )));
        }
        element.spec.value = values.first().cloned();
        Ok(values.to_vec())
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> SiteResult<Option<String>> {
        self.ensure_open()?;
        let doc = lock(&self.doc);
        let idx = first_match(&doc.elements, locator)?;
        Ok(doc.elements[idx].spec.attributes.get(name).cloned())
    }

    async fn viewport(&self) -> SiteResult<Viewport> {
        self.ensure_open()?;
        Ok(lock(&self.doc).viewport)
    }

    async fn set_viewport(&self, viewport: Viewport) -> SiteResult<()> {
        self.ensure_open()?;
        lock(&self.doc).viewport = viewport;
        Ok(())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> SiteResult<()> {
        self.ensure_open()?;
        self.site.bump("screenshot");
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, PNG_MAGIC).await?;
        Ok(())
    }

    async fn arm_dialog(&self, response: DialogResponse) -> SiteResult<DialogGuard> {
        self.ensure_open()?;
        let (tx, guard) = DialogGuard::channel();
        lock(&self.doc).dialog = Some((response, tx));
        Ok(guard)
    }

    async fn close(&self) -> SiteResult<()> {
        lock(&self.doc).closed = true;
        self.site.bump("page.close");
        Ok(())
    }
}
