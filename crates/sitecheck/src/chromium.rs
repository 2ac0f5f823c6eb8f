//! Chromium driver over the DevTools protocol.
//!
//! Element work is done by evaluating [`Locator::to_js`] in the page, so a
//! locator resolves the same way here as it is described everywhere else.
//! Each [`ContextDriver`] is a separate CDP browser context: cookies and
//! local storage never leak between them.

use crate::driver::{
    BrowserDriver, ContextDriver, ContextOptions, DialogEvent, DialogGuard, DialogKind,
    DialogResponse, ElementSnapshot, LaunchOptions, PageDriver, Viewport,
};
use crate::locator::Locator;
use crate::result::{SiteError, SiteResult};
use crate::session::{Cookie, LocalStorageItem, OriginState, SameSite, StorageState};
use crate::wait::LoadState;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie as CdpCookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, DialogType, EventJavascriptDialogOpening,
    HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::browser_protocol::storage::{GetCookiesParams, SetCookiesParams};
use chromiumoxide::cdp::browser_protocol::target::{
    BrowserContextId, CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::page::{Page as CdpPage, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const NETWORK_QUIET: Duration = Duration::from_millis(500);

fn page_err(e: impl Display) -> SiteError {
    SiteError::page(e.to_string())
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Chromium launched over CDP
pub struct ChromiumBrowser {
    inner: Arc<tokio::sync::Mutex<CdpBrowser>>,
    handler: JoinHandle<()>,
    viewport: Viewport,
}

impl std::fmt::Debug for ChromiumBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumBrowser")
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

impl ChromiumBrowser {
    /// Launch a browser
    ///
    /// # Errors
    ///
    /// Returns error if the executable cannot be found or does not come up
    /// within the launch timeout
    pub async fn launch(options: LaunchOptions) -> SiteResult<Self> {
        let mut builder = CdpConfig::builder()
            .window_size(options.viewport.width, options.viewport.height)
            .request_timeout(options.launch_timeout)
            .launch_timeout(options.launch_timeout);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|message| SiteError::BrowserLaunch { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(config)
                .await
                .map_err(|e| SiteError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        tracing::debug!(headless = options.headless, "chromium launched");

        Ok(Self {
            inner: Arc::new(tokio::sync::Mutex::new(browser)),
            handler,
            viewport: options.viewport,
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumBrowser {
    async fn new_context(&self, options: ContextOptions) -> SiteResult<Arc<dyn ContextDriver>> {
        let id = {
            let mut browser = self.inner.lock().await;
            browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await
                .map_err(page_err)?
        };
        let context = ChromiumContext {
            browser: Arc::clone(&self.inner),
            id,
            viewport: options.viewport.unwrap_or(self.viewport),
            seed_script: options.storage_state.as_ref().and_then(local_storage_script),
            pages: Mutex::new(Vec::new()),
        };
        if let Some(state) = &options.storage_state {
            context.seed_cookies(&state.cookies).await?;
        }
        Ok(Arc::new(context))
    }

    async fn close(&self) -> SiteResult<()> {
        let mut browser = self.inner.lock().await;
        let result = browser.close().await.map(|_| ()).map_err(page_err);
        self.handler.abort();
        result
    }
}

fn local_storage_script(state: &StorageState) -> Option<String> {
    let origins: Vec<&OriginState> = state
        .origins
        .iter()
        .filter(|o| !o.local_storage.is_empty())
        .collect();
    if origins.is_empty() {
        return None;
    }
    let seed: serde_json::Map<String, serde_json::Value> = origins
        .iter()
        .map(|o| {
            let items = o
                .local_storage
                .iter()
                .map(|i| serde_json::json!([i.name, i.value]))
                .collect();
            (o.origin.clone(), serde_json::Value::Array(items))
        })
        .collect();
    Some(format!(
        "(() => {{ const seed = {}; const items = seed[location.origin]; \
         if (!items || sessionStorage.getItem('__sitecheck_seeded')) return; \
         for (const [k, v] of items) localStorage.setItem(k, v); \
         sessionStorage.setItem('__sitecheck_seeded', '1'); }})()",
        serde_json::Value::Object(seed)
    ))
}

const fn to_cdp_same_site(same_site: SameSite) -> CookieSameSite {
    match same_site {
        SameSite::Strict => CookieSameSite::Strict,
        SameSite::Lax => CookieSameSite::Lax,
        SameSite::None => CookieSameSite::None,
    }
}

fn to_cookie_param(cookie: &Cookie) -> CookieParam {
    let mut param = CookieParam::new(cookie.name.clone(), cookie.value.clone());
    param.domain = Some(cookie.domain.clone());
    param.path = Some(cookie.path.clone());
    param.secure = Some(cookie.secure);
    param.http_only = Some(cookie.http_only);
    param.same_site = cookie.same_site.map(to_cdp_same_site);
    if cookie.expires > 0.0 {
        param.expires = Some(TimeSinceEpoch::new(cookie.expires));
    }
    param
}

fn from_cdp_cookie(cookie: CdpCookie) -> Cookie {
    Cookie {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires: if cookie.session { -1.0 } else { cookie.expires },
        http_only: cookie.http_only,
        secure: cookie.secure,
        same_site: cookie.same_site.map(|s| match s {
            CookieSameSite::Strict => SameSite::Strict,
            CookieSameSite::None => SameSite::None,
            _ => SameSite::Lax,
        }),
    }
}

struct ChromiumContext {
    browser: Arc<tokio::sync::Mutex<CdpBrowser>>,
    id: BrowserContextId,
    viewport: Viewport,
    seed_script: Option<String>,
    pages: Mutex<Vec<CdpPage>>,
}

impl ChromiumContext {
    async fn seed_cookies(&self, cookies: &[Cookie]) -> SiteResult<()> {
        if cookies.is_empty() {
            return Ok(());
        }
        let mut params = SetCookiesParams::new(cookies.iter().map(to_cookie_param).collect());
        params.browser_context_id = Some(self.id.clone());
        let browser = self.browser.lock().await;
        browser.execute(params).await.map_err(page_err)?;
        Ok(())
    }

    fn open_pages(&self) -> Vec<CdpPage> {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Deserialize)]
struct PageStorage {
    origin: String,
    items: Vec<(String, String)>,
}

#[async_trait]
impl ContextDriver for ChromiumContext {
    async fn new_page(&self) -> SiteResult<Arc<dyn PageDriver>> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.id.clone())
            .build()
            .map_err(SiteError::page)?;
        let page = {
            let browser = self.browser.lock().await;
            browser.new_page(params).await.map_err(page_err)?
        };
        if let Some(script) = &self.seed_script {
            page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
                script.clone(),
            ))
            .await
            .map_err(page_err)?;
        }
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(page.clone());

        let driver = ChromiumPage {
            page,
            viewport: Mutex::new(self.viewport),
        };
        driver.apply_viewport(self.viewport).await?;
        Ok(Arc::new(driver))
    }

    async fn storage_state(&self) -> SiteResult<StorageState> {
        let mut params = GetCookiesParams::default();
        params.browser_context_id = Some(self.id.clone());
        let cookies = {
            let browser = self.browser.lock().await;
            browser.execute(params).await.map_err(page_err)?.result.cookies
        };

        let mut origins: Vec<OriginState> = Vec::new();
        for page in self.open_pages() {
            let dump = page
                .evaluate(
                    "(() => ({ origin: location.origin, \
                     items: location.origin.startsWith('http') ? Object.entries(localStorage) : [] }))()",
                )
                .await
                .map_err(page_err)?;
            let storage: PageStorage = dump.into_value().map_err(page_err)?;
            if storage.items.is_empty() || origins.iter().any(|o| o.origin == storage.origin) {
                continue;
            }
            origins.push(OriginState {
                origin: storage.origin,
                local_storage: storage
                    .items
                    .into_iter()
                    .map(|(name, value)| LocalStorageItem { name, value })
                    .collect(),
            });
        }

        Ok(StorageState {
            cookies: cookies.into_iter().map(from_cdp_cookie).collect(),
            origins,
        })
    }

    async fn close(&self) -> SiteResult<()> {
        let pages = std::mem::take(&mut *self.pages.lock().unwrap_or_else(PoisonError::into_inner));
        for page in pages {
            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "page already closed");
            }
        }
        let browser = self.browser.lock().await;
        browser
            .dispose_browser_context(self.id.clone())
            .await
            .map_err(page_err)
    }
}

#[derive(Deserialize)]
struct Snapshot {
    count: usize,
    visible: bool,
    enabled: bool,
    checked: bool,
    text: Option<String>,
    value: Option<String>,
}

impl From<Snapshot> for ElementSnapshot {
    fn from(s: Snapshot) -> Self {
        Self {
            count: s.count,
            visible: s.visible,
            enabled: s.enabled,
            checked: s.checked,
            text: s.text,
            value: s.value,
        }
    }
}

struct ChromiumPage {
    page: CdpPage,
    viewport: Mutex<Viewport>,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, expression: String) -> SiteResult<T> {
        let result = self.page.evaluate(expression).await.map_err(page_err)?;
        result.into_value().map_err(page_err)
    }

    /// Run `body` against the first match; `el` is bound in `body`
    async fn on_first<T: DeserializeOwned>(&self, locator: &Locator, body: &str) -> SiteResult<T> {
        let found: Option<T> = self
            .eval(format!(
                "(() => {{ const el = ({})[0]; if (!el) return null; {body} }})()",
                locator.to_js()
            ))
            .await?;
        found.ok_or_else(|| SiteError::ElementNotFound {
            selector: locator.to_string(),
        })
    }

    async fn apply_viewport(&self, viewport: Viewport) -> SiteResult<()> {
        let params = SetDeviceMetricsOverrideParams::new(
            i64::from(viewport.width),
            i64::from(viewport.height),
            1.0,
            false,
        );
        self.page.execute(params).await.map_err(page_err)?;
        *self.viewport.lock().unwrap_or_else(PoisonError::into_inner) = viewport;
        Ok(())
    }

    async fn history(&self, step: i32, timeout: Duration) -> SiteResult<()> {
        let _: bool = self
            .eval(format!("(() => {{ history.go({step}); return true; }})()"))
            .await?;
        tokio::time::sleep(POLL_INTERVAL).await;
        self.wait_for_load_state(LoadState::Load, timeout).await
    }

    async fn ready(&self, state: LoadState) -> SiteResult<bool> {
        let condition = match state {
            LoadState::DomContentLoaded => "document.readyState !== 'loading'",
            LoadState::Load | LoadState::NetworkIdle => "document.readyState === 'complete'",
        };
        self.eval(format!("(() => {condition})()")).await
    }

    async fn resource_count(&self) -> SiteResult<usize> {
        self.eval("(() => performance.getEntriesByType('resource').length)()".to_string())
            .await
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> SiteResult<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(SiteError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(SiteError::timeout(format!("navigation to {url}"), timeout)),
        }
    }

    async fn reload(&self, timeout: Duration) -> SiteResult<()> {
        match tokio::time::timeout(timeout, self.page.reload()).await {
            Ok(result) => result.map(|_| ()).map_err(page_err),
            Err(_) => Err(SiteError::timeout("reload", timeout)),
        }
    }

    async fn go_back(&self, timeout: Duration) -> SiteResult<()> {
        self.history(-1, timeout).await
    }

    async fn go_forward(&self, timeout: Duration) -> SiteResult<()> {
        self.history(1, timeout).await
    }

    async fn url(&self) -> SiteResult<String> {
        Ok(self.page.url().await.map_err(page_err)?.unwrap_or_default())
    }

    async fn title(&self) -> SiteResult<String> {
        Ok(self
            .page
            .get_title()
            .await
            .map_err(page_err)?
            .unwrap_or_default())
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> SiteResult<()> {
        let wait = async {
            while !self.ready(state).await? {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            if state == LoadState::NetworkIdle {
                let mut seen = self.resource_count().await?;
                loop {
                    tokio::time::sleep(NETWORK_QUIET).await;
                    let now = self.resource_count().await?;
                    if now == seen {
                        break;
                    }
                    seen = now;
                }
            }
            Ok(())
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SiteError::timeout(format!("load state {state}"), timeout))?
    }

    async fn query(&self, locator: &Locator) -> SiteResult<ElementSnapshot> {
        let snapshot: Snapshot = self
            .eval(format!(
                "(() => {{ const els = {}; const el = els[0]; \
                 if (!el) return {{ count: 0, visible: false, enabled: false, checked: false, text: null, value: null }}; \
                 const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
                 return {{ count: els.length, \
                   visible: r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none', \
                   enabled: !el.disabled, checked: !!el.checked, \
                   text: el.textContent, value: ('value' in el) ? String(el.value) : null }}; }})()",
                locator.to_js()
            ))
            .await?;
        Ok(snapshot.into())
    }

    async fn scroll_into_view(&self, locator: &Locator) -> SiteResult<()> {
        self.on_first::<bool>(locator, "el.scrollIntoView({ block: 'center' }); return true;")
            .await
            .map(|_| ())
    }

    async fn click(&self, locator: &Locator) -> SiteResult<()> {
        self.on_first::<bool>(locator, "el.click(); return true;")
            .await
            .map(|_| ())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> SiteResult<()> {
        let body = format!(
            "el.focus(); el.value = {}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true;",
            js_string(value)
        );
        self.on_first::<bool>(locator, &body).await.map(|_| ())
    }

    async fn clear(&self, locator: &Locator) -> SiteResult<()> {
        self.fill(locator, "").await
    }

    async fn type_text(&self, locator: &Locator, text: &str, delay: Duration) -> SiteResult<()> {
        for ch in text.chars() {
            let body = format!(
                "el.focus(); el.value += {}; \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); return true;",
                js_string(&ch.to_string())
            );
            self.on_first::<bool>(locator, &body).await?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        let _: bool = self
            .on_first(
                locator,
                "el.dispatchEvent(new Event('change', { bubbles: true })); return true;",
            )
            .await?;
        Ok(())
    }

    async fn select_options(&self, locator: &Locator, values: &[String]) -> SiteResult<Vec<String>> {
        let wanted = serde_json::to_string(values)?;
        let body = format!(
            "const wanted = {wanted}; \
             for (const o of el.options || []) o.selected = wanted.includes(o.value) || wanted.includes(o.label); \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return Array.from(el.options || []).filter(o => o.selected).map(o => o.value);"
        );
        self.on_first(locator, &body).await
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> SiteResult<Option<String>> {
        let body = format!("return [el.getAttribute({})];", js_string(name));
        let [value]: [Option<String>; 1] = self.on_first(locator, &body).await?;
        Ok(value)
    }

    async fn viewport(&self) -> SiteResult<Viewport> {
        Ok(*self.viewport.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn set_viewport(&self, viewport: Viewport) -> SiteResult<()> {
        self.apply_viewport(viewport).await
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> SiteResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(full_page).build(), path)
            .await
            .map_err(page_err)?;
        Ok(())
    }

    async fn arm_dialog(&self, response: DialogResponse) -> SiteResult<DialogGuard> {
        let mut events = self
            .page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(page_err)?;
        let (mut tx, guard) = DialogGuard::channel();
        let page = self.page.clone();

        tokio::spawn(async move {
            let next = tokio::select! {
                () = tx.closed() => return,
                next = events.next() => next,
            };
            let Some(opened) = next else { return };

            let mut params = HandleJavaScriptDialogParams::new(response.accepts());
            params.prompt_text = response.prompt_text().map(str::to_string);
            if let Err(e) = page.execute(params).await {
                tracing::warn!(error = %e, "failed to answer dialog");
                return;
            }
            let kind = match opened.r#type {
                DialogType::Alert => DialogKind::Alert,
                DialogType::Confirm => DialogKind::Confirm,
                DialogType::Prompt => DialogKind::Prompt,
                DialogType::Beforeunload => DialogKind::BeforeUnload,
            };
            let _ = tx.send(DialogEvent {
                kind,
                message: opened.message.clone(),
                response,
            });
        });
        Ok(guard)
    }

    async fn close(&self) -> SiteResult<()> {
        self.page.clone().close().await.map_err(page_err)
    }
}
