//! Browser driver seam.
//!
//! ```text
//! BrowserDriver ──new_context──► ContextDriver ──new_page──► PageDriver
//!      │                              │                          │
//!  MockBrowser                 storage_state()           goto / query / click
//!  ChromiumBrowser (feature)   close()                   fill / arm_dialog ...
//! ```
//!
//! Pages, actions and the auth pipeline only see these traits, so the same
//! code runs against the in-memory [`crate::mock_driver::MockBrowser`] and a
//! real Chromium.

use crate::locator::Locator;
use crate::result::{SiteError, SiteResult};
use crate::session::StorageState;
use crate::wait::LoadState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// Browser launch settings
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run without a window
    pub headless: bool,
    /// Initial viewport
    pub viewport: Viewport,
    /// Browser executable override
    pub executable: Option<PathBuf>,
    /// Time allowed for the browser to come up
    pub launch_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            executable: None,
            launch_timeout: Duration::from_secs(30),
        }
    }
}

impl LaunchOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless mode
    #[must_use]
    pub const fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport
    #[must_use]
    pub const fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Use a specific browser binary
    #[must_use]
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }
}

/// Options for a new isolated browser context
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Session to pre-seed (cookies and local storage)
    pub storage_state: Option<StorageState>,
    /// Viewport for pages of this context
    pub viewport: Option<Viewport>,
}

impl ContextOptions {
    /// Fresh context with no stored session
    #[must_use]
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Context seeded from a stored session
    #[must_use]
    pub fn with_storage_state(state: StorageState) -> Self {
        Self {
            storage_state: Some(state),
            viewport: None,
        }
    }

    /// Set viewport
    #[must_use]
    pub const fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }
}

/// State of the elements a locator currently matches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    /// Number of matches
    pub count: usize,
    /// First match is visible
    pub visible: bool,
    /// First match accepts input
    pub enabled: bool,
    /// First match is checked
    pub checked: bool,
    /// Text content of the first match
    pub text: Option<String>,
    /// Form value of the first match
    pub value: Option<String>,
}

/// Native dialog kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogKind {
    /// `alert()`
    Alert,
    /// `confirm()`
    Confirm,
    /// `prompt()`
    Prompt,
    /// `beforeunload`
    BeforeUnload,
}

/// How to answer the next dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogResponse {
    /// Accept
    Accept,
    /// Accept a prompt with text
    AcceptWith(String),
    /// Dismiss
    Dismiss,
}

impl DialogResponse {
    /// Whether the dialog is accepted
    #[must_use]
    pub const fn accepts(&self) -> bool {
        matches!(self, Self::Accept | Self::AcceptWith(_))
    }

    /// Prompt text, if any
    #[must_use]
    pub fn prompt_text(&self) -> Option<&str> {
        match self {
            Self::AcceptWith(text) => Some(text),
            _ => None,
        }
    }
}

/// A dialog that was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogEvent {
    /// Kind
    pub kind: DialogKind,
    /// Message shown
    pub message: String,
    /// Response given
    pub response: DialogResponse,
}

/// Single-use dialog expectation.
///
/// Returned by [`PageDriver::arm_dialog`] before the triggering action.
/// Dropping it disarms the handler.
#[derive(Debug)]
pub struct DialogGuard {
    rx: oneshot::Receiver<DialogEvent>,
}

impl DialogGuard {
    /// Guard paired with the sender a driver fires when the dialog appears
    #[must_use]
    pub fn channel() -> (oneshot::Sender<DialogEvent>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Disarm without waiting; a later dialog is left unanswered
    pub fn disarm(mut self) {
        self.rx.close();
    }

    /// Wait for the armed dialog to be handled
    pub async fn wait(self, timeout: Duration) -> SiteResult<DialogEvent> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(SiteError::Dialog {
                message: "dialog handler dropped before a dialog appeared".to_string(),
            }),
            Err(_) => Err(SiteError::timeout("dialog", timeout)),
        }
    }
}

/// Browser: factory for isolated contexts
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open an isolated context
    async fn new_context(&self, options: ContextOptions) -> SiteResult<Arc<dyn ContextDriver>>;

    /// Shut the browser down
    async fn close(&self) -> SiteResult<()>;
}

/// Isolated cookie/storage jar
#[async_trait]
pub trait ContextDriver: Send + Sync {
    /// Open a page in this context
    async fn new_page(&self) -> SiteResult<Arc<dyn PageDriver>>;

    /// Capture cookies and per-origin local storage
    async fn storage_state(&self) -> SiteResult<StorageState>;

    /// Close the context and all its pages
    async fn close(&self) -> SiteResult<()>;
}

/// One page (tab)
///
/// All element methods take a [`Locator`] and resolve it afresh.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to an absolute URL
    async fn goto(&self, url: &str, timeout: Duration) -> SiteResult<()>;

    /// Reload
    async fn reload(&self, timeout: Duration) -> SiteResult<()>;

    /// History back
    async fn go_back(&self, timeout: Duration) -> SiteResult<()>;

    /// History forward
    async fn go_forward(&self, timeout: Duration) -> SiteResult<()>;

    /// Current URL
    async fn url(&self) -> SiteResult<String>;

    /// Document title
    async fn title(&self) -> SiteResult<String>;

    /// Resolve when the page reaches `state`
    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> SiteResult<()>;

    /// Current state of the locator's matches
    async fn query(&self, locator: &Locator) -> SiteResult<ElementSnapshot>;

    /// Scroll the first match into view
    async fn scroll_into_view(&self, locator: &Locator) -> SiteResult<()>;

    /// Click the first match
    async fn click(&self, locator: &Locator) -> SiteResult<()>;

    /// Replace the first match's value
    async fn fill(&self, locator: &Locator, value: &str) -> SiteResult<()>;

    /// Clear the first match's value
    async fn clear(&self, locator: &Locator) -> SiteResult<()>;

    /// Type text key by key
    async fn type_text(&self, locator: &Locator, text: &str, delay: Duration) -> SiteResult<()>;

    /// Select options of a `<select>`; returns the selected values
    async fn select_options(&self, locator: &Locator, values: &[String])
        -> SiteResult<Vec<String>>;

    /// Attribute of the first match
    async fn attribute(&self, locator: &Locator, name: &str) -> SiteResult<Option<String>>;

    /// Current viewport
    async fn viewport(&self) -> SiteResult<Viewport>;

    /// Resize the viewport
    async fn set_viewport(&self, viewport: Viewport) -> SiteResult<()>;

    /// Write a PNG screenshot
    async fn screenshot(&self, path: &Path, full_page: bool) -> SiteResult<()>;

    /// Arm a one-shot handler for the next native dialog
    async fn arm_dialog(&self, response: DialogResponse) -> SiteResult<DialogGuard>;

    /// Close the page
    async fn close(&self) -> SiteResult<()>;
}
