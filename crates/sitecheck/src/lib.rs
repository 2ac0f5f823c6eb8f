//! Sitecheck: page-object E2E harness for a blog web application
//!
//! Tests drive pages through a [`PageDriver`], perform retried actions,
//! assert with logged outcomes, reuse persisted login sessions, and get
//! their resources from a typed fixture graph.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SITECHECK Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Fixture    │    │ Page       │    │ Browser    │            │
//! │   │ Graph      │───►│ Objects    │───►│ Driver     │            │
//! │   │            │    │ (actions,  │    │ (mock or   │            │
//! │   │            │    │ assertions)│    │ chromium)  │            │
//! │   └─────┬──────┘    └────────────┘    └────────────┘            │
//! │         │                                   ▲                   │
//! │         ▼                                   │                   │
//! │   ┌────────────┐    ┌────────────┐          │                   │
//! │   │ Session    │◄───│ Auth       │──────────┘                   │
//! │   │ Store      │    │ Pipeline   │                              │
//! │   └────────────┘    └────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod action;
mod assertion;
mod auth;
mod config;
mod driver;
mod fixture;
mod locator;
mod logging;
mod result;
mod session;
mod summary;
mod timeouts;
mod wait;

/// REST client, response checks and test data
pub mod api;

/// Standard fixture bindings for each test universe
pub mod fixtures;

/// Log and error message texts shared by the harness
pub mod messages;

/// In-memory site and browser for tests without Chromium
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod mock_driver;

/// Page objects for the blog application
pub mod pages;

#[cfg(feature = "browser")]
mod chromium;

pub use action::{perform, Action, ActionOptions, ActionReport, DEFAULT_RETRIES};
pub use assertion::{
    AssertMode, AssertOptions, AssertionResult, Assertions, ElementCheck, TextMatch,
};
pub use auth::{validate_session, AuthPipeline, PipelineOutcome};
#[cfg(feature = "browser")]
pub use chromium::ChromiumBrowser;
pub use config::{
    is_destructive, Credentials, ProtectedPaths, Target, TestConfig, DEFAULT_BACKEND_PORT,
    DESTRUCTIVE_TAGS, PLACEHOLDER_ADMIN_EMAIL, REDACTED,
};
pub use driver::{
    BrowserDriver, ContextDriver, ContextOptions, DialogEvent, DialogGuard, DialogKind,
    DialogResponse, ElementSnapshot, LaunchOptions, PageDriver, Viewport,
};
pub use fixture::{
    Acquired, FixtureDeps, FixtureGraph, FixtureRegistryBuilder, FixtureValue,
};
pub use locator::{Locator, Selector, TestIdFamily};
pub use logging::{init_subscriber, LogLevel, LogRecord, RunLog, DEFAULT_CAPTURE_LIMIT};
pub use result::{AuthStep, SiteError, SiteResult};
pub use session::{
    Cookie, LocalStorageItem, OriginState, Role, SameSite, SessionStore, StorageState,
};
pub use summary::{
    cleanup_temp_dirs, global_teardown, summary_path, CleanupInfo, RunSummary,
    SummaryEnvironment, SUMMARY_FILE, TEMP_DIRS,
};
pub use timeouts::TimeoutTier;
pub use wait::{
    poll_until, wait_for_element, wait_for_page_load, wait_for_url, ElementState, LoadState,
    UrlPattern, ELEMENT_POLL_INTERVAL,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::api::{ApiClient, TestDataCleanup, TestDataFactory};
    pub use super::fixtures::{HarnessEnv, PageFixture, Universe};
    pub use super::pages::{
        AdminDashboardPage, AdminLoginPage, BasePage, BlogPage, HomePage, LoginOptions,
        Navigable, PageObject, PageReadiness, ViewportAware,
    };
    pub use super::{
        perform, Action, ActionOptions, AssertMode, AssertOptions, Assertions, AuthPipeline,
        BrowserDriver, ContextOptions, Credentials, FixtureGraph, Locator, PageDriver, Role,
        RunLog, SessionStore, SiteError, SiteResult, TestConfig, TimeoutTier,
    };
    #[cfg(feature = "browser")]
    pub use super::ChromiumBrowser;
}
