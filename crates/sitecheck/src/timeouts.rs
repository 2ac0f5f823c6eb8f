//! Shared timeout table.
//!
//! Call sites pick a tier instead of hardcoding milliseconds.

use std::time::Duration;

/// Enumerated timeout tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutTier {
    /// General purpose default
    Default,
    /// Quick checks
    Short,
    /// Medium waits
    Medium,
    /// Long waits (login redirects, setup)
    Long,
    /// Very slow operations
    ExtraLong,
    /// Full page load
    PageLoad,
    /// Element becoming visible
    ElementVisible,
    /// Element becoming hidden
    ElementHidden,
    /// Click action
    Click,
    /// Fill action
    Fill,
    /// Key-by-key typing
    Type,
    /// Select action
    Select,
    /// HTTP API request
    ApiRequest,
    /// Form submission round trip
    FormSubmit,
    /// Login flow
    Login,
    /// Logout flow
    Logout,
    /// Navigation
    Navigation,
    /// Redirect after an action
    Redirect,
    /// Sleep between retry attempts
    PollingInterval,
    /// Back-off between retried flows
    RetryDelay,
    /// Time an element must stay stable
    StabilityCheck,
}

impl TimeoutTier {
    /// Tier value in milliseconds
    #[must_use]
    pub const fn ms(self) -> u64 {
        match self {
            Self::Default => 10_000,
            Self::Short => 5_000,
            Self::Medium => 15_000,
            Self::Long => 30_000,
            Self::ExtraLong => 60_000,
            Self::PageLoad => 30_000,
            Self::ElementVisible => 10_000,
            Self::ElementHidden => 5_000,
            Self::Click => 10_000,
            Self::Fill => 10_000,
            Self::Type => 15_000,
            Self::Select => 10_000,
            Self::ApiRequest => 15_000,
            Self::FormSubmit => 20_000,
            Self::Login => 15_000,
            Self::Logout => 10_000,
            Self::Navigation => 30_000,
            Self::Redirect => 15_000,
            Self::PollingInterval => 1_000,
            Self::RetryDelay => 2_000,
            Self::StabilityCheck => 3_000,
        }
    }

    /// Tier value as a duration
    #[must_use]
    pub const fn duration(self) -> Duration {
        Duration::from_millis(self.ms())
    }
}

impl From<TimeoutTier> for Duration {
    fn from(tier: TimeoutTier) -> Self {
        tier.duration()
    }
}
