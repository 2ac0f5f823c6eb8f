//! Error types for the CLI

use sitecheck::SiteError;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Command needs a browser but this build has none
    #[error("'{command}' needs a browser; rebuild with --features browser")]
    BrowserUnavailable {
        /// Command name
        command: String,
    },

    /// One or more session files failed validation
    #[error("{failed} session file(s) failed validation")]
    Validation {
        /// Number of failed roles
        failed: usize,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Harness error
    #[error(transparent)]
    Site(#[from] SiteError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Process exit code for this error
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation { .. } => 1,
            Self::Config { .. } | Self::Site(SiteError::Config { .. }) => 2,
            Self::BrowserUnavailable { .. } => 3,
            Self::Site(SiteError::Auth { .. } | SiteError::MissingCredentials { .. }) => 4,
            Self::Site(SiteError::ProductionGuard { .. }) => 5,
            Self::Io(_) | Self::Site(_) => 1,
        }
    }
}
