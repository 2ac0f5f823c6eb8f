//! CLI command definitions using clap

use crate::config::{ColorChoice, OutputFormat};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sitecheck::Role;
use std::path::PathBuf;

/// Sitecheck: E2E harness runner
#[derive(Parser, Debug)]
#[command(name = "sitecheck")]
#[command(version, about = "Set up and check E2E auth sessions, and finish test runs")]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Result output format
    #[arg(long, default_value = "text", global = true)]
    pub format: FormatArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "SITECHECK_LOG_JSON", global = true)]
    pub log_json: bool,

    /// Session file directory (overrides AUTH_DIR)
    #[arg(long, global = true)]
    pub auth_dir: Option<PathBuf>,

    /// Results directory (overrides RESULTS_DIR)
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    /// Dotenv file with harness variables (default: ./.env if present)
    #[arg(long, env = "SITECHECK_ENV_FILE", global = true)]
    pub env_file: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in through the browser and save session files
    SetupAuth(SetupAuthArgs),

    /// Check that saved session files are still usable
    ValidateState(ValidateStateArgs),

    /// Clean temp artifacts and write the run summary
    Teardown(TeardownArgs),

    /// Print the effective configuration (no secrets)
    Config,
}

/// Arguments for `setup-auth`
#[derive(Args, Debug, Clone, Default)]
pub struct SetupAuthArgs {
    /// Only this role (default: admin, then test user)
    #[arg(long)]
    pub role: Option<RoleArg>,

    /// Log in again even if a saved session is still valid
    #[arg(long)]
    pub force: bool,

    /// Chromium executable
    #[arg(long, env = "CHROME_PATH")]
    pub chrome: Option<PathBuf>,
}

/// Arguments for `validate-state`
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateStateArgs {
    /// Only this role (default: every role)
    #[arg(long)]
    pub role: Option<RoleArg>,

    /// Check file structure only; skip the protected-route check
    #[arg(long)]
    pub offline: bool,

    /// Chromium executable
    #[arg(long, env = "CHROME_PATH")]
    pub chrome: Option<PathBuf>,
}

/// Arguments for `teardown`
#[derive(Args, Debug, Clone, Default)]
pub struct TeardownArgs {
    /// Also delete generated blog posts through the API (refused on production)
    #[arg(long)]
    pub purge_test_data: bool,
}

/// Role argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleArg {
    /// Administrator
    Admin,
    /// Regular test user
    TestUser,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Admin => Self::Admin,
            RoleArg::TestUser => Self::TestUser,
        }
    }
}

/// Roles selected by an optional `--role`
#[must_use]
pub fn selected_roles(role: Option<RoleArg>) -> Vec<Role> {
    role.map_or_else(|| Role::ALL.to_vec(), |r| vec![r.into()])
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum FormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON on stdout
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}
