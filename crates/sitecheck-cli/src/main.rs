//! Sitecheck CLI: auth session setup, validation and run teardown
//!
//! ## Usage
//!
//! ```bash
//! sitecheck setup-auth                     # Admin (required) and test user (optional)
//! sitecheck setup-auth --role admin --force
//! sitecheck validate-state --offline       # File structure only
//! sitecheck teardown                       # Write test-results/test-run-summary.json
//! sitecheck config                         # Effective configuration, no secrets
//! ```

use clap::Parser;
use sitecheck_cli::{execute, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match execute(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
