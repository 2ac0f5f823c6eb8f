//! Result output: styled lines for people, JSON for machines

use crate::config::{CliConfig, OutputFormat};
use console::{style, StyledObject, Term};
use serde_json::Value;

/// Writes command results to stdout
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
    /// Output format
    pub format: OutputFormat,
}

impl Reporter {
    /// Reporter for `config`
    #[must_use]
    pub fn new(config: &CliConfig) -> Self {
        Self {
            term: Term::stdout(),
            use_color: config.color.should_color(),
            quiet: config.verbosity.is_quiet(),
            format: config.format,
        }
    }

    /// Whether results go out as JSON
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn line(&self, text: &str) {
        if self.term.write_line(text).is_err() {
            println!("{text}");
        }
    }

    fn mark(&self, symbol: &str, paint: fn(StyledObject<&str>) -> StyledObject<&str>) -> String {
        if self.use_color {
            paint(style(symbol)).to_string()
        } else {
            symbol.to_string()
        }
    }

    /// Passed step
    pub fn success(&self, message: &str) {
        if self.quiet || self.is_json() {
            return;
        }
        let mark = self.mark("✓", |s| s.green());
        self.line(&format!("{mark} {message}"));
    }

    /// Skipped or degraded step
    pub fn warn(&self, message: &str) {
        if self.quiet || self.is_json() {
            return;
        }
        let mark = self.mark("-", |s| s.yellow());
        self.line(&format!("{mark} {message}"));
    }

    /// Failed step; shown even in quiet mode
    pub fn failure(&self, message: &str) {
        if self.is_json() {
            return;
        }
        let mark = self.mark("✗", |s| s.red().bold());
        self.line(&format!("{mark} {message}"));
    }

    /// Plain informational line
    pub fn info(&self, message: &str) {
        if self.quiet || self.is_json() {
            return;
        }
        self.line(message);
    }

    /// JSON document; only written in JSON mode
    pub fn json(&self, value: &Value) {
        if !self.is_json() {
            return;
        }
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        self.line(&text);
    }
}
