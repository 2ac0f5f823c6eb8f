//! Per-run logging handle.
//!
//! A [`RunLog`] is created once at the runner boundary and cloned into
//! every page, fixture and pipeline of that run. Each call emits a
//! `tracing` event tagged with the run id and module, and keeps a copy of
//! the record so a test can inspect exactly what its own run logged.
//!
//! The copy is bounded: once [`DEFAULT_CAPTURE_LIMIT`] records (or the
//! limit set with [`RunLog::with_capture_limit`]) are held, the oldest
//! record is dropped for each new one.

use crate::result::{SiteError, SiteResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Records kept per run before the oldest are dropped
pub const DEFAULT_CAPTURE_LIMIT: usize = 10_000;

/// Severity of a captured record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose diagnostics
    Debug,
    /// Normal progress
    Info,
    /// Recoverable problem
    Warn,
    /// Failure
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One captured log line
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Severity
    pub level: LogLevel,
    /// Module that emitted it
    pub module: String,
    /// Rendered message
    pub message: String,
    /// Emission time
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
struct Capture {
    records: VecDeque<LogRecord>,
    limit: usize,
    dropped: u64,
}

impl Capture {
    fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit,
            dropped: 0,
        }
    }

    fn push(&mut self, record: LogRecord) {
        if self.limit == 0 {
            self.dropped += 1;
            return;
        }
        while self.records.len() >= self.limit {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(record);
    }
}

/// Logging handle threaded through one test run
#[derive(Debug, Clone)]
pub struct RunLog {
    run_id: Uuid,
    module: Arc<str>,
    capture: Arc<Mutex<Capture>>,
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new("run")
    }
}

impl RunLog {
    /// New handle with a fresh run id
    #[must_use]
    pub fn new(module: &str) -> Self {
        Self::with_capture_limit(module, DEFAULT_CAPTURE_LIMIT)
    }

    /// New handle keeping at most `limit` records; `0` disables capture
    #[must_use]
    pub fn with_capture_limit(module: &str, limit: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            module: Arc::from(module),
            capture: Arc::new(Mutex::new(Capture::new(limit))),
        }
    }

    /// Child handle for another module, sharing run id and buffer
    #[must_use]
    pub fn scoped(&self, module: &str) -> Self {
        Self {
            run_id: self.run_id,
            module: Arc::from(module),
            capture: Arc::clone(&self.capture),
        }
    }

    /// Run identifier
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Module name of this handle
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Log at debug level
    pub fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(run_id = %self.run_id, module = %self.module, "{message}");
        self.push(LogLevel::Debug, message);
    }

    /// Log at info level
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(run_id = %self.run_id, module = %self.module, "{message}");
        self.push(LogLevel::Info, message);
    }

    /// Log at warn level
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(run_id = %self.run_id, module = %self.module, "{message}");
        self.push(LogLevel::Warn, message);
    }

    /// Log at error level
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(run_id = %self.run_id, module = %self.module, "{message}");
        self.push(LogLevel::Error, message);
    }

    fn push(&self, level: LogLevel, message: String) {
        let record = LogRecord {
            level,
            module: self.module.to_string(),
            message,
            at: Utc::now(),
        };
        self.capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Snapshot of the records still held for this run
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .iter()
            .cloned()
            .collect()
    }

    /// Records evicted or never kept because of the capture limit
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dropped
    }

    /// Records at exactly `level`
    #[must_use]
    pub fn records_at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }

    /// Whether any record at `level` contains `needle`
    #[must_use]
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records_at(level)
            .iter()
            .any(|r| r.message.contains(needle))
    }
}

/// Install the global `tracing` subscriber for a binary.
///
/// `filter` is an `EnvFilter` directive such as `info` or
/// `sitecheck=debug`. `RUST_LOG` wins when set.
pub fn init_subscriber(filter: &str, json: bool) -> SiteResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| SiteError::config(format!("invalid log filter '{filter}': {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| SiteError::config(format!("tracing subscriber: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_captured_in_order() {
        let log = RunLog::new("test");
        log.debug("one");
        log.warn("two");
        log.error("three");
        let messages: Vec<_> = log.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, ["one", "two", "three"]);
    }

    #[test]
    fn test_scoped_shares_buffer_and_run_id() {
        let root = RunLog::new("runner");
        let child = root.scoped("fixtures");
        child.info("acquired page");
        assert_eq!(child.run_id(), root.run_id());
        let records = root.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module, "fixtures");
    }

    #[test]
    fn test_separate_runs_do_not_share_records() {
        let a = RunLog::new("a");
        let b = RunLog::new("b");
        a.error("boom");
        assert!(b.records().is_empty());
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn test_contains_filters_by_level() {
        let log = RunLog::new("test");
        log.warn("retrying click");
        assert!(log.contains(LogLevel::Warn, "retrying"));
        assert!(!log.contains(LogLevel::Error, "retrying"));
    }

    #[test]
    fn test_capture_keeps_newest_records() {
        let log = RunLog::with_capture_limit("test", 3);
        let child = log.scoped("child");
        for i in 0..5 {
            child.info(format!("line {i}"));
        }
        let messages: Vec<_> = log.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, ["line 2", "line 3", "line 4"]);
        assert_eq!(log.dropped(), 2);
    }

    #[test]
    fn test_zero_limit_disables_capture() {
        let log = RunLog::with_capture_limit("test", 0);
        log.error("not kept");
        assert!(log.records().is_empty());
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Error);
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }
}
