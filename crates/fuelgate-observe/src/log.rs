//! The logging collaborator.
//!
//! The scheduler and its background loops never propagate background
//! failures; they hand them to a [`LogService`] instead.

use std::error::Error;
use std::time::Instant;

use parking_lot::RwLock;

/// Sink for informational messages, errors and caught panics.
///
/// Implementations must never block or fail the caller.
pub trait LogService: Send + Sync {
    /// Report an informational message.
    fn report_info(&self, message: &str);

    /// Report an error that is not propagated to a caller.
    fn report_error(&self, err: &dyn Error);

    /// Report a panic that was caught and contained.
    fn report_panic(&self, message: &str);
}

/// Forwards reports to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogService;

impl TracingLogService {
    /// Create a new tracing log service.
    pub fn new() -> Self {
        Self
    }
}

impl LogService for TracingLogService {
    fn report_info(&self, message: &str) {
        tracing::info!(target: "fuelgate", "{}", message);
    }

    fn report_error(&self, err: &dyn Error) {
        tracing::error!(target: "fuelgate", error = %err, "Background error");
    }

    fn report_panic(&self, message: &str) {
        tracing::error!(target: "fuelgate", panic = message, "Recovered from panic");
    }
}

/// Severity of a collected entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// Informational message.
    Info,
    /// Error report.
    Error,
    /// Caught panic.
    Panic,
}

/// A single collected report.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// When the report was made.
    pub at: Instant,
    /// Severity.
    pub level: LogLevel,
    /// Rendered message.
    pub message: String,
}

/// Keeps reports in memory, up to a limit.
///
/// Useful in tests and for summarising a run.
pub struct CollectingLogService {
    entries: RwLock<Vec<LogEntry>>,
    max_entries: usize,
}

impl CollectingLogService {
    /// Create a collector keeping at most `max_entries` reports.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries,
        }
    }

    fn push(&self, level: LogLevel, message: String) {
        let mut entries = self.entries.write();
        if entries.len() < self.max_entries {
            entries.push(LogEntry {
                at: Instant::now(),
                level,
                message,
            });
        }
    }

    /// All collected entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// Messages collected at `level`.
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.level == level)
            .map(|entry| entry.message.clone())
            .collect()
    }

    /// Count entries at `level`.
    pub fn count(&self, level: LogLevel) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.level == level)
            .count()
    }

    /// Check whether any entry at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries
            .read()
            .iter()
            .any(|entry| entry.level == level && entry.message.contains(needle))
    }

    /// Get entry count.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clear collected entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for CollectingLogService {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl LogService for CollectingLogService {
    fn report_info(&self, message: &str) {
        self.push(LogLevel::Info, message.to_string());
    }

    fn report_error(&self, err: &dyn Error) {
        self.push(LogLevel::Error, err.to_string());
    }

    fn report_panic(&self, message: &str) {
        self.push(LogLevel::Panic, message.to_string());
    }
}

impl std::fmt::Debug for CollectingLogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectingLogService")
            .field("len", &self.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

/// Sends every report to several services.
#[derive(Default)]
pub struct FanoutLogService {
    sinks: Vec<std::sync::Arc<dyn LogService>>,
}

impl FanoutLogService {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: std::sync::Arc<dyn LogService>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl LogService for FanoutLogService {
    fn report_info(&self, message: &str) {
        for sink in &self.sinks {
            sink.report_info(message);
        }
    }

    fn report_error(&self, err: &dyn Error) {
        for sink in &self.sinks {
            sink.report_error(err);
        }
    }

    fn report_panic(&self, message: &str) {
        for sink in &self.sinks {
            sink.report_panic(message);
        }
    }
}
