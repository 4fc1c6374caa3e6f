//! Fuelgate Observability
//!
//! This crate provides the observability side of the Fuelgate scheduler:
//!
//! - [`LogService`]: the logging collaborator every component reports to
//! - [`TracingLogService`]: forwards reports to `tracing`
//! - [`CollectingLogService`]: keeps reports in memory
//! - [`RunReport`]: summary of a batch of executions
//!
//! # Logging
//!
//! ```ignore
//! use fuelgate_observe::{CollectingLogService, LogLevel, LogService};
//!
//! let log = CollectingLogService::default();
//! log.report_info("engine paused");
//! assert_eq!(log.count(LogLevel::Info), 1);
//! ```

pub mod log;
pub mod report;

// Re-export main types
pub use log::{
    CollectingLogService, FanoutLogService, LogEntry, LogLevel, LogService, TracingLogService,
};
pub use report::{ExecutionId, ExecutionRecord, FuelSummary, OutcomeKind, RunReport};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::log::{CollectingLogService, LogService, TracingLogService};
    pub use crate::report::{ExecutionId, OutcomeKind, RunReport};
}
