//! Error types for the execution scheduler.

use std::time::Duration;

use fuelgate_core::{ConfigError, EngineError, Fuel, ValidationError};
use fuelgate_observe::OutcomeKind;
use fuelgate_resource::ResourceError;
use thiserror::Error;

/// Errors returned by [`FuelVm`](crate::FuelVm).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// The contract failed validation and was never admitted.
    #[error("Invalid contract: {0}")]
    Invalid(#[from] ValidationError),

    /// The caller's context ended before the call was admitted.
    #[error("Admission timed out while waiting for the engine")]
    AdmissionTimeout,

    /// The tank could not cover the call's fuel budget.
    #[error("Insufficient fuel: requested {requested}, available {available}")]
    InsufficientFuel {
        /// Fuel budget of the call.
        requested: Fuel,
        /// Balance at the time of the burn.
        available: Fuel,
    },

    /// The contract ran past the time allowed by its fuel tier.
    #[error("Execution timed out after {0:?}")]
    ExecutionTimeout(Duration),

    /// The contract terminated abnormally.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// `close` was called before `run`.
    #[error("VM is still initializing")]
    StillInitializing,

    /// The VM has been stopped or closed.
    #[error("VM is already closed")]
    AlreadyClosed,

    /// `run` was called twice.
    #[error("VM is already running")]
    AlreadyRunning,

    /// The engine reported an ordinary failure.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// A fuel service failed.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl VmError {
    /// Check whether the same call may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VmError::AdmissionTimeout | VmError::InsufficientFuel { .. }
        )
    }

    /// Classify the error for execution reports.
    pub fn outcome(&self) -> OutcomeKind {
        match self {
            VmError::AdmissionTimeout => OutcomeKind::AdmissionTimeout,
            VmError::InsufficientFuel { .. } => OutcomeKind::InsufficientFuel,
            VmError::ExecutionTimeout(_) => OutcomeKind::ExecutionTimeout,
            VmError::ExecutionFailed(_) => OutcomeKind::ExecutionFailed,
            _ => OutcomeKind::Error,
        }
    }
}

/// Result type for scheduler operations.
pub type VmResult<T> = std::result::Result<T, VmError>;
