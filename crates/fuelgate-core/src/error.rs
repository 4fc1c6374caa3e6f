//! Core error types for Fuelgate.
//!
//! Errors are split by origin: field validation of entities, engine
//! lifecycle and execution failures, and configuration problems.

use thiserror::Error;

use crate::contract::ContractId;
use crate::engine::EngineState;

/// An entity failed field-level validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The contract has no name.
    #[error("contract name is required")]
    ContractNameRequired,

    /// The contract has no owner.
    #[error("contract owner is required")]
    OwnerRequired,

    /// The contract does not declare a fuel budget.
    #[error("max fuel is required")]
    MaxFuelRequired,

    /// The visibility is not one of the known values.
    #[error("invalid visibility: '{0}'")]
    InvalidVisibility(String),

    /// The user has no name.
    #[error("user name is required")]
    UserNameRequired,

    /// The user email was provided but is empty.
    #[error("email cannot be empty if provided")]
    EmptyEmail,
}

/// Errors raised by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The requested lifecycle transition is not allowed.
    #[error("Invalid engine transition from {from} to {to}")]
    InvalidTransition {
        /// State the engine was in.
        from: EngineState,
        /// State that was requested.
        to: EngineState,
    },

    /// The engine is stopped and cannot change state again.
    #[error("Engine is stopped")]
    Stopped,

    /// The engine refused work because it is not running.
    #[error("Engine is not running (state: {0})")]
    NotRunning(EngineState),

    /// No body is registered for the contract.
    #[error("Contract not found: {0}")]
    ContractNotFound(ContractId),

    /// The caller cancelled the execution while it was in flight.
    #[error("Execution cancelled by caller")]
    Cancelled,
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A value is outside its allowed range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for validation.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for configuration checks.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
