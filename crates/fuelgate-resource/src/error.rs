//! Error types for resource management.

use fuelgate_core::Fuel;
use thiserror::Error;

/// Errors related to fuel resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The tank cannot cover a burn.
    #[error("Not enough fuel: requested {requested} units, {available} available")]
    InsufficientFuel {
        /// Fuel requested.
        requested: Fuel,
        /// Balance at the time of the request.
        available: Fuel,
    },

    /// The tank could not be reached.
    #[error("Fuel tank unavailable: {0}")]
    Unavailable(String),

    /// Configuration error.
    #[error("Invalid resource configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for resource operations.
pub type ResourceResult<T> = std::result::Result<T, ResourceError>;
