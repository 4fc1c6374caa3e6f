//! Fuelgate Core - building blocks of the fuel-metered scheduler
//!
//! This crate provides the types shared by every Fuelgate component:
//!
//! - [`Fuel`] and [`FuelTiers`]: the fuel unit and the table mapping a fuel
//!   budget to a maximum execution time
//! - [`Contract`], [`ContractCall`] and [`VmCaller`]: what gets executed
//! - [`EngineService`]: the engine seam the scheduler drives, with
//!   [`LocalEngine`] as the in-process implementation
//! - [`CallContext`]: caller-side cancellation and deadlines
//!
//! # Quick Start
//!
//! ```ignore
//! use fuelgate_core::prelude::*;
//!
//! let engine = LocalEngine::with_defaults();
//! engine.register(1, handler_fn(|input| async move { Ok(input) }));
//! engine.run()?;
//!
//! let contract = Contract::new("echo", 7, Fuel::new(500)).with_id(1);
//! let outcome = engine
//!     .exec_contract(&CallContext::new(), &ContractCall::new(contract))
//!     .await?;
//! ```

pub mod config;
pub mod context;
pub mod contract;
pub mod engine;
pub mod error;
pub mod fuel;
pub mod user;

// Re-export main types at crate root
pub use config::EngineConfig;
pub use context::CallContext;
pub use contract::{Contract, ContractCall, ContractId, Revision, Visibility, VmCaller};
pub use engine::{
    ContractFault, ContractHandler, EngineService, EngineState, Execution, LocalEngine,
    handler_fn, panic_message,
};
pub use error::{
    ConfigError, ConfigResult, EngineError, EngineResult, ValidationError, ValidationResult,
};
pub use fuel::{FUEL_UNIT, Fuel, FuelTier, FuelTiers, MAX_EXECUTION_TIME};
pub use user::{User, UserId};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::context::CallContext;
    pub use crate::contract::{Contract, ContractCall, Visibility, VmCaller};
    pub use crate::engine::{EngineService, EngineState, Execution, LocalEngine, handler_fn};
    pub use crate::error::{EngineError, ValidationError};
    pub use crate::fuel::{Fuel, FuelTiers};
    pub use crate::user::User;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[tokio::test]
    async fn test_end_to_end() {
        let engine = LocalEngine::with_defaults();
        engine.register(
            1,
            handler_fn(|input| async move {
                let n = input.as_i64().unwrap_or_default();
                Ok(serde_json::json!(n * 2))
            }),
        );
        engine.run().unwrap();

        let contract = Contract::new("double", 7, Fuel::new(500)).with_id(1);
        contract.validate().unwrap();

        let call = ContractCall::new(contract).with_input(serde_json::json!(21));
        let outcome = engine.exec_contract(&CallContext::new(), &call).await.unwrap();

        assert_eq!(outcome, Execution::Completed(serde_json::json!(42)));
    }
}
