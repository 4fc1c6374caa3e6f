//! # Fuelgate - fuel-metered execution scheduler
//!
//! Fuelgate runs user-supplied contracts on a shared engine while keeping
//! the host safe from runaway workloads. Every execution pre-pays a fuel
//! budget, runs under a deadline derived from that budget, and is refunded
//! whatever it did not use. When the shared reserve runs low the engine
//! stops admitting work until a background station has refilled it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use fuelgate::prelude::*;
//!
//! let vm = Fuelgate::builder()
//!     .with_tank_capacity(Fuel::new(100_000))
//!     .with_refuel(Fuel::new(500), Duration::from_millis(100))
//!     .with_contract(1, handler_fn(|input| async move { Ok(input) }))
//!     .build()?;
//!
//! vm.run()?;
//!
//! let contract = Contract::new("echo", 7, Fuel::new(1_000)).with_id(1);
//! let call = ContractCall::new(contract).with_input(serde_json::json!("hi"));
//! let output = vm.exec_contract(&CallContext::new(), &call).await?;
//!
//! vm.close().await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Your Application                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                    fuelgate (facade)                    │
//! │         ┌──────────────────┐   ┌─────────────┐          │
//! │         │ Fuelgate Builder │──▶│   FuelVm    │◀─ Meter  │
//! │         └──────────────────┘   └──────┬──────┘          │
//! │                                       │                 │
//! │  ┌───────────────┬───────────────────┴─┬─────────────┐  │
//! │  │ fuelgate-core │ fuelgate-resource   │ fuelgate-   │  │
//! │  │ (engine, fuel │ (tank, station)     │ observe     │  │
//! │  │  contracts)   │                     │ (logging)   │  │
//! │  └───────────────┴─────────────────────┴─────────────┘  │
//! ├─────────────────────────────────────────────────────────┤
//! │                         Tokio                           │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use fuelgate_core::{
    ConfigError, ContractHandler, ContractId, EngineConfig, EngineService, Fuel, FuelTiers,
    LocalEngine,
};
use fuelgate_observe::{LogService, TracingLogService};
use fuelgate_resource::{FuelStationService, FuelTankService, LocalFuelStation, LocalFuelTank};

pub mod config;
pub mod error;
pub mod meter;
pub mod vm;

pub use config::{MeterConfig, VmConfig};
pub use error::{VmError, VmResult};
pub use meter::{Meter, MeterAction};
pub use vm::FuelVm;

// Re-export from sub-crates
pub use fuelgate_core;
pub use fuelgate_observe;
pub use fuelgate_resource;

/// Main entry point for Fuelgate.
pub struct Fuelgate;

impl Fuelgate {
    /// Create a new scheduler builder.
    pub fn builder() -> FuelgateBuilder {
        FuelgateBuilder::new()
    }

    /// Create a scheduler with default configuration.
    pub fn with_defaults() -> VmResult<FuelVm> {
        FuelgateBuilder::new().build()
    }
}

/// Builder for a [`FuelVm`].
///
/// Any collaborator that is not supplied is created from the configuration:
/// a [`LocalEngine`], a [`LocalFuelTank`], a [`LocalFuelStation`] feeding
/// that tank, and a [`TracingLogService`].
pub struct FuelgateBuilder {
    config: VmConfig,
    engine: Option<Arc<dyn EngineService>>,
    tank: Option<Arc<dyn FuelTankService>>,
    station: Option<Arc<dyn FuelStationService>>,
    log: Option<Arc<dyn LogService>>,
    contracts: Vec<(ContractId, Arc<dyn ContractHandler>)>,
}

impl FuelgateBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: VmConfig::default(),
            engine: None,
            tank: None,
            station: None,
            log: None,
            contracts: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: VmConfig) -> Self {
        self.config = config;
        self
    }

    // Tank

    /// Set the tank capacity.
    pub fn with_tank_capacity(mut self, capacity: Fuel) -> Self {
        self.config.tank.capacity = capacity;
        self
    }

    /// Start with a balance other than a full tank.
    pub fn with_initial_fuel(mut self, fuel: Fuel) -> Self {
        self.config.tank.initial_fuel = Some(fuel);
        self
    }

    // Station

    /// Set the refuel rate.
    pub fn with_refuel(mut self, amount: Fuel, interval: Duration) -> Self {
        self.config.station.refuel_amount = amount;
        self.config.station.refuel_interval = interval;
        self
    }

    // Meter

    /// Set the meter configuration.
    pub fn with_meter(mut self, meter: MeterConfig) -> Self {
        self.config.meter = meter;
        self
    }

    /// Set the meter tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.config.meter.tick_interval = interval;
        self
    }

    /// Set the resume and pause marks.
    pub fn with_marks(mut self, low_water: f64, high_water: f64) -> Self {
        self.config.meter.low_water = low_water;
        self.config.meter.high_water = high_water;
        self
    }

    // Engine

    /// Set the tier table of the default engine.
    pub fn with_tiers(mut self, tiers: FuelTiers) -> Self {
        self.config.tiers = tiers;
        self
    }

    /// Register a contract body on the default engine.
    pub fn with_contract(mut self, id: ContractId, handler: Arc<dyn ContractHandler>) -> Self {
        self.contracts.push((id, handler));
        self
    }

    // Collaborators

    /// Use a custom engine.
    pub fn with_engine(mut self, engine: Arc<dyn EngineService>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Use a custom tank.
    pub fn with_tank(mut self, tank: Arc<dyn FuelTankService>) -> Self {
        self.tank = Some(tank);
        self
    }

    /// Use a custom station.
    pub fn with_station(mut self, station: Arc<dyn FuelStationService>) -> Self {
        self.station = Some(station);
        self
    }

    /// Use a custom log service.
    pub fn with_log_service(mut self, log: Arc<dyn LogService>) -> Self {
        self.log = Some(log);
        self
    }

    /// Build the scheduler.
    pub fn build(self) -> VmResult<FuelVm> {
        self.config.validate()?;

        let log: Arc<dyn LogService> = match self.log {
            Some(log) => log,
            None => Arc::new(TracingLogService::new()),
        };

        let engine: Arc<dyn EngineService> = match self.engine {
            Some(_) if !self.contracts.is_empty() => {
                return Err(VmError::Config(ConfigError::Invalid(
                    "contract bodies can only be registered on the default engine".to_string(),
                )));
            }
            Some(engine) => engine,
            None => {
                let engine =
                    LocalEngine::new(EngineConfig::new().with_tiers(self.config.tiers.clone()));
                for (id, handler) in self.contracts {
                    engine.register(id, handler);
                }
                Arc::new(engine)
            }
        };

        let tank: Arc<dyn FuelTankService> = match self.tank {
            Some(tank) => tank,
            None => Arc::new(LocalFuelTank::new(self.config.tank.clone())?),
        };

        let station: Arc<dyn FuelStationService> = match self.station {
            Some(station) => station,
            None => Arc::new(LocalFuelStation::new(
                self.config.station.clone(),
                Arc::clone(&tank),
                Arc::clone(&log),
            )?),
        };

        FuelVm::new(engine, tank, station, log, self.config.meter)
    }
}

impl Default for FuelgateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{
        FuelVm, Fuelgate, FuelgateBuilder, MeterAction, MeterConfig, VmConfig, VmError, VmResult,
    };

    // Core types
    pub use fuelgate_core::{
        CallContext, Contract, ContractCall, EngineService, EngineState, Execution, Fuel,
        FuelTiers, LocalEngine, Visibility, VmCaller, handler_fn,
    };

    // Resource types
    pub use fuelgate_resource::{
        FuelStat, FuelStationService, FuelTankService, StationConfig, TankConfig,
    };

    // Observability types
    pub use fuelgate_observe::{CollectingLogService, LogService, TracingLogService};

    // Common std types
    pub use std::sync::Arc;
    pub use std::time::Duration;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use fuelgate_core::ConfigError;

    #[test]
    fn test_builder_defaults() {
        let vm = Fuelgate::builder().build().unwrap();
        assert_eq!(vm.state(), EngineState::Initializing);

        let stats = vm.stats().unwrap();
        assert_eq!(stats.capacity, Fuel::new(100_000));
        assert_eq!(stats.fuel, stats.capacity);
    }

    #[test]
    fn test_builder_tank_settings() {
        let vm = Fuelgate::builder()
            .with_tank_capacity(Fuel::new(1_000))
            .with_initial_fuel(Fuel::new(250))
            .build()
            .unwrap();

        let stats = vm.stats().unwrap();
        assert_eq!(stats.capacity, Fuel::new(1_000));
        assert_eq!(stats.fuel, Fuel::new(250));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = Fuelgate::builder().with_marks(0.9, 0.1).build();
        assert!(matches!(result, Err(VmError::Config(_))));

        let result = Fuelgate::builder()
            .with_refuel(Fuel::new(1), Duration::ZERO)
            .build();
        assert!(matches!(result, Err(VmError::Resource(_))));
    }

    #[test]
    fn test_contracts_need_default_engine() {
        let result = Fuelgate::builder()
            .with_engine(Arc::new(LocalEngine::with_defaults()))
            .with_contract(1, handler_fn(|input| async move { Ok(input) }))
            .build();

        assert!(matches!(
            result,
            Err(VmError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let vm = Fuelgate::builder()
            .with_contract(
                1,
                handler_fn(|input| async move {
                    let n = input.as_i64().unwrap_or_default();
                    Ok(serde_json::json!(n + 1))
                }),
            )
            .build()
            .unwrap();
        vm.run().unwrap();

        let contract = Contract::new("inc", 7, Fuel::new(1_000)).with_id(1);
        let call = ContractCall::new(contract).with_input(serde_json::json!(41));
        let output = vm.exec_contract(&CallContext::new(), &call).await.unwrap();
        assert_eq!(output, serde_json::json!(42));

        vm.close().await.unwrap();
        assert_eq!(vm.state(), EngineState::Stopped);
    }
}
