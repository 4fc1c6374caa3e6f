//! Fuelgate Resource - fuel accounting
//!
//! - [`FuelTankService`] / [`LocalFuelTank`]: the shared reserve every
//!   execution pre-pays from
//! - [`FuelStationService`] / [`LocalFuelStation`]: background refueling
//!
//! # Example
//!
//! ```ignore
//! use fuelgate_resource::prelude::*;
//!
//! let tank = LocalFuelTank::with_capacity(Fuel::new(10_000))?;
//! tank.burn(Fuel::new(500))?;
//! tank.refuel(Fuel::new(200))?;
//! assert_eq!(tank.fuel()?, Fuel::new(9_700));
//! ```

pub mod error;
pub mod station;
pub mod tank;

pub use error::{ResourceError, ResourceResult};
pub use station::{FuelStationService, LocalFuelStation, StationConfig};
pub use tank::{FuelStat, FuelTankService, LocalFuelTank, TankConfig};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ResourceError, ResourceResult};
    pub use crate::station::{FuelStationService, LocalFuelStation, StationConfig};
    pub use crate::tank::{FuelStat, FuelTankService, LocalFuelTank, TankConfig};
    pub use fuelgate_core::Fuel;
}
