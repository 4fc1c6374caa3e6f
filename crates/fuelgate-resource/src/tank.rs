//! The shared fuel tank.
//!
//! Every execution pre-pays its fuel budget from the tank and gets the unused
//! part back afterwards. The balance always stays within `[0, capacity]`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fuelgate_core::Fuel;

use crate::error::{ResourceError, ResourceResult};

/// Configuration for a fuel tank.
#[derive(Debug, Clone)]
pub struct TankConfig {
    /// Maximum balance.
    pub capacity: Fuel,
    /// Balance at creation; a full tank when unset.
    pub initial_fuel: Option<Fuel>,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            capacity: Fuel::new(100_000), // 100s of execution time
            initial_fuel: None,
        }
    }
}

impl TankConfig {
    /// Create a tank configuration with the given capacity.
    pub fn new(capacity: Fuel) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Start with a balance other than a full tank.
    pub fn with_initial_fuel(mut self, fuel: Fuel) -> Self {
        self.initial_fuel = Some(fuel);
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.capacity.is_zero() {
            return Err(ResourceError::InvalidConfig(
                "tank capacity must be greater than zero".to_string(),
            ));
        }
        if let Some(initial) = self.initial_fuel {
            if initial > self.capacity {
                return Err(ResourceError::InvalidConfig(format!(
                    "initial fuel {} exceeds capacity {}",
                    initial, self.capacity
                )));
            }
        }
        Ok(())
    }
}

/// Snapshot of tank usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelStat {
    /// Current balance.
    pub fuel: Fuel,
    /// Maximum balance.
    pub capacity: Fuel,
    /// Capacity minus balance.
    pub used: Fuel,
    /// `used` as a percentage of capacity.
    pub used_percent: f64,
    /// Fuel burned since creation.
    pub total_burned: u64,
    /// Fuel accepted back since creation.
    pub total_refueled: u64,
    /// Number of successful burns.
    pub burn_count: u64,
    /// Number of burns refused for lack of fuel.
    pub rejected_burns: u64,
}

impl FuelStat {
    /// `used` as a fraction of capacity.
    pub fn used_fraction(&self) -> f64 {
        self.used.fraction_of(self.capacity)
    }
}

/// A holder of fuel.
///
/// All operations must be linearizable with respect to each other.
pub trait FuelTankService: Send + Sync {
    /// Take `amount` out of the tank, or fail without touching the balance.
    fn burn(&self, amount: Fuel) -> ResourceResult<()>;

    /// Put `amount` back, discarding whatever exceeds the capacity.
    fn refuel(&self, amount: Fuel) -> ResourceResult<()>;

    /// Current balance.
    fn fuel(&self) -> ResourceResult<Fuel>;

    /// Maximum balance.
    fn capacity(&self) -> Fuel;

    /// Usage snapshot.
    fn stats(&self) -> ResourceResult<FuelStat>;
}

/// An in-memory tank backed by atomics.
pub struct LocalFuelTank {
    capacity: u64,
    balance: AtomicU64,
    total_burned: AtomicU64,
    total_refueled: AtomicU64,
    burn_count: AtomicU64,
    rejected_burns: AtomicU64,
}

impl LocalFuelTank {
    /// Create a tank with the given configuration.
    pub fn new(config: TankConfig) -> ResourceResult<Self> {
        config.validate()?;

        let initial = config.initial_fuel.unwrap_or(config.capacity);
        info!(
            capacity = config.capacity.units(),
            initial = initial.units(),
            "Created fuel tank"
        );

        Ok(Self {
            capacity: config.capacity.units(),
            balance: AtomicU64::new(initial.units()),
            total_burned: AtomicU64::new(0),
            total_refueled: AtomicU64::new(0),
            burn_count: AtomicU64::new(0),
            rejected_burns: AtomicU64::new(0),
        })
    }

    /// Create a full tank of the given capacity.
    pub fn with_capacity(capacity: Fuel) -> ResourceResult<Self> {
        Self::new(TankConfig::new(capacity))
    }
}

impl FuelTankService for LocalFuelTank {
    fn burn(&self, amount: Fuel) -> ResourceResult<()> {
        let requested = amount.units();
        let result = self
            .balance
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |balance| {
                balance.checked_sub(requested)
            });

        match result {
            Ok(previous) => {
                self.total_burned.fetch_add(requested, Ordering::Relaxed);
                self.burn_count.fetch_add(1, Ordering::Relaxed);
                debug!(burned = requested, balance = previous - requested, "Burned fuel");
                Ok(())
            }
            Err(available) => {
                self.rejected_burns.fetch_add(1, Ordering::Relaxed);
                debug!(requested, available, "Burn refused");
                Err(ResourceError::InsufficientFuel {
                    requested: amount,
                    available: Fuel::new(available),
                })
            }
        }
    }

    fn refuel(&self, amount: Fuel) -> ResourceResult<()> {
        let capacity = self.capacity;
        let offered = amount.units();
        let previous = self
            .balance
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |balance| {
                Some(balance.saturating_add(offered).min(capacity))
            })
            .unwrap_or_else(|balance| balance);

        let accepted = previous.saturating_add(offered).min(capacity) - previous;
        self.total_refueled.fetch_add(accepted, Ordering::Relaxed);
        debug!(offered, accepted, balance = previous + accepted, "Refueled tank");
        Ok(())
    }

    fn fuel(&self) -> ResourceResult<Fuel> {
        Ok(Fuel::new(self.balance.load(Ordering::Acquire)))
    }

    fn capacity(&self) -> Fuel {
        Fuel::new(self.capacity)
    }

    fn stats(&self) -> ResourceResult<FuelStat> {
        let fuel = self.fuel()?;
        let capacity = self.capacity();
        let used = capacity.saturating_sub(fuel);

        Ok(FuelStat {
            fuel,
            capacity,
            used,
            used_percent: used.units() as f64 * 100.0 / capacity.units() as f64,
            total_burned: self.total_burned.load(Ordering::Relaxed),
            total_refueled: self.total_refueled.load(Ordering::Relaxed),
            burn_count: self.burn_count.load(Ordering::Relaxed),
            rejected_burns: self.rejected_burns.load(Ordering::Relaxed),
        })
    }
}

impl std::fmt::Debug for LocalFuelTank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFuelTank")
            .field("capacity", &self.capacity)
            .field("balance", &self.balance.load(Ordering::Relaxed))
            .finish()
    }
}
