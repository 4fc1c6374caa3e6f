//! Scheduler configuration.

use std::time::Duration;

use fuelgate_core::{ConfigError, ConfigResult, FuelTiers};
use fuelgate_resource::{StationConfig, TankConfig};

use crate::error::VmResult;

/// Configuration of the meter loop.
///
/// Marks are fractions of the tank capacity that is in use. The engine is
/// paused once usage reaches `high_water` and resumed once it drops back to
/// `low_water`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterConfig {
    /// Time between two meter ticks.
    pub tick_interval: Duration,
    /// Usage at or below which a paused engine resumes.
    pub low_water: f64,
    /// Usage at or above which a running engine pauses.
    pub high_water: f64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            low_water: 0.65,
            high_water: 0.95,
        }
    }
}

impl MeterConfig {
    /// Create a meter configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set both marks.
    pub fn with_marks(mut self, low_water: f64, high_water: f64) -> Self {
        self.low_water = low_water;
        self.high_water = high_water;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "meter tick interval must be greater than zero".to_string(),
            ));
        }
        let in_range = |mark: f64| (0.0..=1.0).contains(&mark);
        if !in_range(self.low_water) || !in_range(self.high_water) {
            return Err(ConfigError::Invalid(format!(
                "meter marks must be within [0, 1], got {} and {}",
                self.low_water, self.high_water
            )));
        }
        if self.low_water >= self.high_water {
            return Err(ConfigError::Invalid(format!(
                "low water mark {} must be below high water mark {}",
                self.low_water, self.high_water
            )));
        }
        Ok(())
    }
}

/// Complete configuration of a [`FuelVm`](crate::FuelVm) and its default
/// collaborators.
#[derive(Debug, Clone, Default)]
pub struct VmConfig {
    /// Tank capacity and initial level.
    pub tank: TankConfig,
    /// Refuel rate.
    pub station: StationConfig,
    /// Meter loop.
    pub meter: MeterConfig,
    /// Tier table of the default engine.
    pub tiers: FuelTiers,
}

impl VmConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tank configuration.
    pub fn with_tank(mut self, tank: TankConfig) -> Self {
        self.tank = tank;
        self
    }

    /// Set the station configuration.
    pub fn with_station(mut self, station: StationConfig) -> Self {
        self.station = station;
        self
    }

    /// Set the meter configuration.
    pub fn with_meter(mut self, meter: MeterConfig) -> Self {
        self.meter = meter;
        self
    }

    /// Set the tier table.
    pub fn with_tiers(mut self, tiers: FuelTiers) -> Self {
        self.tiers = tiers;
        self
    }

    /// Check every part of the configuration.
    pub fn validate(&self) -> VmResult<()> {
        self.tank.validate()?;
        self.station.validate()?;
        self.meter.validate()?;
        Ok(())
    }
}
