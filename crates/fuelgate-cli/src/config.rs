//! Configuration file support.
//!
//! Durations are given in milliseconds. Every key is optional and falls back
//! to the library default.
//!
//! ```toml
//! [tank]
//! capacity = 100000
//!
//! [station]
//! refuel_amount = 500
//! refuel_interval_ms = 100
//!
//! [meter]
//! tick_interval_ms = 500
//! low_water = 0.65
//! high_water = 0.95
//!
//! [[tiers]]
//! max_duration_ms = 1000
//! ceiling = 1000
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use fuelgate::{MeterConfig, VmConfig};
use fuelgate_core::{Fuel, FuelTiers, MAX_EXECUTION_TIME};
use fuelgate_resource::{StationConfig, TankConfig};

/// Contents of a configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub tank: TankSection,
    pub station: StationSection,
    pub meter: MeterSection,
    pub tiers: Option<Vec<TierEntry>>,
    pub absolute_max_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TankSection {
    pub capacity: u64,
    pub initial_fuel: Option<u64>,
}

impl Default for TankSection {
    fn default() -> Self {
        let defaults = TankConfig::default();
        Self {
            capacity: defaults.capacity.units(),
            initial_fuel: defaults.initial_fuel.map(Fuel::units),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationSection {
    pub refuel_amount: u64,
    pub refuel_interval_ms: u64,
}

impl Default for StationSection {
    fn default() -> Self {
        let defaults = StationConfig::default();
        Self {
            refuel_amount: defaults.refuel_amount.units(),
            refuel_interval_ms: defaults.refuel_interval.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeterSection {
    pub tick_interval_ms: u64,
    pub low_water: f64,
    pub high_water: f64,
}

impl Default for MeterSection {
    fn default() -> Self {
        let defaults = MeterConfig::default();
        Self {
            tick_interval_ms: defaults.tick_interval.as_millis() as u64,
            low_water: defaults.low_water,
            high_water: defaults.high_water,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierEntry {
    pub max_duration_ms: u64,
    pub ceiling: u64,
}

impl FileConfig {
    /// Load the file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Convert into the scheduler configuration.
    pub fn into_vm_config(self) -> VmConfig {
        let mut tank = TankConfig::new(Fuel::new(self.tank.capacity));
        tank.initial_fuel = self.tank.initial_fuel.map(Fuel::new);

        let station = StationConfig::new(
            Fuel::new(self.station.refuel_amount),
            Duration::from_millis(self.station.refuel_interval_ms),
        );

        let meter = MeterConfig::new()
            .with_tick_interval(Duration::from_millis(self.meter.tick_interval_ms))
            .with_marks(self.meter.low_water, self.meter.high_water);

        let tiers = match self.tiers {
            Some(entries) => FuelTiers::new(entries.into_iter().map(|entry| {
                (
                    Duration::from_millis(entry.max_duration_ms),
                    Fuel::new(entry.ceiling),
                )
            })),
            None => FuelTiers::default(),
        };
        let tiers = tiers.with_absolute_max(
            self.absolute_max_ms
                .map(Duration::from_millis)
                .unwrap_or(MAX_EXECUTION_TIME),
        );

        VmConfig::new()
            .with_tank(tank)
            .with_station(station)
            .with_meter(meter)
            .with_tiers(tiers)
    }
}
