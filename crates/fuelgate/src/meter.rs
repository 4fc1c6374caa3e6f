//! Hysteresis control of engine admission.
//!
//! The meter compares the share of tank capacity in use against two marks.
//! Because the pause and resume marks differ, a balance hovering near one of
//! them does not make the engine flap between states.

use fuelgate_core::EngineState;
use fuelgate_resource::FuelStat;

use crate::config::MeterConfig;

/// Transition requested by a meter tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterAction {
    /// Usage reached the high water mark.
    Pause,
    /// Usage fell back to the low water mark.
    Resume,
}

/// The pause/resume decision rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meter {
    low_water: f64,
    high_water: f64,
}

impl Meter {
    /// Create a meter from its configuration.
    pub fn new(config: &MeterConfig) -> Self {
        Self {
            low_water: config.low_water,
            high_water: config.high_water,
        }
    }

    /// Resume mark.
    pub fn low_water(&self) -> f64 {
        self.low_water
    }

    /// Pause mark.
    pub fn high_water(&self) -> f64 {
        self.high_water
    }

    /// Decide what to do given the engine state and a tank snapshot.
    pub fn decide(&self, state: EngineState, stat: &FuelStat) -> Option<MeterAction> {
        self.decide_usage(state, stat.used_fraction())
    }

    /// Decide what to do given the engine state and the fraction of capacity
    /// in use.
    pub fn decide_usage(&self, state: EngineState, used: f64) -> Option<MeterAction> {
        match state {
            EngineState::Running if used >= self.high_water => Some(MeterAction::Pause),
            EngineState::Paused if used <= self.low_water => Some(MeterAction::Resume),
            _ => None,
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new(&MeterConfig::default())
    }
}
