//! Configuration for the in-process engine.

use crate::fuel::FuelTiers;

/// Configuration for a [`LocalEngine`](crate::engine::LocalEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tier table deciding how long each execution may run.
    pub tiers: FuelTiers,

    /// Abort executions that outlive their tier.
    ///
    /// Disabling this is only useful for tests that need unbounded bodies.
    pub enforce_timeout: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tiers: FuelTiers::default(),
            enforce_timeout: true,
        }
    }
}

impl EngineConfig {
    /// Create an engine configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom tier table.
    pub fn with_tiers(mut self, tiers: FuelTiers) -> Self {
        self.tiers = tiers;
        self
    }

    /// Enable or disable per-execution timeouts.
    pub fn with_timeout_enforced(mut self, enabled: bool) -> Self {
        self.enforce_timeout = enabled;
        self
    }
}
