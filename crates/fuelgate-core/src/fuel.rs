//! The fuel unit and the fuel tier table.
//!
//! Fuel is the currency every execution pays with. It is derived from
//! wall-clock time: one unit per started millisecond. The tier table maps a
//! contract's fuel ceiling to the longest execution the engine will allow.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Wall-clock time bought by a single unit of fuel.
pub const FUEL_UNIT: Duration = Duration::from_millis(1);

/// Longest execution allowed for contracts above every tier.
pub const MAX_EXECUTION_TIME: Duration = Duration::from_secs(60);

/// An amount of fuel.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Fuel(u64);

impl Fuel {
    /// No fuel at all.
    pub const ZERO: Fuel = Fuel(0);

    /// The largest representable amount.
    pub const MAX: Fuel = Fuel(u64::MAX);

    /// Create an amount of fuel.
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// Raw number of units.
    pub const fn units(self) -> u64 {
        self.0
    }

    /// Check whether this is zero fuel.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Fuel needed to pay for `elapsed` wall-clock time.
    ///
    /// Every started [`FUEL_UNIT`] costs a full unit, so any non-zero
    /// duration costs at least one unit. Saturates at [`Fuel::MAX`].
    pub fn from_duration(elapsed: Duration) -> Self {
        let unit = FUEL_UNIT.as_nanos();
        let units = elapsed.as_nanos().div_ceil(unit);
        Self(u64::try_from(units).unwrap_or(u64::MAX))
    }

    /// Wall-clock time this amount of fuel pays for.
    pub fn as_duration(self) -> Duration {
        FUEL_UNIT.saturating_mul(u32::try_from(self.0).unwrap_or(u32::MAX))
    }

    /// Subtract, returning `None` when `rhs` is larger.
    pub fn checked_sub(self, rhs: Fuel) -> Option<Fuel> {
        self.0.checked_sub(rhs.0).map(Fuel)
    }

    /// Add, returning `None` on overflow.
    pub fn checked_add(self, rhs: Fuel) -> Option<Fuel> {
        self.0.checked_add(rhs.0).map(Fuel)
    }

    /// Subtract, clamping at zero.
    pub fn saturating_sub(self, rhs: Fuel) -> Fuel {
        Fuel(self.0.saturating_sub(rhs.0))
    }

    /// Add, clamping at [`Fuel::MAX`].
    pub fn saturating_add(self, rhs: Fuel) -> Fuel {
        Fuel(self.0.saturating_add(rhs.0))
    }

    /// This amount as a fraction of `whole`, in `[0.0, 1.0]` when `self <= whole`.
    pub fn fraction_of(self, whole: Fuel) -> f64 {
        if whole.is_zero() {
            return 0.0;
        }
        self.0 as f64 / whole.0 as f64
    }
}

impl From<u64> for Fuel {
    fn from(units: u64) -> Self {
        Self(units)
    }
}

impl From<Fuel> for u64 {
    fn from(fuel: Fuel) -> Self {
        fuel.0
    }
}

impl fmt::Display for Fuel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single row of the tier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuelTier {
    /// Longest execution allowed within this tier.
    pub max_duration: Duration,
    /// Highest `max_fuel` that still falls into this tier.
    pub ceiling: Fuel,
}

/// Maps a fuel ceiling to a maximum execution time.
///
/// Tiers are kept sorted by ascending ceiling; lookups return the first tier
/// whose ceiling covers the requested fuel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuelTiers {
    tiers: Vec<FuelTier>,
    absolute_max: Duration,
}

impl Default for FuelTiers {
    fn default() -> Self {
        Self::new([
            (Duration::from_secs(1), Fuel::new(1_000)),
            (Duration::from_secs(5), Fuel::new(5_000)),
            (Duration::from_secs(10), Fuel::new(10_000)),
            (Duration::from_secs(30), Fuel::new(30_000)),
        ])
    }
}

impl FuelTiers {
    /// Build a tier table from `(max_duration, ceiling)` pairs.
    ///
    /// The pairs may be given in any order.
    pub fn new(tiers: impl IntoIterator<Item = (Duration, Fuel)>) -> Self {
        let mut tiers: Vec<FuelTier> = tiers
            .into_iter()
            .map(|(max_duration, ceiling)| FuelTier {
                max_duration,
                ceiling,
            })
            .collect();
        tiers.sort_by_key(|tier| tier.ceiling);

        Self {
            tiers,
            absolute_max: MAX_EXECUTION_TIME,
        }
    }

    /// Override the duration used when no tier matches.
    pub fn with_absolute_max(mut self, absolute_max: Duration) -> Self {
        self.absolute_max = absolute_max;
        self
    }

    /// Duration used when no tier matches.
    pub fn absolute_max(&self) -> Duration {
        self.absolute_max
    }

    /// The tiers in ascending ceiling order.
    pub fn tiers(&self) -> &[FuelTier] {
        &self.tiers
    }

    /// Maximum execution time for a caller that pre-pays `max_fuel`.
    pub fn max_execution_time(&self, max_fuel: Fuel) -> Duration {
        self.tiers
            .iter()
            .find(|tier| max_fuel <= tier.ceiling)
            .map(|tier| tier.max_duration)
            .unwrap_or(self.absolute_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuel_from_duration_rounds_up() {
        assert_eq!(Fuel::from_duration(Duration::ZERO), Fuel::ZERO);
        assert_eq!(Fuel::from_duration(Duration::from_micros(1)), Fuel::new(1));
        assert_eq!(Fuel::from_duration(Duration::from_millis(1)), Fuel::new(1));
        assert_eq!(Fuel::from_duration(Duration::from_micros(1_001)), Fuel::new(2));
        assert_eq!(Fuel::from_duration(Duration::from_secs(2)), Fuel::new(2_000));
    }

    #[test]
    fn test_fuel_from_duration_is_monotonic() {
        let mut previous = Fuel::ZERO;
        for micros in (0..10_000).step_by(137) {
            let fuel = Fuel::from_duration(Duration::from_micros(micros));
            assert!(fuel >= previous);
            previous = fuel;
        }
    }

    #[test]
    fn test_fuel_as_duration() {
        assert_eq!(Fuel::ZERO.as_duration(), Duration::ZERO);
        assert_eq!(Fuel::new(3).as_duration(), Duration::from_millis(3));
        assert_eq!(Fuel::from_duration(Fuel::new(250).as_duration()), Fuel::new(250));
        assert_eq!(Fuel::MAX.as_duration(), FUEL_UNIT * u32::MAX);
    }

    #[test]
    fn test_fuel_from_huge_duration_saturates() {
        assert_eq!(Fuel::from_duration(Duration::MAX), Fuel::MAX);
    }

    #[test]
    fn test_fuel_arithmetic() {
        let a = Fuel::new(10);
        let b = Fuel::new(25);

        assert_eq!(a.checked_sub(b), None);
        assert_eq!(b.checked_sub(a), Some(Fuel::new(15)));
        assert_eq!(a.saturating_sub(b), Fuel::ZERO);
        assert_eq!(Fuel::MAX.saturating_add(a), Fuel::MAX);
        assert_eq!(Fuel::MAX.checked_add(a), None);
    }

    #[test]
    fn test_fraction_of() {
        assert_eq!(Fuel::new(50).fraction_of(Fuel::new(200)), 0.25);
        assert_eq!(Fuel::new(50).fraction_of(Fuel::ZERO), 0.0);
    }

    #[test]
    fn test_tier_lookup_first_match_wins() {
        let tiers = FuelTiers::new([
            (Duration::from_secs(10), Fuel::new(2_000)),
            (Duration::from_secs(1), Fuel::new(100)),
            (Duration::from_secs(5), Fuel::new(500)),
        ]);

        assert_eq!(tiers.max_execution_time(Fuel::new(300)), Duration::from_secs(5));
        assert_eq!(tiers.max_execution_time(Fuel::new(100)), Duration::from_secs(1));
        assert_eq!(tiers.max_execution_time(Fuel::new(1)), Duration::from_secs(1));
        assert_eq!(tiers.max_execution_time(Fuel::new(2_000)), Duration::from_secs(10));
    }

    #[test]
    fn test_tier_lookup_above_all_tiers() {
        let tiers = FuelTiers::new([
            (Duration::from_secs(1), Fuel::new(100)),
            (Duration::from_secs(5), Fuel::new(500)),
            (Duration::from_secs(10), Fuel::new(2_000)),
        ]);

        assert_eq!(tiers.max_execution_time(Fuel::new(5_000)), MAX_EXECUTION_TIME);

        let tiers = tiers.with_absolute_max(Duration::from_secs(15));
        assert_eq!(tiers.max_execution_time(Fuel::new(5_000)), Duration::from_secs(15));
    }

    #[test]
    fn test_default_tiers_match_fuel_unit() {
        let tiers = FuelTiers::default();
        for tier in tiers.tiers() {
            assert_eq!(Fuel::from_duration(tier.max_duration), tier.ceiling);
        }
    }
}
