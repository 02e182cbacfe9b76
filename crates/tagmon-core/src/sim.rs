//! Synthetic value generation policies.

#![allow(missing_docs)]

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use smol_str::SmolStr;

/// Inclusive bound pair for simulated values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub low: f64,
    pub high: f64,
}

impl ValueRange {
    #[must_use]
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    #[must_use]
    pub fn clamp(self, value: f64) -> f64 {
        value.clamp(self.low, self.high)
    }

    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Both bounds finite and not inverted. NaN bounds slip past plain
    /// ordering comparisons, so sampling code must not see them.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low <= self.high
    }

    #[must_use]
    pub fn midpoint(self) -> f64 {
        self.low + (self.high - self.low) / 2.0
    }
}

/// Range the simulator falls back to for unrecognized tag names.
pub const GENERIC_RANGE: ValueRange = ValueRange::new(0.0, 100.0);

/// Uniform draw ranges keyed by tag name, used by the store's tick.
#[derive(Debug, Clone)]
pub struct SimProfile {
    ranges: IndexMap<SmolStr, ValueRange>,
    default_range: ValueRange,
}

impl SimProfile {
    /// Profile with no per-tag entries; everything draws from `default_range`.
    #[must_use]
    pub fn empty(default_range: ValueRange) -> Self {
        Self {
            ranges: IndexMap::new(),
            default_range,
        }
    }

    /// Register or replace the draw range for one tag name.
    pub fn set(&mut self, name: impl Into<SmolStr>, range: ValueRange) {
        self.ranges.insert(name.into(), range);
    }

    /// Draw range for a tag; unrecognized names use the default range.
    #[must_use]
    pub fn range_for(&self, name: &str) -> ValueRange {
        self.ranges.get(name).copied().unwrap_or(self.default_range)
    }
}

impl Default for SimProfile {
    /// The stock telemetry classes of the monitor.
    fn default() -> Self {
        let mut profile = Self::empty(GENERIC_RANGE);
        profile.set("Voltage", ValueRange::new(190.0, 240.0));
        profile.set("Current", ValueRange::new(1.0, 10.0));
        profile.set("Power", ValueRange::new(500.0, 2400.0));
        profile
    }
}

/// Random-walk policy for the registry-side updater: each step draws a
/// delta, scales it, and clamps the result to per-class bounds.
#[derive(Debug, Clone)]
pub struct DriftProfile {
    bounds: IndexMap<SmolStr, ValueRange>,
    default_bounds: ValueRange,
    step: ValueRange,
    scale: f64,
}

impl DriftProfile {
    #[must_use]
    pub fn empty(default_bounds: ValueRange, step: ValueRange, scale: f64) -> Self {
        Self {
            bounds: IndexMap::new(),
            default_bounds,
            step,
            scale,
        }
    }

    /// Register or replace the clamp bounds for one tag name.
    pub fn set(&mut self, name: impl Into<SmolStr>, bounds: ValueRange) {
        self.bounds.insert(name.into(), bounds);
    }

    /// Clamp bounds for a tag; unrecognized names use the default bounds.
    #[must_use]
    pub fn bounds_for(&self, name: &str) -> ValueRange {
        self.bounds.get(name).copied().unwrap_or(self.default_bounds)
    }

    /// Next value of the walk for `name`, starting from `current`.
    pub fn next(&self, generator: &mut dyn ValueGenerator, name: &str, current: f64) -> f64 {
        let delta = generator.sample(self.step) * self.scale;
        self.bounds_for(name).clamp(current + delta)
    }
}

impl Default for DriftProfile {
    /// Clamp bounds of the stock sensor classes.
    fn default() -> Self {
        let mut profile = Self::empty(GENERIC_RANGE, ValueRange::new(-2.5, 2.5), 0.05);
        profile.set("Temperature", ValueRange::new(15.0, 35.0));
        profile.set("Humidity", ValueRange::new(30.0, 80.0));
        profile.set("Pressure", ValueRange::new(980.0, 1040.0));
        profile.set("Voltage", ValueRange::new(210.0, 250.0));
        profile.set("Current", ValueRange::new(0.0, 10.0));
        profile.set("Power", ValueRange::new(0.0, 2500.0));
        profile
    }
}

/// Injectable randomness seam so tests can swap in a deterministic source.
pub trait ValueGenerator: Send {
    /// Draw a value from the inclusive range.
    fn sample(&mut self, range: ValueRange) -> f64;
}

/// Uniform generator backed by `StdRng`.
#[derive(Debug)]
pub struct UniformGenerator {
    rng: StdRng,
}

impl UniformGenerator {
    /// Generator seeded from the operating system.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Reproducible generator for tests and replays.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for UniformGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueGenerator for UniformGenerator {
    fn sample(&mut self, range: ValueRange) -> f64 {
        if range.low >= range.high {
            return range.low;
        }
        self.rng.random_range(range.low..=range.high)
    }
}

/// Deterministic generator returning range midpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidpointGenerator;

impl ValueGenerator for MidpointGenerator {
    fn sample(&mut self, range: ValueRange) -> f64 {
        range.midpoint()
    }
}
