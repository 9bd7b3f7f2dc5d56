//! Configuration structures for the scheduler.
//!
//! These structs are designed to be deserialized from a configuration file
//! (e.g. a TOML file) using `serde`, so the wheel geometry and the real-time
//! driver's speed can be defined externally from the application code.

use crate::calendar::MILLIS_PER_SECOND;
use crate::error::BuildError;
use crate::wheel::TimingWheel;
use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration for a [`WheelDriver`](crate::driver::WheelDriver).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerConfig {
    /// Geometry of the wheel hierarchy.
    #[serde(default)]
    pub wheel: WheelConfig,

    /// Tick speed of the real-time clock that drives the wheel.
    #[serde(default)]
    pub resolution: ClockResolution,
}

/// Geometry of one wheel hierarchy: the base ring plus the ladder of outer
/// rings stacked on top of it.
#[derive(Debug, Clone, Deserialize)]
pub struct WheelConfig {
    /// Slot count of the finest ring.
    pub slot_count: usize,

    /// Virtual units represented by one slot of the finest ring.
    pub tick_span: u64,

    /// Virtual time the hierarchy starts at.
    #[serde(default)]
    pub start_time: u64,

    /// Slot counts of the outer rings, innermost first. Each outer ring's
    /// tick span is the whole span of the ring beneath it.
    #[serde(default)]
    pub parents: Vec<usize>,
}

impl WheelConfig {
    /// Constructs the hierarchy this configuration describes.
    pub fn build(&self) -> Result<TimingWheel, BuildError> {
        let mut wheel = TimingWheel::new(self.slot_count, self.tick_span, self.start_time)?;
        wheel.build_parent(&self.parents)?;
        Ok(wheel)
    }

    /// The clock-face ladder: a 60-slot ring of one-second ticks, an outer
    /// minute ring, and an outer hour ring — covering a full day with
    /// one-second precision (1 virtual unit = 1 millisecond).
    pub fn clock_face() -> Self {
        Self {
            slot_count: 60,
            tick_span: MILLIS_PER_SECOND,
            start_time: 0,
            parents: vec![60, 24],
        }
    }
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self::clock_face()
    }
}

/// Operational speed of the real-time clock driver.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockResolution {
    /// ~60 ticks per second. Suitable for frame-locked applications.
    High,
    /// ~30 ticks per second. Suitable for general purpose scheduling.
    Medium,
    /// 1 tick per second. Suitable for coarse, strategic workloads.
    Low,
    /// A user-defined speed in ticks per second.
    Custom { ticks_per_second: u64 },
}

impl ClockResolution {
    /// Real-time period between two driver ticks.
    pub fn period(&self) -> Duration {
        match self {
            ClockResolution::High => Duration::from_millis(1000 / 60),
            ClockResolution::Medium => Duration::from_millis(1000 / 30),
            ClockResolution::Low => Duration::from_secs(1),
            ClockResolution::Custom { ticks_per_second } => {
                Duration::from_millis(1000 / (*ticks_per_second).max(1))
            }
        }
    }
}

impl Default for ClockResolution {
    fn default() -> Self {
        ClockResolution::Medium
    }
}
