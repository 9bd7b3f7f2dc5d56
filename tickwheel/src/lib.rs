//! # Tickwheel
//!
//! A hierarchical timing-wheel scheduler for Rust.
//!
//! Tickwheel tracks large numbers of deferred, possibly-repeating tasks and
//! fires them as a virtual clock advances, with O(1) amortized insertion,
//! cancellation, and per-tick dispatch instead of a sorted-timer structure's
//! O(log n) operations.
//!
//! ## Core Concepts
//!
//! - **TimingWheel**: a chain of slot rings at increasing granularities
//!   sharing one task registry and one node arena. Coarse rings hold distant
//!   tasks; as time approaches, tasks cascade down to finer rings and fire
//!   from the finest one.
//! - **Virtual time**: the wheel advances only when told to, in integer
//!   units of caller-defined meaning. Deterministic by construction —
//!   advance it from a frame loop, a test, or the bundled real-time driver.
//! - **Re-entrancy**: a firing task's effect receives the wheel itself and
//!   may add, cancel, or reschedule tasks — including its own.
//! - **Configuration-Driven**: wheel geometry and driver speed are plain
//!   serde structs, typically loaded from a TOML file.
//!
//! ## Example Usage
//!
//! ```rust
//! use tickwheel::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     // A base ring of 10 one-unit slots with a 6-slot outer ring.
//!     let mut wheel = TimingWheel::new(10, 1, 0)?;
//!     wheel.build_parent(&[6])?;
//!
//!     // Fire once, 25 units from now.
//!     let id = wheel.add_task(
//!         TimerTask::once(|_, _| {
//!             println!("25 units have passed!");
//!             Ok(())
//!         }),
//!         25,
//!     )?;
//!
//!     // The hosting application decides when and how far time moves.
//!     wheel.advance(30)?;
//!     assert!(!wheel.contains_task(id));
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Tickwheel Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod calendar;
pub mod common;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
mod pool;
pub mod task;
pub mod time;
pub mod wheel;

/// A prelude module for easy importing of the most common Tickwheel types.
pub mod prelude {
    pub use crate::common::TaskId;
    pub use crate::config::{ClockResolution, SchedulerConfig, WheelConfig};
    pub use crate::driver::WheelDriver;
    pub use crate::error::{AdvanceError, BuildError, ScheduleError};
    pub use crate::events::{SystemEvent, TaskEvent, TickEvent};
    pub use crate::task::{TaskEffect, TimerTask};
    pub use crate::wheel::TimingWheel;
}
