//! Public event types broadcast by the driver layer.
//!
//! The synchronous core never broadcasts anything; these events are produced
//! by [`SystemClock`](crate::time::SystemClock) and
//! [`WheelDriver`](crate::driver::WheelDriver) so applications can observe
//! scheduler activity without polling.

use crate::common::TaskId;
use tokio::time::Instant;

/// One tick of the real-time clock source.
#[derive(Debug, Clone)]
pub struct TickEvent {
    /// Monotonic counter, starting at 1 for the first tick.
    pub tick_count: u64,
    /// Real milliseconds elapsed since the clock started.
    pub elapsed_millis: u64,
    /// Instant the tick was produced.
    pub timestamp: Instant,
}

/// Lifecycle events of the driver itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when the driver's run loop begins.
    ClockStarted { timestamp: Instant },
    /// Fired once when the driver's run loop is about to exit.
    ClockShutdown,
}

/// Events related to individual scheduled tasks.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// A task was successfully registered with the wheel.
    Scheduled { id: TaskId },
    /// A task's effect ran to completion.
    Fired { id: TaskId, virtual_time: u64 },
    /// A task was cancelled before firing.
    Cancelled { id: TaskId },
    /// A task's effect failed; the task has been retired.
    Failed { id: TaskId, message: String },
}
