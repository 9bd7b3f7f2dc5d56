//! Error types for wheel construction, scheduling, and tick advancement.

use crate::common::TaskId;
use thiserror::Error;

/// Structural errors raised while constructing or extending a hierarchy.
///
/// These reject the malformed call outright; a wheel is never left in a
/// half-built state.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("slot count must be non-zero")]
    ZeroSlotCount,

    #[error("tick span must be non-zero")]
    ZeroTickSpan,

    /// Cascading between levels is recursive, so the chain height is capped
    /// at construction time.
    #[error("hierarchy height is capped at {max} levels")]
    HeightExceeded { max: usize },

    #[error("tick span times slot count overflows the time range")]
    SpanOverflow,
}

/// Errors raised by the per-task scheduling operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The task already holds a registry record; re-arming it would give it
    /// two simultaneous slots.
    #[error("task is already scheduled")]
    AlreadyScheduled,

    /// The id names no live task.
    #[error("task is not scheduled")]
    NotScheduled,

    /// The requested delay exceeds what the constructed hierarchy can
    /// represent. Build taller (see `build_parent`) or shorten the delay.
    #[error("delay of {delay} exceeds the outermost wheel span of {span}")]
    CapacityExceeded { delay: u64, span: u64 },

    /// A repeating task with a zero loop interval would fire forever within
    /// a single tick.
    #[error("repeating task requires a non-zero loop interval")]
    ZeroLoopInterval,

    /// The task's own effect failed during an immediate (zero-delay) firing.
    /// The task has been retired; the wheel itself is unaffected.
    #[error("task effect failed: {0}")]
    Effect(anyhow::Error),
}

/// One task effect failure observed during a tick drain.
#[derive(Debug)]
pub struct TaskFailure {
    pub task: TaskId,
    pub error: anyhow::Error,
}

impl TaskFailure {
    pub(crate) fn new(task: TaskId, error: ScheduleError) -> Self {
        let error = match error {
            ScheduleError::Effect(source) => source,
            other => anyhow::Error::new(other),
        };
        Self { task, error }
    }
}

/// Returned by `advance` after the tick's drains have fully completed.
///
/// A failing task never prevents its siblings from running; every failure of
/// the applied ticks is collected here instead.
#[derive(Debug, Error)]
#[error("{} task effect(s) failed while advancing", .failures.len())]
pub struct AdvanceError {
    pub failures: Vec<TaskFailure>,
}
