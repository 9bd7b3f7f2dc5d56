//! The task submission contract: what a caller hands to the wheel.

use crate::common::TaskId;
use crate::wheel::TimingWheel;
use std::fmt;

/// The invocable effect of a task.
///
/// The effect receives the hierarchy it fired from and the task's own id, so
/// it may re-enter the public API while firing: add new tasks, cancel other
/// tasks, cancel itself with `remove_task`, or pick its own next fire time
/// with `schedule`.
pub type TaskEffect = Box<dyn FnMut(&mut TimingWheel, TaskId) -> anyhow::Result<()> + Send + Sync>;

/// A unit of deferred, possibly-repeating work.
///
/// `loop_count` follows the classic wheel convention: negative repeats
/// forever, `0` and `1` both fire exactly once, `N > 1` fires `N` times.
/// After every repeated firing the next fire time advances by
/// `loop_interval` virtual units.
pub struct TimerTask {
    effect: Option<TaskEffect>,
    loop_count: i32,
    loop_interval: u64,
    label: Option<String>,
}

impl TimerTask {
    /// A task that fires exactly once.
    pub fn once(
        effect: impl FnMut(&mut TimingWheel, TaskId) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::new(1, 0, effect)
    }

    /// A task that fires `times` times, `interval` virtual units apart.
    pub fn repeating(
        times: u32,
        interval: u64,
        effect: impl FnMut(&mut TimingWheel, TaskId) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::new(times as i32, interval, effect)
    }

    /// A task that fires forever, `interval` virtual units apart.
    pub fn perpetual(
        interval: u64,
        effect: impl FnMut(&mut TimingWheel, TaskId) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::new(-1, interval, effect)
    }

    fn new(
        loop_count: i32,
        loop_interval: u64,
        effect: impl FnMut(&mut TimingWheel, TaskId) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            effect: Some(Box::new(effect)),
            loop_count,
            loop_interval,
            label: None,
        }
    }

    /// Attaches a human-readable tag used only for logging and events.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn loop_count(&self) -> i32 {
        self.loop_count
    }

    pub fn set_loop_count(&mut self, loop_count: i32) {
        self.loop_count = loop_count;
    }

    pub fn loop_interval(&self) -> u64 {
        self.loop_interval
    }

    pub fn set_loop_interval(&mut self, loop_interval: u64) {
        self.loop_interval = loop_interval;
    }

    /// Whether the task would ever fire a second time.
    pub(crate) fn repeats(&self) -> bool {
        self.loop_count < 0 || self.loop_count > 1
    }

    /// Applies one firing to the loop counter and reports whether another
    /// firing remains.
    pub(crate) fn advance_loop(&mut self) -> bool {
        if self.loop_count < 0 {
            return true;
        }
        if self.loop_count > 1 {
            self.loop_count -= 1;
            return true;
        }
        false
    }

    /// The effect is taken out for the duration of its invocation; a task
    /// whose effect is absent is mid-fire and must not be fired again.
    pub(crate) fn take_effect(&mut self) -> Option<TaskEffect> {
        self.effect.take()
    }

    pub(crate) fn put_effect(&mut self, effect: TaskEffect) {
        self.effect = Some(effect);
    }

    /// Rewraps the effect, e.g. to tap every firing for event broadcasting.
    pub(crate) fn map_effect(mut self, f: impl FnOnce(TaskEffect) -> TaskEffect) -> Self {
        self.effect = self.effect.map(f);
        self
    }
}

impl fmt::Debug for TimerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerTask")
            .field("loop_count", &self.loop_count)
            .field("loop_interval", &self.loop_interval)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
