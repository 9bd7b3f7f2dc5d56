//! The multi-level timing-wheel engine.
//!
//! A [`TimingWheel`] is a chain of rings ("levels") sharing one task store,
//! one registry, and one node arena. Level 0 is the finest; each outer level
//! has a tick span equal to the whole span of the level beneath it, so time
//! delegated outward is expressed in units the outer ring can slot directly.
//!
//! Tasks are slotted at the first tick boundary of a level at or after their
//! fire time. An outer ring is advanced by one of its own ticks at the start
//! of each inner revolution, which means it runs one coarse tick ahead of the
//! inner ring's position: every outer drain deposits exactly the tasks of the
//! coarse window the inner ring is about to sweep, and a demoted task always
//! fits the inner ring.
//!
//! The whole structure is single-threaded and synchronous. Task effects run
//! inline during `advance` and may re-enter the public API, including
//! cancelling or rescheduling the very task that is firing.

use crate::common::{NodeId, TaskId};
use crate::error::{AdvanceError, BuildError, ScheduleError, TaskFailure};
use crate::pool::NodePool;
use crate::task::TimerTask;
use slotmap::{SecondaryMap, SlotMap};
use tracing::{debug, trace};

/// Cascading walks the level chain recursively, so its height is capped.
const MAX_HEIGHT: usize = 8;

/// Bookkeeping for one scheduled task: where it currently lives and when it
/// intends to fire. The registry is the single source of truth for removal;
/// nothing is stored on the task itself.
#[derive(Debug, Clone, Copy)]
struct TaskRecord {
    next_fire: u64,
    level: usize,
    slot: usize,
    node: NodeId,
}

/// One bucket of a ring: an index-linked FIFO list of pending tasks.
#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

/// One ring of slots at a fixed tick granularity.
#[derive(Debug)]
struct Level {
    slots: Vec<Slot>,
    tick_span: u64,
    wheel_span: u64,
    /// Virtual time the current revolution began.
    start_time: u64,
    /// Virtual time of the last tick boundary this ring crossed.
    current_time: u64,
    /// Pointer into the slot array; the slot at `cursor` was drained last.
    cursor: usize,
}

impl Level {
    fn new(slot_count: usize, tick_span: u64, start_time: u64) -> Result<Self, BuildError> {
        if slot_count == 0 {
            return Err(BuildError::ZeroSlotCount);
        }
        if tick_span == 0 {
            return Err(BuildError::ZeroTickSpan);
        }
        let wheel_span = tick_span
            .checked_mul(slot_count as u64)
            .ok_or(BuildError::SpanOverflow)?;
        Ok(Self {
            slots: vec![Slot::default(); slot_count],
            tick_span,
            wheel_span,
            start_time,
            current_time: start_time,
            cursor: 0,
        })
    }

    fn push_back(&mut self, pool: &mut NodePool, slot_idx: usize, node: NodeId) {
        let slot = &mut self.slots[slot_idx];
        pool[node].prev = slot.tail;
        pool[node].next = None;
        match slot.tail {
            Some(tail) => pool[tail].next = Some(node),
            None => slot.head = Some(node),
        }
        slot.tail = Some(node);
        slot.len += 1;
    }

    fn unlink(&mut self, pool: &mut NodePool, slot_idx: usize, node: NodeId) {
        let (prev, next) = {
            let entry = &pool[node];
            (entry.prev, entry.next)
        };
        let slot = &mut self.slots[slot_idx];
        match prev {
            Some(prev) => pool[prev].next = next,
            None => slot.head = next,
        }
        match next {
            Some(next) => pool[next].prev = prev,
            None => slot.tail = prev,
        }
        slot.len -= 1;
    }
}

/// The hierarchy: a chain of levels, the shared task store and registry, the
/// node arena, and the virtual clock.
///
/// See the [module docs](self) for the slotting and cascading rules.
#[derive(Debug)]
pub struct TimingWheel {
    /// Index 0 is the finest ring; `levels[i + 1]` is the outer neighbor of
    /// `levels[i]`.
    levels: Vec<Level>,
    tasks: SlotMap<TaskId, TimerTask>,
    records: SecondaryMap<TaskId, TaskRecord>,
    pool: NodePool,
    /// Accumulated virtual timestamp, including any buffered sub-tick
    /// remainder not yet applied as whole ticks.
    clock: u64,
}

impl TimingWheel {
    /// Creates a hierarchy with a single (finest) level.
    ///
    /// `tick_span` is in integer virtual units of caller-defined meaning;
    /// every delay and loop interval uses the same unit.
    pub fn new(slot_count: usize, tick_span: u64, start_time: u64) -> Result<Self, BuildError> {
        let base = Level::new(slot_count, tick_span, start_time)?;
        debug!(slot_count, tick_span, start_time, "timing wheel created");
        Ok(Self {
            levels: vec![base],
            tasks: SlotMap::with_key(),
            records: SecondaryMap::new(),
            pool: NodePool::new(),
            clock: start_time,
        })
    }

    /// Extends the chain upward by one outer level per supplied slot count.
    ///
    /// Each new level's tick span equals the current top level's wheel span
    /// and it shares this hierarchy's registry and arena. Positions that
    /// already have an outer level are descended into rather than duplicated,
    /// so repeating a call with the same counts is a no-op.
    pub fn build_parent(&mut self, slot_counts: &[usize]) -> Result<(), BuildError> {
        let mut position = 0;
        for &slot_count in slot_counts {
            if position + 1 < self.levels.len() {
                position += 1;
                continue;
            }
            if self.levels.len() >= MAX_HEIGHT {
                return Err(BuildError::HeightExceeded { max: MAX_HEIGHT });
            }
            let top = &self.levels[self.levels.len() - 1];
            let level = Level::new(slot_count, top.wheel_span, top.start_time)?;
            debug!(
                slot_count,
                tick_span = level.tick_span,
                "hierarchy extended with outer level"
            );
            self.levels.push(level);
            position += 1;
        }
        Ok(())
    }

    /// Schedules `task` to fire `start_delay` virtual units from now.
    ///
    /// A zero delay fires the task inline before this returns. The returned
    /// id stays valid until the task fires for the last time or is removed;
    /// for a zero-delay one-shot it is therefore already retired on return.
    ///
    /// On any error the task value is not retained.
    pub fn add_task(&mut self, task: TimerTask, start_delay: u64) -> Result<TaskId, ScheduleError> {
        if task.repeats() && task.loop_interval() == 0 {
            return Err(ScheduleError::ZeroLoopInterval);
        }
        let next_fire = self.levels[0]
            .current_time
            .checked_add(start_delay)
            .ok_or(ScheduleError::CapacityExceeded {
                delay: start_delay,
                span: self.total_span(),
            })?;
        let id = self.tasks.insert(task);
        trace!(?id, start_delay, "task added");
        match self.insert_at(0, id, next_fire) {
            Ok(()) => Ok(id),
            Err(err) => {
                self.tasks.remove(id);
                Err(err)
            }
        }
    }

    /// Re-arms the task that is currently firing with a caller-chosen delay,
    /// overriding its loop interval for this repetition.
    ///
    /// Only meaningful from inside the task's own effect: a task that is
    /// sitting in a slot is [`AlreadyScheduled`](ScheduleError::AlreadyScheduled),
    /// and an id that names no live task is
    /// [`NotScheduled`](ScheduleError::NotScheduled).
    pub fn schedule(&mut self, id: TaskId, start_delay: u64) -> Result<(), ScheduleError> {
        if self.records.contains_key(id) {
            return Err(ScheduleError::AlreadyScheduled);
        }
        if !self.tasks.contains_key(id) {
            return Err(ScheduleError::NotScheduled);
        }
        let next_fire = self.levels[0]
            .current_time
            .checked_add(start_delay)
            .ok_or(ScheduleError::CapacityExceeded {
                delay: start_delay,
                span: self.total_span(),
            })?;
        self.insert_at(0, id, next_fire)
    }

    /// Cancels a pending task. O(1); once this returns `true` the task will
    /// not fire from this hierarchy again.
    ///
    /// Calling it from inside the task's own effect cancels the pending
    /// reschedule. An absent id is a `false` no-op.
    pub fn remove_task(&mut self, id: TaskId) -> bool {
        if let Some(record) = self.records.remove(id) {
            let (levels, pool) = (&mut self.levels, &mut self.pool);
            levels[record.level].unlink(pool, record.slot, record.node);
            pool.release(record.node);
            self.tasks.remove(id);
            trace!(?id, "task cancelled");
            true
        } else if self.tasks.remove(id).is_some() {
            // mid-fire: the entry is dropped so the post-fire pass cannot
            // reschedule it
            trace!(?id, "task cancelled while firing");
            true
        } else {
            false
        }
    }

    /// Whether `id` currently holds a registry record. A task that is in the
    /// middle of firing is not considered scheduled until its reschedule (if
    /// any) lands.
    pub fn contains_task(&self, id: TaskId) -> bool {
        self.records.contains_key(id)
    }

    /// Unlinks and releases every task in the hierarchy. Used for teardown.
    pub fn clear_tasks(&mut self) {
        for level in &mut self.levels {
            for slot in &mut level.slots {
                *slot = Slot::default();
            }
        }
        self.records.clear();
        self.pool.clear();
        self.tasks.clear();
        debug!("all tasks cleared");
    }

    /// Advances the virtual clock by `elapsed` units, applying every whole
    /// tick that becomes due. The sole way time moves; it never moves
    /// backward.
    ///
    /// Sub-tick remainders are buffered, not lost, across successive calls.
    /// Task effect failures are collected and returned only after the
    /// applied ticks' drains fully complete; a failing task never stops its
    /// siblings.
    pub fn advance(&mut self, elapsed: u64) -> Result<(), AdvanceError> {
        self.clock = self.clock.saturating_add(elapsed);
        let mut failures = Vec::new();
        while self.clock - self.levels[0].current_time >= self.levels[0].tick_span {
            self.advance_level(0, &mut failures);
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AdvanceError { failures })
        }
    }

    /// Advances the virtual clock to an absolute timestamp. Timestamps at or
    /// before the current one are a no-op.
    pub fn advance_to(&mut self, timestamp: u64) -> Result<(), AdvanceError> {
        if timestamp > self.clock {
            self.advance(timestamp - self.clock)
        } else {
            Ok(())
        }
    }

    /// Advances by exactly one finest tick span.
    pub fn tick(&mut self) -> Result<(), AdvanceError> {
        self.advance(self.levels[0].tick_span)
    }

    /// Virtual time of the last finest tick boundary crossed.
    pub fn current_time(&self) -> u64 {
        self.levels[0].current_time
    }

    /// Accumulated virtual timestamp, including the buffered sub-tick
    /// remainder.
    pub fn timestamp(&self) -> u64 {
        self.clock
    }

    /// Finest tick span of the hierarchy.
    pub fn tick_span(&self) -> u64 {
        self.levels[0].tick_span
    }

    /// Span of the outermost level: the longest delay this hierarchy can
    /// accept.
    pub fn total_span(&self) -> u64 {
        self.levels[self.levels.len() - 1].wheel_span
    }

    /// Number of levels in the chain.
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    /// `(tick_span, slot_count)` per level, finest first.
    pub fn level_layout(&self) -> Vec<(u64, usize)> {
        self.levels
            .iter()
            .map(|level| (level.tick_span, level.slots.len()))
            .collect()
    }

    /// Number of currently scheduled tasks.
    pub fn scheduled_len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Routes a task to the finest level that can represent its fire time,
    /// starting the search at `li`.
    fn insert_at(&mut self, li: usize, id: TaskId, next_fire: u64) -> Result<(), ScheduleError> {
        let (current_time, tick_span, wheel_span) = {
            let level = &self.levels[li];
            (level.current_time, level.tick_span, level.wheel_span)
        };
        if next_fire <= current_time {
            // already due: fire inline, bypassing slot storage
            return self.fire_task(id, next_fire);
        }
        let delta = next_fire - current_time;
        if delta > wheel_span {
            return if li + 1 < self.levels.len() {
                self.insert_at(li + 1, id, next_fire)
            } else {
                Err(ScheduleError::CapacityExceeded {
                    delay: delta,
                    span: wheel_span,
                })
            };
        }
        if delta < tick_span && li > 0 {
            let inner = &self.levels[li - 1];
            if next_fire - inner.current_time <= inner.wheel_span {
                return self.insert_at(li - 1, id, next_fire);
            }
            // the finer ring cannot reach this far ahead yet; it stays here
            // for one more coarse pass
        }
        let level = &self.levels[li];
        let offset = next_fire - level.start_time;
        let slot_idx = (offset.div_ceil(tick_span) % level.slots.len() as u64) as usize;
        let node = self.pool.acquire(id);
        let (levels, pool) = (&mut self.levels, &mut self.pool);
        levels[li].push_back(pool, slot_idx, node);
        self.records.insert(
            id,
            TaskRecord {
                next_fire,
                level: li,
                slot: slot_idx,
                node,
            },
        );
        trace!(?id, level = li, slot = slot_idx, next_fire, "task slotted");
        Ok(())
    }

    /// The atomic unit of progress for one level.
    ///
    /// At the entry of each revolution the outer neighbor advances by exactly
    /// one of its own ticks first, depositing the coarse window this
    /// revolution is about to sweep.
    fn advance_level(&mut self, li: usize, failures: &mut Vec<TaskFailure>) {
        if self.levels[li].cursor == 0 && li + 1 < self.levels.len() {
            self.advance_level(li + 1, failures);
        }
        let cursor = {
            let level = &mut self.levels[li];
            level.current_time += level.tick_span;
            level.cursor = (level.cursor + 1) % level.slots.len();
            if level.cursor == 0 {
                level.start_time += level.wheel_span;
            }
            level.cursor
        };
        self.drain_slot(li, cursor, failures);
    }

    /// Processes every task assigned to the slot the cursor just reached.
    ///
    /// The pending count is snapshotted first: entries appended during the
    /// drain (a task rescheduling exactly one wheel span ahead lands in this
    /// very slot) belong to a future revolution and are not visited in this
    /// pass. The head is re-read each iteration, so re-entrant removals keep
    /// the walk consistent and no released node is ever dereferenced.
    fn drain_slot(&mut self, li: usize, slot_idx: usize, failures: &mut Vec<TaskFailure>) {
        let pending = self.levels[li].slots[slot_idx].len;
        for _ in 0..pending {
            let Some(node) = self.levels[li].slots[slot_idx].head else {
                break;
            };
            let id = self.pool[node].task;
            {
                let (levels, pool) = (&mut self.levels, &mut self.pool);
                levels[li].unlink(pool, slot_idx, node);
                pool.release(node);
            }
            let Some(record) = self.records.remove(id) else {
                continue;
            };
            let outcome = if li > 0 {
                // not yet due at full precision: re-home at the finer ring
                trace!(?id, from = li, "task demoted");
                self.insert_at(li - 1, id, record.next_fire)
            } else {
                self.fire_task(id, record.next_fire)
            };
            if let Err(err) = outcome {
                failures.push(TaskFailure::new(id, err));
            }
        }
    }

    /// Invokes a task's effect and applies the loop rule.
    ///
    /// The effect is taken out of the store for the duration of the call, so
    /// the effect itself can add, remove, and schedule freely; a nested
    /// attempt to fire the same task is a no-op. Afterwards, unless the
    /// effect rescheduled or removed itself, the loop counter decides
    /// between rescheduling at `fire_time + loop_interval` and retirement.
    ///
    /// A failing effect retires its task, with bookkeeping already clean, and
    /// surfaces the failure to the caller.
    fn fire_task(&mut self, id: TaskId, fire_time: u64) -> Result<(), ScheduleError> {
        let Some(mut effect) = self.tasks.get_mut(id).and_then(TimerTask::take_effect) else {
            return Ok(());
        };
        let result = effect(self, id);
        match self.tasks.get_mut(id) {
            Some(entry) => entry.put_effect(effect),
            // the effect removed its own task while firing
            None => return result.map_err(ScheduleError::Effect),
        }
        if let Err(error) = result {
            self.tasks.remove(id);
            return Err(ScheduleError::Effect(error));
        }
        if self.records.contains_key(id) {
            // the effect picked its own next fire time; honor it
            return Ok(());
        }
        let repeat = self
            .tasks
            .get_mut(id)
            .map(TimerTask::advance_loop)
            .unwrap_or(false);
        if !repeat {
            self.tasks.remove(id);
            return Ok(());
        }
        let interval = self.tasks.get(id).map(TimerTask::loop_interval).unwrap_or(0);
        let next_fire = match fire_time.checked_add(interval) {
            Some(next_fire) => next_fire,
            None => {
                self.tasks.remove(id);
                return Err(ScheduleError::CapacityExceeded {
                    delay: interval,
                    span: self.total_span(),
                });
            }
        };
        if let Err(err) = self.insert_at(0, id, next_fire) {
            self.tasks.remove(id);
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wheel(slot_count: usize, tick_span: u64) -> TimingWheel {
        TimingWheel::new(slot_count, tick_span, 0).unwrap()
    }

    /// Counts how often `id` appears across every slot list of the wheel.
    fn occurrences(wheel: &TimingWheel, id: TaskId) -> usize {
        let mut count = 0;
        for level in &wheel.levels {
            for slot in &level.slots {
                let mut cursor = slot.head;
                while let Some(node) = cursor {
                    let entry = wheel.pool.get(node).expect("linked node must resolve");
                    if entry.task == id {
                        count += 1;
                    }
                    cursor = entry.next;
                }
            }
        }
        count
    }

    #[test]
    fn rejects_malformed_construction() {
        assert!(matches!(
            TimingWheel::new(0, 1, 0),
            Err(BuildError::ZeroSlotCount)
        ));
        assert!(matches!(
            TimingWheel::new(4, 0, 0),
            Err(BuildError::ZeroTickSpan)
        ));
    }

    #[test]
    fn task_is_slotted_at_the_boundary_after_its_fire_time() {
        let mut w = wheel(8, 10);
        let id = w.add_task(TimerTask::once(|_, _| Ok(())), 25).unwrap();
        let record = w.records[id];
        // fire time 25 rounds up to boundary 30, slot 3
        assert_eq!(record.level, 0);
        assert_eq!(record.slot, 3);
        assert_eq!(record.next_fire, 25);
    }

    #[test]
    fn every_scheduled_task_lives_in_exactly_one_slot() {
        let mut w = wheel(4, 1);
        w.build_parent(&[4, 4]).unwrap();
        let ids: Vec<_> = [1u64, 3, 4, 7, 15, 16, 40, 63]
            .iter()
            .map(|&delay| w.add_task(TimerTask::once(|_, _| Ok(())), delay).unwrap())
            .collect();
        for step in 0..70 {
            for &id in &ids {
                match w.records.get(id) {
                    Some(record) => {
                        assert_eq!(occurrences(&w, id), 1, "step {step}");
                        assert!(record.next_fire >= w.current_time());
                    }
                    None => assert_eq!(occurrences(&w, id), 0, "step {step}"),
                }
            }
            w.advance(1).unwrap();
        }
        assert!(w.is_empty());
        assert_eq!(w.pool.len(), 0);
    }

    #[test]
    fn registry_and_arena_storage_is_reused_across_repetitions() {
        let mut w = wheel(4, 1);
        let id = w
            .add_task(TimerTask::perpetual(3, |_, _| Ok(())), 3)
            .unwrap();
        for _ in 0..50 {
            w.advance(1).unwrap();
            assert!(w.pool.len() <= 1);
        }
        assert!(w.contains_task(id));
        assert_eq!(w.scheduled_len(), 1);
    }

    #[test]
    fn build_parent_is_idempotent_per_position() {
        let mut w = wheel(4, 1);
        w.build_parent(&[3]).unwrap();
        w.build_parent(&[3, 5]).unwrap();
        w.build_parent(&[9, 9]).unwrap();
        assert_eq!(w.height(), 3);
        assert_eq!(w.level_layout(), vec![(1, 4), (4, 3), (12, 5)]);
        assert_eq!(w.total_span(), 60);
    }

    #[test]
    fn height_is_capped() {
        let mut w = wheel(2, 1);
        let err = w.build_parent(&[2; 12]).unwrap_err();
        assert!(matches!(err, BuildError::HeightExceeded { .. }));
    }

    #[test]
    fn clear_tasks_empties_everything() {
        let mut w = wheel(4, 1);
        w.build_parent(&[4]).unwrap();
        for delay in [1, 2, 9, 14] {
            w.add_task(TimerTask::once(|_, _| Ok(())), delay).unwrap();
        }
        assert_eq!(w.scheduled_len(), 4);
        w.clear_tasks();
        assert!(w.is_empty());
        assert_eq!(w.pool.len(), 0);
        w.advance(20).unwrap();
    }
}
