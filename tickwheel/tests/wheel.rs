//! Behavioral tests for the wheel hierarchy, driven entirely through the
//! public API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tickwheel::prelude::*;

/// A one-shot task that appends the wheel's virtual time to `log` when it
/// fires.
fn logging_task(log: &Arc<Mutex<Vec<u64>>>) -> TimerTask {
    let log = log.clone();
    TimerTask::once(move |wheel, _| {
        log.lock().unwrap().push(wheel.current_time());
        Ok(())
    })
}

fn fire_log() -> Arc<Mutex<Vec<u64>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn first_fire_lands_within_one_tick_of_the_delay() {
    // base tick span 10: a delay of 25 must fire in [25, 35)
    let mut wheel = TimingWheel::new(8, 10, 0).unwrap();
    let log = fire_log();
    wheel.add_task(logging_task(&log), 25).unwrap();
    for _ in 0..10 {
        wheel.tick().unwrap();
    }
    assert_eq!(*log.lock().unwrap(), vec![30]);
}

#[test]
fn never_fires_before_the_delay() {
    let mut wheel = TimingWheel::new(8, 10, 0).unwrap();
    let log = fire_log();
    wheel.add_task(logging_task(&log), 25).unwrap();
    wheel.advance(24).unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn finite_loop_fires_exactly_n_times_interval_apart() {
    let mut wheel = TimingWheel::new(16, 1, 0).unwrap();
    let log = fire_log();
    let log_clone = log.clone();
    let id = wheel
        .add_task(
            TimerTask::repeating(3, 10, move |wheel, _| {
                log_clone.lock().unwrap().push(wheel.current_time());
                Ok(())
            }),
            4,
        )
        .unwrap();
    wheel.advance(100).unwrap();
    assert_eq!(*log.lock().unwrap(), vec![4, 14, 24]);
    assert!(!wheel.contains_task(id));
}

#[test]
fn loop_count_zero_and_one_both_fire_once() {
    for count in [0u32, 1] {
        let mut wheel = TimingWheel::new(8, 1, 0).unwrap();
        let fires = Arc::new(AtomicU32::new(0));
        let counter = fires.clone();
        wheel
            .add_task(
                TimerTask::repeating(count, 2, move |_, _| {
                    counter.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }),
                3,
            )
            .unwrap();
        wheel.advance(50).unwrap();
        assert_eq!(fires.load(Ordering::Relaxed), 1, "loop_count {count}");
    }
}

#[test]
fn perpetual_task_fires_for_as_long_as_time_advances() {
    let mut wheel = TimingWheel::new(8, 1, 0).unwrap();
    let fires = Arc::new(AtomicU32::new(0));
    let counter = fires.clone();
    let id = wheel
        .add_task(
            TimerTask::perpetual(5, move |_, _| {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }),
            5,
        )
        .unwrap();
    wheel.advance(100).unwrap();
    assert_eq!(fires.load(Ordering::Relaxed), 20);
    assert!(wheel.contains_task(id));
}

/// The concrete cascade scenario: base level 4 slots x 1 unit, one outer
/// level of 3 slots built on top. A task at delay 5 lives at the outer level,
/// is demoted when the base wraps, and fires exactly when virtual time
/// reaches 5.
#[test]
fn outer_level_task_is_demoted_and_fires_on_time() {
    let mut wheel = TimingWheel::new(4, 1, 0).unwrap();
    wheel.build_parent(&[3]).unwrap();
    let log = fire_log();
    let id = wheel.add_task(logging_task(&log), 5).unwrap();

    for now in 1..=4u64 {
        wheel.tick().unwrap();
        assert!(log.lock().unwrap().is_empty(), "fired early at {now}");
        assert!(wheel.contains_task(id));
    }
    wheel.tick().unwrap();
    assert_eq!(*log.lock().unwrap(), vec![5]);
    assert!(!wheel.contains_task(id));
    assert!(wheel.is_empty());

    // nothing left: further ticks change nothing
    wheel.advance(20).unwrap();
    assert_eq!(*log.lock().unwrap(), vec![5]);
}

#[test]
fn three_level_hierarchy_fires_distant_tasks_exactly() {
    // spans: 4, 16, 64
    let mut wheel = TimingWheel::new(4, 1, 0).unwrap();
    wheel.build_parent(&[4, 4]).unwrap();
    let log = fire_log();
    for delay in [5u64, 20, 37, 63] {
        wheel.add_task(logging_task(&log), delay).unwrap();
    }
    for _ in 0..64 {
        wheel.tick().unwrap();
    }
    let mut fired = log.lock().unwrap().clone();
    fired.sort_unstable();
    assert_eq!(fired, vec![5, 20, 37, 63]);
    assert!(wheel.is_empty());
}

#[test]
fn removed_task_never_fires() {
    let mut wheel = TimingWheel::new(4, 1, 0).unwrap();
    wheel.build_parent(&[3]).unwrap();
    let log = fire_log();
    let id = wheel.add_task(logging_task(&log), 6).unwrap();
    wheel.advance(3).unwrap();
    assert!(wheel.remove_task(id));
    assert!(!wheel.contains_task(id));
    assert!(!wheel.remove_task(id));
    wheel.advance(20).unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn effect_adding_a_zero_delay_task_fires_it_exactly_once() {
    let mut wheel = TimingWheel::new(4, 1, 0).unwrap();
    let nested_fires = Arc::new(AtomicU32::new(0));
    let counter = nested_fires.clone();
    wheel
        .add_task(
            TimerTask::once(move |wheel, _| {
                let counter = counter.clone();
                wheel.add_task(
                    TimerTask::once(move |_, _| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }),
                    0,
                )?;
                Ok(())
            }),
            2,
        )
        .unwrap();
    wheel.advance(2).unwrap();
    assert_eq!(nested_fires.load(Ordering::Relaxed), 1);
    wheel.advance(10).unwrap();
    assert_eq!(nested_fires.load(Ordering::Relaxed), 1);
}

#[test]
fn zero_delay_add_fires_inline() {
    let mut wheel = TimingWheel::new(4, 1, 0).unwrap();
    let fires = Arc::new(AtomicU32::new(0));
    let counter = fires.clone();
    let id = wheel
        .add_task(
            TimerTask::once(move |_, _| {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }),
            0,
        )
        .unwrap();
    assert_eq!(fires.load(Ordering::Relaxed), 1);
    assert!(!wheel.contains_task(id));
}

#[test]
fn advancing_by_zero_changes_nothing() {
    let mut wheel = TimingWheel::new(4, 1, 0).unwrap();
    wheel.build_parent(&[3]).unwrap();
    let log = fire_log();
    wheel.add_task(logging_task(&log), 5).unwrap();
    wheel.advance(5).unwrap();
    let after_first = log.lock().unwrap().clone();
    wheel.advance(0).unwrap();
    assert_eq!(*log.lock().unwrap(), after_first);
    assert_eq!(after_first, vec![5]);
}

#[test]
fn sub_tick_durations_are_buffered_across_calls() {
    let mut wheel = TimingWheel::new(8, 10, 0).unwrap();
    let log = fire_log();
    wheel.add_task(logging_task(&log), 10).unwrap();
    wheel.advance(7).unwrap();
    assert!(log.lock().unwrap().is_empty());
    wheel.advance(7).unwrap();
    assert_eq!(*log.lock().unwrap(), vec![10]);
    assert_eq!(wheel.timestamp(), 14);
    assert_eq!(wheel.current_time(), 10);
}

#[test]
fn a_failing_task_does_not_stop_its_siblings() {
    let mut wheel = TimingWheel::new(8, 1, 0).unwrap();
    let fires = Arc::new(AtomicU32::new(0));
    let counter = fires.clone();
    let bad = wheel
        .add_task(
            TimerTask::once(|_, _| anyhow::bail!("intentional failure")),
            3,
        )
        .unwrap();
    let good = wheel
        .add_task(
            TimerTask::once(move |_, _| {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }),
            3,
        )
        .unwrap();
    let err = wheel.advance(3).unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].task, bad);
    assert_eq!(fires.load(Ordering::Relaxed), 1);
    assert!(!wheel.contains_task(bad));
    assert!(!wheel.contains_task(good));
    // the wheel stays healthy after the failure
    wheel.advance(10).unwrap();
}

#[test]
fn over_capacity_delays_are_rejected() {
    let mut wheel = TimingWheel::new(4, 1, 0).unwrap();
    wheel.build_parent(&[3]).unwrap();
    assert_eq!(wheel.total_span(), 12);
    assert!(wheel
        .add_task(TimerTask::once(|_, _| Ok(())), 12)
        .is_ok());
    let err = wheel
        .add_task(TimerTask::once(|_, _| Ok(())), 13)
        .unwrap_err();
    assert!(matches!(err, ScheduleError::CapacityExceeded { .. }));
    // the rejected task left nothing behind
    assert_eq!(wheel.scheduled_len(), 1);
}

#[test]
fn repeating_task_with_zero_interval_is_rejected() {
    let mut wheel = TimingWheel::new(4, 1, 0).unwrap();
    let err = wheel
        .add_task(TimerTask::perpetual(0, |_, _| Ok(())), 2)
        .unwrap_err();
    assert!(matches!(err, ScheduleError::ZeroLoopInterval));
}

#[test]
fn a_task_can_cancel_itself_while_firing() {
    let mut wheel = TimingWheel::new(8, 1, 0).unwrap();
    let fires = Arc::new(AtomicU32::new(0));
    let counter = fires.clone();
    wheel
        .add_task(
            TimerTask::perpetual(2, move |wheel, id| {
                if counter.fetch_add(1, Ordering::Relaxed) + 1 == 3 {
                    assert!(wheel.remove_task(id));
                }
                Ok(())
            }),
            2,
        )
        .unwrap();
    wheel.advance(50).unwrap();
    assert_eq!(fires.load(Ordering::Relaxed), 3);
    assert!(wheel.is_empty());
}

#[test]
fn a_task_can_pick_its_own_next_fire_time() {
    let mut wheel = TimingWheel::new(16, 1, 0).unwrap();
    let log = fire_log();
    let log_clone = log.clone();
    wheel
        .add_task(
            // loop interval is 2, but the effect overrides it to 7
            TimerTask::repeating(2, 2, move |wheel, id| {
                log_clone.lock().unwrap().push(wheel.current_time());
                wheel.schedule(id, 7)?;
                Ok(())
            }),
            3,
        )
        .unwrap();
    wheel.advance(40).unwrap();
    // the self-schedule bypasses loop bookkeeping entirely, so the cadence
    // continues until the wheel stops being advanced far enough
    assert_eq!(*log.lock().unwrap(), vec![3, 10, 17, 24, 31, 38]);
}

#[test]
fn scheduling_a_slotted_task_is_already_scheduled() {
    let mut wheel = TimingWheel::new(8, 1, 0).unwrap();
    let id = wheel
        .add_task(TimerTask::once(|_, _| Ok(())), 5)
        .unwrap();
    let err = wheel.schedule(id, 3).unwrap_err();
    assert!(matches!(err, ScheduleError::AlreadyScheduled));
}

#[test]
fn scheduling_a_retired_task_is_not_scheduled() {
    let mut wheel = TimingWheel::new(8, 1, 0).unwrap();
    let id = wheel
        .add_task(TimerTask::once(|_, _| Ok(())), 1)
        .unwrap();
    wheel.advance(2).unwrap();
    let err = wheel.schedule(id, 3).unwrap_err();
    assert!(matches!(err, ScheduleError::NotScheduled));
}

#[test]
fn coarse_base_tick_catches_up_on_short_intervals() {
    // tick span 10, interval 3: the boundary at 10 owes firings for 3, 6, 9
    let mut wheel = TimingWheel::new(8, 10, 0).unwrap();
    let log = fire_log();
    let log_clone = log.clone();
    wheel
        .add_task(
            TimerTask::repeating(4, 3, move |wheel, _| {
                log_clone.lock().unwrap().push(wheel.current_time());
                Ok(())
            }),
            3,
        )
        .unwrap();
    wheel.advance(10).unwrap();
    assert_eq!(*log.lock().unwrap(), vec![10, 10, 10]);
    wheel.advance(10).unwrap();
    assert_eq!(*log.lock().unwrap(), vec![10, 10, 10, 20]);
    assert!(wheel.is_empty());
}

#[test]
fn same_tick_tasks_fire_in_insertion_order() {
    let mut wheel = TimingWheel::new(8, 1, 0).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in 0..4u32 {
        let order = order.clone();
        wheel
            .add_task(
                TimerTask::once(move |_, _| {
                    order.lock().unwrap().push(tag);
                    Ok(())
                }),
                3,
            )
            .unwrap();
    }
    wheel.advance(3).unwrap();
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn advance_to_is_absolute_and_never_moves_backward() {
    let mut wheel = TimingWheel::new(8, 1, 0).unwrap();
    let log = fire_log();
    wheel.add_task(logging_task(&log), 5).unwrap();
    wheel.advance_to(4).unwrap();
    assert!(log.lock().unwrap().is_empty());
    wheel.advance_to(2).unwrap();
    assert_eq!(wheel.timestamp(), 4);
    wheel.advance_to(6).unwrap();
    assert_eq!(*log.lock().unwrap(), vec![5]);
}
