//! The async driver that owns a wheel and advances it in real time.
//!
//! The core [`TimingWheel`] is single-threaded by design; the driver is the
//! single writer that serializes every external call behind an `RwLock` and
//! turns [`SystemClock`] ticks into `advance` calls (1 virtual unit = 1 real
//! millisecond). It broadcasts scheduler activity as strongly-typed events.

use crate::common::TaskId;
use crate::config::SchedulerConfig;
use crate::error::{BuildError, ScheduleError};
use crate::events::{SystemEvent, TaskEvent, TickEvent};
use crate::task::{TaskEffect, TimerTask};
use crate::time::SystemClock;
use crate::wheel::TimingWheel;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{error, info, trace};

const TICK_CHANNEL_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A cloneable handle to a running (or about-to-run) scheduler.
#[derive(Clone)]
pub struct WheelDriver {
    config: Arc<SchedulerConfig>,
    wheel: Arc<RwLock<TimingWheel>>,
    tick_sender: broadcast::Sender<Arc<TickEvent>>,
    system_sender: broadcast::Sender<SystemEvent>,
    task_sender: broadcast::Sender<TaskEvent>,
}

impl WheelDriver {
    /// Builds the wheel described by `config` and wraps it for async use.
    pub fn new(config: SchedulerConfig) -> Result<Self, BuildError> {
        let wheel = config.wheel.build()?;
        let (tick_sender, _) = broadcast::channel(TICK_CHANNEL_CAPACITY);
        let (system_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (task_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            wheel: Arc::new(RwLock::new(wheel)),
            tick_sender,
            system_sender,
            task_sender,
        })
    }

    /// Runs the scheduler until a Ctrl+C signal initiates shutdown.
    ///
    /// Spawns the [`SystemClock`] task and the dispatcher task that applies
    /// its ticks to the wheel.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("wheel driver starting up...");
        let (shutdown_tx, _) = broadcast::channel(1);

        let clock = SystemClock::new(self.config.resolution.clone(), self.tick_sender.clone());
        tokio::spawn(clock.run(shutdown_tx.subscribe()));

        let dispatcher = self.clone();
        let dispatcher_shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move { dispatcher.dispatch_loop(dispatcher_shutdown_rx).await });

        self.system_sender
            .send(SystemEvent::ClockStarted {
                timestamp: Instant::now(),
            })
            .ok();
        info!(
            "driver running at {:?}. Press Ctrl+C to shut down.",
            self.config.resolution
        );
        tokio::signal::ctrl_c().await?;

        info!("shutdown signal received");
        if shutdown_tx.send(()).is_err() {
            error!("failed to signal shutdown; some tasks may not terminate gracefully");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.system_sender.send(SystemEvent::ClockShutdown).ok();
        info!("wheel driver has shut down");
        Ok(())
    }

    /// Applies clock ticks to the wheel until shutdown.
    pub(crate) async fn dispatch_loop(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut tick_rx = self.tick_sender.subscribe();
        let mut last_elapsed = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                Ok(tick) = tick_rx.recv() => {
                    let step = tick.elapsed_millis.saturating_sub(last_elapsed);
                    last_elapsed = tick.elapsed_millis;
                    if step == 0 {
                        continue;
                    }
                    let mut wheel = self.wheel.write().await;
                    if let Err(err) = wheel.advance(step) {
                        for failure in &err.failures {
                            error!(task = ?failure.task, "task effect failed: {:#}", failure.error);
                            self.task_sender
                                .send(TaskEvent::Failed {
                                    id: failure.task,
                                    message: format!("{:#}", failure.error),
                                })
                                .ok();
                        }
                    }
                    trace!(virtual_time = wheel.current_time(), "wheel advanced");
                }
            }
        }
    }

    /// Schedules a task; every successful firing is also broadcast as a
    /// [`TaskEvent::Fired`].
    pub async fn add_task(
        &self,
        task: TimerTask,
        start_delay: u64,
    ) -> Result<TaskId, ScheduleError> {
        let sender = self.task_sender.clone();
        let task = task.map_effect(|mut inner| -> TaskEffect {
            Box::new(move |wheel, id| {
                let virtual_time = wheel.current_time();
                let result = inner(wheel, id);
                if result.is_ok() {
                    sender.send(TaskEvent::Fired { id, virtual_time }).ok();
                }
                result
            })
        });
        let id = self.wheel.write().await.add_task(task, start_delay)?;
        self.task_sender.send(TaskEvent::Scheduled { id }).ok();
        Ok(id)
    }

    /// Cancels a pending task. Returns `true` if it was found and removed.
    pub async fn remove_task(&self, id: TaskId) -> bool {
        let removed = self.wheel.write().await.remove_task(id);
        if removed {
            self.task_sender.send(TaskEvent::Cancelled { id }).ok();
        }
        removed
    }

    pub async fn contains_task(&self, id: TaskId) -> bool {
        self.wheel.read().await.contains_task(id)
    }

    pub async fn scheduled_len(&self) -> usize {
        self.wheel.read().await.scheduled_len()
    }

    /// Current virtual time of the wheel.
    pub async fn current_time(&self) -> u64 {
        self.wheel.read().await.current_time()
    }

    /// Direct access to the underlying wheel, for operations the driver does
    /// not wrap (e.g. `build_parent` or `clear_tasks`).
    pub fn wheel(&self) -> Arc<RwLock<TimingWheel>> {
        Arc::clone(&self.wheel)
    }

    /// Subscribes to the raw tick stream of the system clock.
    pub fn subscribe_ticks(&self) -> broadcast::Receiver<Arc<TickEvent>> {
        self.tick_sender.subscribe()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_sender.subscribe()
    }

    /// Subscribes to the `TaskEvent` stream.
    pub fn subscribe_task_events(&self) -> broadcast::Receiver<TaskEvent> {
        self.task_sender.subscribe()
    }
}
