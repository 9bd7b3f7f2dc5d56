//! The real-time tick source driving a wheel.

use crate::config::ClockResolution;
use crate::events::TickEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// A fixed-rate ticker that broadcasts [`TickEvent`]s until told to stop.
///
/// The clock knows nothing about wheels; it is the single source of real
/// time, and the driver's dispatcher turns its ticks into virtual-clock
/// advances.
pub struct SystemClock {
    resolution: ClockResolution,
    sender: broadcast::Sender<Arc<TickEvent>>,
}

impl SystemClock {
    pub fn new(resolution: ClockResolution, sender: broadcast::Sender<Arc<TickEvent>>) -> Self {
        Self { resolution, sender }
    }

    /// Runs the tick loop until a shutdown signal arrives.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let period = self.resolution.period();
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let started = Instant::now();
        let mut tick_count = 0u64;
        info!(?period, "system clock started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                now = ticker.tick() => {
                    tick_count += 1;
                    let event = TickEvent {
                        tick_count,
                        elapsed_millis: (now - started).as_millis() as u64,
                        timestamp: now,
                    };
                    // a send error only means nobody is listening right now
                    self.sender.send(Arc::new(event)).ok();
                }
            }
        }
        debug!(tick_count, "system clock stopped");
    }
}
