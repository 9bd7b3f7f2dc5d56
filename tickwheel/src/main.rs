use anyhow::Result;
use colored::Colorize;
use tickwheel::calendar::MILLIS_PER_SECOND;
use tickwheel::prelude::*;
use tickwheel::ENGINE_NAME;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    println!("{}", ENGINE_NAME.cyan().bold());

    // 2. Load the configuration: `wheeldev.toml` if present, defaults
    //    otherwise (clock-face geometry, medium resolution).
    let config = load_config()?;

    // 3. Create the driver around the configured wheel.
    let driver = WheelDriver::new(config)?;

    // 4. Spawn tasks listening to the driver's event streams.
    spawn_event_listeners(&driver);

    // 5. Register demo tasks exercising one-shot, finite, and perpetual
    //    schedules.
    register_demo_tasks(&driver).await?;

    // 6. Run until Ctrl+C.
    driver.run().await
}

fn load_config() -> Result<SchedulerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("wheeldev").required(false))
        .build()?;
    Ok(settings.try_deserialize()?)
}

/// Spawns tasks subscribing to the driver's event streams.
fn spawn_event_listeners(driver: &WheelDriver) {
    let mut system_rx = driver.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut task_rx = driver.subscribe_task_events();
    tokio::spawn(async move {
        while let Ok(event) = task_rx.recv().await {
            info!("[TASK] => {:?}", event);
        }
    });
}

/// Registers demo tasks with the driver.
async fn register_demo_tasks(driver: &WheelDriver) -> Result<()> {
    // --- A perpetual heartbeat every 5 virtual seconds ---
    let beats = Arc::new(AtomicU32::new(0));
    let counter = beats.clone();
    driver
        .add_task(
            TimerTask::perpetual(5 * MILLIS_PER_SECOND, move |wheel, _| {
                let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
                info!(
                    "[HEARTBEAT] beat #{} at virtual time {}",
                    n,
                    wheel.current_time()
                );
                Ok(())
            })
            .with_label("heartbeat"),
            5 * MILLIS_PER_SECOND,
        )
        .await?;

    // --- A one-shot task three seconds in ---
    driver
        .add_task(
            TimerTask::once(|_, _| {
                info!("[ONE-SHOT] three seconds have passed; this task is now retired.");
                Ok(())
            })
            .with_label("one-shot"),
            3 * MILLIS_PER_SECOND,
        )
        .await?;

    // --- A finite task: 3 firings, 2 seconds apart ---
    driver
        .add_task(
            TimerTask::repeating(3, 2 * MILLIS_PER_SECOND, |_, id| {
                info!("[FINITE] {:?} fired; 2-second cadence, 3 firings total.", id);
                Ok(())
            })
            .with_label("finite"),
            2 * MILLIS_PER_SECOND,
        )
        .await?;

    Ok(())
}
