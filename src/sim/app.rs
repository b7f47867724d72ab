//! Headless host loop driving the execution bridge.
//!
//! Mirrors a real embedding: the socket listener runs on a tokio
//! runtime while the scene lives on this thread, touched only from
//! [`TickBridge::drain_tick`] calls made here. The two never share
//! state outside the bridge queues.
//!
//! [`TickBridge::drain_tick`]: crate::host::exec::TickBridge::drain_tick

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use crate::config::Config;
use crate::constants::HOST_TICK_INTERVAL;
use crate::host::Extension;
use crate::host::listener::BridgeListener;
use crate::sim::scene::SimScene;

/// Run the simulated host until `shutdown` flips.
///
/// Activates the extension, binds the listener, then ticks the scene.
/// Deactivation is guarded so the registry is discarded on every exit
/// path, panic included.
pub fn run_host(config: &Config, shutdown: &AtomicBool) -> Result<()> {
    // Activate before any runtime context exists: the asset catalog's
    // blocking HTTP client must not be built on a runtime thread.
    let mut extension = Extension::activate(config);
    let mut tick = extension.take_tick_bridge().context("tick bridge already taken")?;
    let outcomes = extension.take_outcomes().context("outcome stream already taken")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let listener = {
        let _guard = runtime.enter();
        BridgeListener::start(
            config.port,
            extension.registry(),
            extension.command_sink(),
            outcomes,
        )?
    };

    let extension = scopeguard::guard(extension, |extension| extension.deactivate());

    println!("Simulated host ready on {}", listener.local_addr());
    log::info!("[Host] Ticking every {}ms", HOST_TICK_INTERVAL.as_millis());

    let mut scene = SimScene::default();
    while !shutdown.load(Ordering::Relaxed) {
        let handled = tick.drain_tick(&mut scene);
        if handled > 0 {
            log::debug!(
                "[Host] Tick handled {handled} command(s); scene has {} object(s)",
                scene.object_count()
            );
        }
        std::thread::sleep(HOST_TICK_INTERVAL);
    }

    println!("Shutting down...");
    listener.shutdown();
    drop(extension); // guard deactivates the registry
    log::info!("[Host] Stopped after {} journal entries", scene.journal().len());
    Ok(())
}
