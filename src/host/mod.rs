//! Host-side extension runtime.
//!
//! The pieces that live inside the host application process:
//!
//! - [`registry`] — command name → handler table with an explicit
//!   activation lifecycle
//! - [`exec`] — the main-thread execution bridge (two queues + the
//!   tick-registered drain function)
//! - [`listener`] / [`conn`] — loopback socket server and per-client
//!   read/write tasks
//! - [`session`] — the `HostSession` trait handlers run against
//! - [`handlers`] — the built-in command set
//!
//! # Lifecycle
//!
//! [`Extension::activate`] builds the registry and the bridge queues;
//! [`Extension::deactivate`] discards every handler registration so
//! nothing can execute against a torn-down host. The registry is
//! injected into the listener and the tick bridge explicitly — there
//! is no ambient global to reach for.
//!
//! ```ignore
//! let mut extension = Extension::activate(&config);
//! let tick = extension.take_tick_bridge().expect("taken once");
//! let outcomes = extension.take_outcomes().expect("taken once");
//! let listener = BridgeListener::start(
//!     config.port, extension.registry(), extension.command_sink(), outcomes)?;
//! loop { tick.drain_tick(&mut session); /* host's own scheduling */ }
//! ```

pub mod conn;
pub mod exec;
pub mod handlers;
pub mod listener;
pub mod registry;
pub mod session;

use std::sync::{Arc, PoisonError, RwLock};

use crate::assets::AssetCatalog;
use crate::config::Config;
use crate::host::exec::{CommandSink, OutcomeStream, TickBridge};
use crate::host::registry::{Handler, HandlerRegistry};

/// One activation of the host extension.
#[derive(Debug)]
pub struct Extension {
    registry: Arc<RwLock<HandlerRegistry>>,
    sink: CommandSink,
    tick: Option<TickBridge>,
    outcomes: Option<OutcomeStream>,
}

impl Extension {
    /// Activate the extension: build the handler table and the
    /// execution bridge queues.
    ///
    /// Call before entering a runtime context — the asset catalog uses
    /// a blocking HTTP client that must not be built on a runtime
    /// thread.
    pub fn activate(config: &Config) -> Self {
        let assets = Arc::new(AssetCatalog::new(&config.asset_api_url, config.assets_enabled));
        let mut registry = HandlerRegistry::new();
        handlers::register_builtins(&mut registry, &assets);
        log::info!("[Extension] Activated with {} handlers", registry.len());

        let registry = Arc::new(RwLock::new(registry));
        let (sink, tick, outcomes) = exec::channels(Arc::clone(&registry));
        Self { registry, sink, tick: Some(tick), outcomes: Some(outcomes) }
    }

    /// Shared handle to the handler registry, for injection into the
    /// listener and tests.
    pub fn registry(&self) -> Arc<RwLock<HandlerRegistry>> {
        Arc::clone(&self.registry)
    }

    /// Submission handle for the listener's reader tasks.
    pub fn command_sink(&self) -> CommandSink {
        self.sink.clone()
    }

    /// The drain side of the bridge. Yields `Some` exactly once; the
    /// host's tick loop owns it from then on.
    pub fn take_tick_bridge(&mut self) -> Option<TickBridge> {
        self.tick.take()
    }

    /// The outcome side of the bridge. Yields `Some` exactly once; the
    /// listener's response router owns it from then on.
    pub fn take_outcomes(&mut self) -> Option<OutcomeStream> {
        self.outcomes.take()
    }

    /// Register an additional handler (embedder extension point).
    pub fn register(&self, handler: Handler) {
        self.registry.write().unwrap_or_else(PoisonError::into_inner).register(handler);
    }

    /// Deactivate: discard every handler registration.
    ///
    /// Commands already queued for the tick resolve as command errors;
    /// nothing runs against the torn-down host.
    pub fn deactivate(&self) {
        self.registry.write().unwrap_or_else(PoisonError::into_inner).clear();
        log::info!("[Extension] Deactivated");
    }
}
