//! Simulated host application.
//!
//! Scenelink's host half is designed to be embedded in a GUI
//! application that owns the main thread and drives the tick. No such
//! application is linked here, so [`app`] provides a stand-in: a
//! headless loop that owns a [`scene::SimScene`] and calls the bridge's
//! drain function at a fixed cadence, exactly the way a real host's
//! scheduler-registered callback would.
//!
//! `scenelink host` runs it; the integration tests wire the same
//! pieces together directly.

pub mod app;
pub mod scene;

pub use app::run_host;
pub use scene::SimScene;
