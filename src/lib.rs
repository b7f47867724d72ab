//! Scenelink - command bridge for a GUI-hosted 3D application.
//!
//! An external tool-calling client (an AI assistant or automation
//! process) drives a long-running, single-threaded host application by
//! sending named commands over a loopback socket and receiving exactly
//! one structured response per command.
//!
//! # Architecture
//!
//! ```text
//!  assistant ── MCP stdio ──► serve ─┐
//!  tool code ───────────────────────►│ BridgeClient ── frames ──► host listener
//!                                    │   (client/)                (host/listener)
//!                                    │                                 │ queue
//!                                    │                                 ▼
//!                                    │                           drain_tick on the
//!                                    │                           host's main tick
//!                                    └◄──────── responses ◄───────────┘
//! ```
//!
//! The hard constraint the design is built around: the host's
//! scripting API may only be touched from its own main thread, on its
//! own schedule. The socket side and the tick side communicate only
//! through the execution bridge's two queues.
//!
//! # Modules
//!
//! - [`protocol`] - wire codec (length-prefixed JSON frames)
//! - [`client`] - connection manager, typed façade, capability catalog
//! - [`host`] - dispatcher, execution bridge, registry, built-ins
//! - [`sim`] - simulated host application for development and tests
//! - [`assets`] - asset catalog HTTP client
//! - [`serve`] - MCP stdio loop

// Library modules
pub mod assets;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod host;
pub mod protocol;
pub mod serve;
pub mod sim;

// Re-export commonly used types
pub use client::{BridgeClient, Connection};
pub use config::Config;
pub use error::{BridgeError, HandlerError};
pub use host::Extension;
pub use protocol::{Command, ErrorKind, Response};
