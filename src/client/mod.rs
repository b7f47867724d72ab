//! Client side of the bridge.
//!
//! ```text
//! tool call → BridgeClient (validate, typed errors)
//!           → Connection   (one framed exchange, deadline)
//!           → TCP socket   → host extension
//! ```
//!
//! [`catalog`] describes the callable commands; [`bridge`] is the
//! typed call surface; [`connection`] owns the socket.

pub mod bridge;
pub mod catalog;
pub mod connection;

pub use bridge::BridgeClient;
pub use catalog::{ToolSpec, catalog};
pub use connection::Connection;
