//! Error taxonomy for the command bridge.
//!
//! Every failure a tool implementation can observe falls into one of
//! four categories, mirrored on the wire by [`ErrorKind`]:
//!
//! - [`BridgeError::Connection`] — socket could not be opened or
//!   dropped unexpectedly. Not retried automatically.
//! - [`BridgeError::Command`] — unknown command name, invalid
//!   parameters, or a handler-level failure. The connection stays
//!   usable.
//! - [`BridgeError::Response`] — a response could not be decoded.
//!   Framing desync cannot be resynchronized, so the connection is
//!   closed.
//! - [`BridgeError::Timeout`] — no response within the caller's
//!   deadline. The connection is marked suspect, not closed.
//!
//! Raw transport errors never reach tool code; they are converted at
//! the connection-manager boundary. Handler failures never cross the
//! host's tick boundary; they are converted at the execution bridge.

use thiserror::Error;

use crate::protocol::ErrorKind;

/// A failure observed by the client side of the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The socket could not be opened, or dropped unexpectedly.
    #[error("connection error: {0}")]
    Connection(String),

    /// Unknown command, invalid parameters, or a handler failure.
    #[error("command error: {0}")]
    Command(String),

    /// A response could not be decoded (malformed frame or payload).
    #[error("response error: {0}")]
    Response(String),

    /// No response arrived within the caller's deadline.
    #[error("timed out: {0}")]
    Timeout(String),
}

impl BridgeError {
    /// The wire-level category for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Connection(_) => ErrorKind::ConnectionError,
            BridgeError::Command(_) => ErrorKind::CommandError,
            BridgeError::Response(_) => ErrorKind::ResponseError,
            BridgeError::Timeout(_) => ErrorKind::TimeoutError,
        }
    }

    /// Reconstruct a typed error from a wire failure payload.
    pub fn from_wire(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::ConnectionError => BridgeError::Connection(message),
            ErrorKind::CommandError => BridgeError::Command(message),
            ErrorKind::ResponseError => BridgeError::Response(message),
            ErrorKind::TimeoutError => BridgeError::Timeout(message),
        }
    }

    /// Whether the connection remains usable after this error.
    ///
    /// Command errors are recoverable; everything else either already
    /// lost the socket or left it in an indeterminate state.
    pub fn connection_usable(&self) -> bool {
        matches!(self, BridgeError::Command(_))
    }
}

/// A failure raised by a host-side command handler.
///
/// Handlers return this instead of panicking; the execution bridge
/// converts it (and any panic it still catches) into a
/// `Failure{CommandError}` response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    /// Human-readable description of what went wrong.
    pub message: String,
}

impl HandlerError {
    /// Create a handler error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self { message: message.to_string() }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self { message: format!("invalid parameters: {err}") }
    }
}
