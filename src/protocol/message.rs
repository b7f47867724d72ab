//! Command and response payload types.
//!
//! A command names a registered handler and carries a parameter map; a
//! response is either a success with an arbitrary result document or a
//! failure with a closed error category. Exactly one response is
//! produced per command.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One named request sent from the client to the host.
///
/// Immutable once sent; at most one command is in flight per connection
/// at a time, so the command needs no explicit correlation id — the
/// next response on the wire is its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Registered handler name, e.g. `"get_scene_info"`.
    pub name: String,
    /// Handler-specific parameters. Absent means empty.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl Command {
    /// Create a command with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: Map::new() }
    }

    /// Create a command with the given parameter map.
    pub fn with_params(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self { name: name.into(), params }
    }
}

/// Closed set of failure categories reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Socket could not be opened or dropped unexpectedly.
    ConnectionError,
    /// Unknown command, invalid parameters, or handler failure.
    CommandError,
    /// A payload could not be decoded; framing is desynced.
    ResponseError,
    /// No response within the caller's deadline.
    TimeoutError,
}

/// The single outcome of one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// The handler ran and produced a result document.
    Success {
        /// Handler-specific result payload.
        result: Value,
    },
    /// The command failed; the connection-level consequences depend on
    /// `kind` (see the error module).
    Error {
        /// Failure category.
        kind: ErrorKind,
        /// Human-readable description.
        message: String,
    },
}

impl Response {
    /// Build a success response.
    pub fn success(result: Value) -> Self {
        Response::Success { result }
    }

    /// Build a failure response.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error { kind, message: message.into() }
    }

    /// True when this response carries a result.
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_shape() {
        let mut params = Map::new();
        params.insert("name".to_string(), json!("Cube"));
        let cmd = Command::with_params("get_object_info", params);

        let wire = serde_json::to_value(&cmd).unwrap();
        assert_eq!(wire, json!({"name": "get_object_info", "params": {"name": "Cube"}}));
    }

    #[test]
    fn test_command_params_default_to_empty() {
        let cmd: Command = serde_json::from_str(r#"{"name": "get_scene_info"}"#).unwrap();
        assert_eq!(cmd.name, "get_scene_info");
        assert!(cmd.params.is_empty());

        // And empty params are omitted on the way out
        let wire = serde_json::to_value(&cmd).unwrap();
        assert_eq!(wire, json!({"name": "get_scene_info"}));
    }

    #[test]
    fn test_success_wire_shape() {
        let resp = Response::success(json!({"object_count": 3}));
        let wire = serde_json::to_value(&resp).unwrap();
        assert_eq!(wire, json!({"status": "success", "result": {"object_count": 3}}));
    }

    #[test]
    fn test_error_wire_shape() {
        let resp = Response::error(ErrorKind::CommandError, "unknown command: frobnicate");
        let wire = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            wire,
            json!({
                "status": "error",
                "kind": "command_error",
                "message": "unknown command: frobnicate"
            })
        );
    }

    #[test]
    fn test_error_kind_names_are_snake_case() {
        assert_eq!(serde_json::to_value(ErrorKind::ConnectionError).unwrap(), json!("connection_error"));
        assert_eq!(serde_json::to_value(ErrorKind::ResponseError).unwrap(), json!("response_error"));
        assert_eq!(serde_json::to_value(ErrorKind::TimeoutError).unwrap(), json!("timeout_error"));
    }

    #[test]
    fn test_response_round_trip() {
        let resp = Response::error(ErrorKind::TimeoutError, "deadline exceeded");
        let bytes = serde_json::to_vec(&resp).unwrap();
        let back: Response = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, resp);
        assert!(!back.is_success());
    }
}
