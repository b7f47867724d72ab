//! Application-wide constants for scenelink.
//!
//! This module centralizes magic numbers and configuration defaults to
//! improve maintainability and discoverability. Constants are grouped
//! by domain with documentation explaining their purpose.
//!
//! # Categories
//!
//! - **Transport**: socket defaults and framing limits
//! - **Timeouts**: network and exchange deadlines
//! - **Host**: tick cadence and queue sizing
//! - **Handlers**: result-shaping limits carried over from the host app

use std::time::Duration;

// ============================================================================
// Transport
// ============================================================================

/// Default TCP port the host extension listens on.
///
/// The listener binds loopback only; the port is configurable through
/// the config file and `SCENELINK_PORT`.
pub const DEFAULT_PORT: u16 = 9876;

/// Default host address for both the listener and the client bridge.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Maximum frame payload size (16 MB).
///
/// Large enough for embedded screenshot data in a result, small enough
/// that a corrupted length header cannot make the decoder allocate
/// unbounded memory.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Read buffer size for socket reads on both sides of the bridge.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// Timeouts
// ============================================================================

/// Default deadline for one command/response exchange.
///
/// Long enough for a viewport capture or asset search, short enough
/// that a wedged handler surfaces as a timeout instead of a hang.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// TCP connect timeout for the client bridge.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How many times `scenelink serve` retries connecting on startup.
///
/// The MCP client may restart the serve process while the host is still
/// coming up; a few retries with linear backoff cover the window.
pub const CONNECT_RETRIES: u32 = 5;

/// Base delay between connect retries, in milliseconds.
///
/// Each attempt waits `attempt * CONNECT_RETRY_BASE_MS` (linear
/// backoff), so retries span roughly three seconds total.
pub const CONNECT_RETRY_BASE_MS: u64 = 300;

/// HTTP request timeout for asset catalog calls.
pub const ASSET_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Host
// ============================================================================

/// Interval between host ticks in the simulated host loop.
///
/// The drain callback fires once per tick. Real hosts drive the drain
/// from their own scheduler; 50ms keeps the simulated host responsive
/// without busy-looping.
pub const HOST_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Depth of the inbound command and outbound outcome queues.
///
/// One command is in flight per connection, so the queues only grow
/// when several clients connect at once or a handler stalls a tick.
pub const COMMAND_QUEUE_DEPTH: usize = 64;

// ============================================================================
// Handlers
// ============================================================================

/// Maximum number of objects included in a scene snapshot.
///
/// Keeps `get_scene_info` results small for large scenes; callers can
/// follow up with `get_object_info` for specific objects.
pub const SCENE_INFO_MAX_OBJECTS: usize = 10;

/// Nominal viewport width used by the simulated capture handler.
pub const VIEWPORT_WIDTH: u32 = 1920;

/// Nominal viewport height used by the simulated capture handler.
pub const VIEWPORT_HEIGHT: u32 = 1080;

/// Default longest-edge cap for viewport captures.
pub const VIEWPORT_DEFAULT_MAX_SIZE: u32 = 800;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_values_are_reasonable() {
        // Exchange deadline should dominate the connect timeout
        assert!(RESPONSE_TIMEOUT > CONNECT_TIMEOUT);

        // Retry schedule should finish well before one exchange deadline
        let total_backoff: u64 =
            (0..u64::from(CONNECT_RETRIES)).map(|a| a * CONNECT_RETRY_BASE_MS).sum();
        assert!(Duration::from_millis(total_backoff) < RESPONSE_TIMEOUT);
    }

    #[test]
    fn test_frame_limit_fits_in_length_header() {
        // The length header is a u32; the cap must be representable
        assert!(u64::from(MAX_FRAME_SIZE) < u64::from(u32::MAX));
    }

    #[test]
    fn test_viewport_defaults() {
        assert!(VIEWPORT_DEFAULT_MAX_SIZE <= VIEWPORT_WIDTH);
        assert!(VIEWPORT_HEIGHT < VIEWPORT_WIDTH);
    }
}
