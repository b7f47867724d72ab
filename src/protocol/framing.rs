//! Length-prefixed frame codec.
//!
//! ```text
//! [u32 BE payload length] [payload: length bytes of UTF-8 JSON]
//! ```
//!
//! The explicit size header means the decoder never scans payload bytes
//! for delimiters, so results embedding binary data (base64 blobs,
//! strings that look like length headers) pass through untouched.
//!
//! Decoding is incremental: [`FrameDecoder::feed`] buffers partial TCP
//! reads and yields only complete payloads, so callers can hand it
//! whatever `read()` returned without reassembling frames themselves.

use bytes::{Buf, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::constants::MAX_FRAME_SIZE;

/// Size of the length header in bytes.
const HEADER_LEN: usize = 4;

/// A framing or payload decoding failure.
///
/// Any of these desyncs the stream: the connection must be closed and
/// re-established, since there is no way to find the next frame
/// boundary after a bad header or truncated payload.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The length header declared zero bytes.
    #[error("invalid frame: zero length")]
    ZeroLength,

    /// The length header exceeded [`MAX_FRAME_SIZE`].
    #[error("frame too large: {0} bytes (max {MAX_FRAME_SIZE})")]
    TooLarge(u32),

    /// The payload was not valid JSON for the expected message type.
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Encode a message as one wire frame.
///
/// Returns `[u32 BE length][JSON payload]`.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, FrameError> {
    let payload = serde_json::to_vec(message)?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Incremental frame decoder that handles partial reads.
///
/// Feed bytes via [`FrameDecoder::feed`] and extract complete messages.
/// Handles TCP-style byte stream reassembly: a frame split across any
/// number of reads decodes once its last byte arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Create a new decoder with an empty buffer.
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Feed bytes into the decoder and extract all complete messages.
    ///
    /// Returns the decoded messages, possibly none. Incomplete data is
    /// buffered for the next call — "need more data" is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a length header is invalid or a complete
    /// payload fails to decode as `T`. After an error the stream is
    /// desynced and the connection should be dropped.
    pub fn feed<T: DeserializeOwned>(&mut self, bytes: &[u8]) -> Result<Vec<T>, FrameError> {
        self.buf.extend_from_slice(bytes);
        let mut messages = Vec::new();

        loop {
            if self.buf.len() < HEADER_LEN {
                break;
            }

            let length = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);

            if length == 0 {
                return Err(FrameError::ZeroLength);
            }
            if length > MAX_FRAME_SIZE {
                return Err(FrameError::TooLarge(length));
            }

            let total = HEADER_LEN + length as usize;
            if self.buf.len() < total {
                break; // Incomplete frame, wait for more data
            }

            let message = serde_json::from_slice(&self.buf[HEADER_LEN..total])?;
            messages.push(message);
            self.buf.advance(total);
        }

        Ok(messages)
    }

    /// Returns true if the decoder has buffered partial data.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, ErrorKind, Response};
    use serde_json::json;

    #[test]
    fn test_command_round_trip() {
        let cmd = Command::new("get_scene_info");
        let encoded = encode_frame(&cmd).unwrap();
        let mut decoder = FrameDecoder::new();
        let commands: Vec<Command> = decoder.feed(&encoded).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0], cmd);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_response_round_trip() {
        let resp = Response::error(ErrorKind::CommandError, "no such handler");
        let encoded = encode_frame(&resp).unwrap();
        let mut decoder = FrameDecoder::new();
        let responses: Vec<Response> = decoder.feed(&encoded).unwrap();
        assert_eq!(responses, vec![resp]);
    }

    #[test]
    fn test_payload_with_length_like_bytes() {
        // A result whose string content mimics a frame header must not
        // confuse the decoder — framing never scans payload bytes.
        let sneaky = String::from_utf8(vec![0x00, 0x00, 0x00, 0x10]).unwrap_or_default();
        let resp = Response::success(json!({
            "data": format!("{sneaky}\u{0}\u{0}\u{0}\u{4}abcd"),
            "nested": {"len": 4_294_967_295_u32}
        }));
        let encoded = encode_frame(&resp).unwrap();
        let mut decoder = FrameDecoder::new();
        let responses: Vec<Response> = decoder.feed(&encoded).unwrap();
        assert_eq!(responses, vec![resp]);
    }

    #[test]
    fn test_multiple_frames_in_single_feed() {
        let c1 = Command::new("get_scene_info");
        let c2 = Command::new("get_selection");
        let c3 = Command::new("get_viewport_screenshot");

        let mut buf = Vec::new();
        buf.extend_from_slice(&encode_frame(&c1).unwrap());
        buf.extend_from_slice(&encode_frame(&c2).unwrap());
        buf.extend_from_slice(&encode_frame(&c3).unwrap());

        let mut decoder = FrameDecoder::new();
        let commands: Vec<Command> = decoder.feed(&buf).unwrap();
        assert_eq!(commands, vec![c1, c2, c3]);
    }

    #[test]
    fn test_partial_frame_reassembly() {
        let resp = Response::success(json!({"key": "value"}));
        let encoded = encode_frame(&resp).unwrap();

        let mut decoder = FrameDecoder::new();

        // Feed the header plus fewer payload bytes than declared
        let mid = encoded.len() / 2;
        let responses: Vec<Response> = decoder.feed(&encoded[..mid]).unwrap();
        assert!(responses.is_empty());
        assert!(decoder.has_partial());

        // Feed the rest — the frame completes
        let responses: Vec<Response> = decoder.feed(&encoded[mid..]).unwrap();
        assert_eq!(responses, vec![resp]);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_byte_at_a_time() {
        let cmd = Command::new("execute_code");
        let encoded = encode_frame(&cmd).unwrap();

        let mut decoder = FrameDecoder::new();
        for (i, byte) in encoded.iter().enumerate() {
            let commands: Vec<Command> = decoder.feed(&[*byte]).unwrap();
            if i < encoded.len() - 1 {
                assert!(commands.is_empty());
            } else {
                assert_eq!(commands, vec![cmd.clone()]);
            }
        }
    }

    #[test]
    fn test_zero_length_rejected() {
        let buf = [0u8; 4]; // length = 0
        let mut decoder = FrameDecoder::new();
        assert!(matches!(
            decoder.feed::<Command>(&buf),
            Err(FrameError::ZeroLength)
        ));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let length = MAX_FRAME_SIZE + 1;
        let buf = length.to_be_bytes();
        let mut decoder = FrameDecoder::new();
        assert!(matches!(
            decoder.feed::<Command>(&buf),
            Err(FrameError::TooLarge(_))
        ));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let payload = b"not json at all";
        let mut buf = Vec::new();
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(payload);

        let mut decoder = FrameDecoder::new();
        assert!(matches!(
            decoder.feed::<Command>(&buf),
            Err(FrameError::Payload(_))
        ));
    }

    #[test]
    fn test_large_payload_round_trip() {
        // 1 MB of base64-looking data, the screenshot case
        let blob = "QUJD".repeat(256 * 1024);
        let resp = Response::success(json!({"format": "png", "data": blob}));
        let encoded = encode_frame(&resp).unwrap();
        let mut decoder = FrameDecoder::new();
        let responses: Vec<Response> = decoder.feed(&encoded).unwrap();
        assert_eq!(responses, vec![resp]);
    }
}
