//! Wire protocol for the command bridge.
//!
//! One TCP connection carries a sequence of request/response exchanges:
//! the client writes a framed [`Command`], the host writes back exactly
//! one framed [`Response`]. Frames are length-prefixed so payload bytes
//! that resemble frame boundaries are inert:
//!
//! ```text
//! [u32 BE payload length] [UTF-8 JSON payload]
//! ```
//!
//! See [`framing`] for the codec and [`message`] for the payload types.

pub mod framing;
pub mod message;

pub use framing::{FrameDecoder, FrameError, encode_frame};
pub use message::{Command, ErrorKind, Response};
