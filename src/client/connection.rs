//! Client-side connection manager.
//!
//! Owns the socket lifecycle: connect, reconnect after failure, one
//! framed exchange at a time, close on every damaging error. The
//! logical states are `Disconnected → Connecting → Connected →
//! (Closing) → Disconnected`; `Connecting` and `Closing` are transient
//! inside [`Connection::connect`] and [`Connection::close`], with one
//! addition — a connection is marked **suspect** after a timeout,
//! because the host may still write the late response. A suspect
//! connection is torn down and re-established before its next use, so
//! a late response can never be attributed to a later command.
//!
//! The exchange itself is synchronous: a tool call blocks until its
//! response or deadline. Serialization of concurrent callers happens
//! one level up, in the client façade.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::constants::READ_BUFFER_SIZE;
use crate::error::BridgeError;
use crate::protocol::{Command, FrameDecoder, Response, encode_frame};

/// One socket between this process and a host instance.
#[derive(Debug)]
pub struct Connection {
    host: String,
    port: u16,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
    decoder: FrameDecoder,
    suspect: bool,
}

impl Connection {
    /// Create a disconnected manager for `host:port`.
    pub fn new(host: &str, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            port,
            connect_timeout,
            stream: None,
            decoder: FrameDecoder::new(),
            suspect: false,
        }
    }

    /// Open the socket. Idempotent: calling while already connected is
    /// a no-op and does not open a second socket. A suspect connection
    /// is torn down and re-established instead, discarding whatever a
    /// timed-out exchange might still deliver.
    pub fn connect(&mut self) -> Result<(), BridgeError> {
        if self.stream.is_some() {
            if !self.suspect {
                return Ok(());
            }
            log::info!("[Connection] Reconnecting suspect connection to {}:{}", self.host, self.port);
            self.close();
        }

        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| BridgeError::Connection(format!("cannot resolve {}:{}: {e}", self.host, self.port)))?
            .next()
            .ok_or_else(|| {
                BridgeError::Connection(format!("no address for {}:{}", self.host, self.port))
            })?;

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|e| {
            BridgeError::Connection(format!("could not connect to {}:{}: {e}", self.host, self.port))
        })?;
        let _ = stream.set_nodelay(true);

        log::info!("[Connection] Connected to {}:{}", self.host, self.port);
        self.stream = Some(stream);
        self.decoder = FrameDecoder::new();
        self.suspect = false;
        Ok(())
    }

    /// Whether a socket is currently open (suspect or not).
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether the last exchange timed out without a response.
    pub fn is_suspect(&self) -> bool {
        self.suspect
    }

    /// Release the socket. Idempotent; safe on every exit path.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            log::info!("[Connection] Closed connection to {}:{}", self.host, self.port);
        }
        self.decoder = FrameDecoder::new();
        self.suspect = false;
    }

    /// Write one command and block until its response or the deadline.
    ///
    /// Connects first if needed. On timeout the connection is marked
    /// suspect; on transport or decode failure it is closed. Only a
    /// clean exchange (including an error *response*) leaves the
    /// connection untouched.
    pub fn send_and_await(
        &mut self,
        command: &Command,
        timeout: Duration,
    ) -> Result<Response, BridgeError> {
        self.connect()?;

        let result = self.exchange(command, timeout);
        match &result {
            Ok(_) => {}
            Err(BridgeError::Timeout(_)) => {
                // The host may still answer; poison the socket for the
                // next caller rather than racing the late response.
                self.suspect = true;
                log::warn!("[Connection] Exchange timed out; connection marked suspect");
            }
            Err(_) => self.close(),
        }
        result
    }

    fn exchange(&mut self, command: &Command, timeout: Duration) -> Result<Response, BridgeError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| BridgeError::Connection("not connected".to_string()))?;

        let frame = encode_frame(command)
            .map_err(|e| BridgeError::Command(format!("could not encode command: {e}")))?;
        stream
            .write_all(&frame)
            .map_err(|e| BridgeError::Connection(format!("send failed: {e}")))?;

        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BridgeError::Timeout(format!(
                    "no response to '{}' within {timeout:?}",
                    command.name
                )));
            }
            stream
                .set_read_timeout(Some(remaining))
                .map_err(|e| BridgeError::Connection(format!("socket configuration failed: {e}")))?;

            match stream.read(&mut buf) {
                Ok(0) => {
                    return Err(BridgeError::Connection("connection closed by host".to_string()));
                }
                Ok(n) => {
                    let mut responses: Vec<Response> = self
                        .decoder
                        .feed(&buf[..n])
                        .map_err(|e| BridgeError::Response(e.to_string()))?;
                    match responses.len() {
                        0 => continue, // partial frame, keep reading
                        1 => {
                            return Ok(responses.remove(0));
                        }
                        n => {
                            // One in-flight command can only have one
                            // response; anything more is a desync.
                            return Err(BridgeError::Response(format!(
                                "received {n} responses for one command"
                            )));
                        }
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    return Err(BridgeError::Timeout(format!(
                        "no response to '{}' within {timeout:?}",
                        command.name
                    )));
                }
                Err(e) => {
                    return Err(BridgeError::Connection(format!("receive failed: {e}")));
                }
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
