//! Per-connection state for bridge clients (host side).
//!
//! Each accepted socket gets a `ClientConn` that owns a read task and a
//! write task. One connection cycles `Reading → Dispatching → Writing →
//! Reading`: the read task accumulates bytes until the codec yields a
//! complete command, dispatches it, and goes back to reading — it never
//! blocks on handler execution, so the socket stays responsive while a
//! slow handler runs on the host tick.
//!
//! Dispatch rules:
//! - unknown command name → immediate command-error response, the
//!   execution bridge is never touched;
//! - known name → queued on the execution bridge with this connection's
//!   id; the response router delivers the outcome to the write task;
//! - undecodable payload → logged, response-error response written
//!   best-effort, connection dropped (framing cannot resync).

use std::sync::{Arc, PoisonError, RwLock};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::constants::READ_BUFFER_SIZE;
use crate::host::exec::{CommandSink, QueuedCommand};
use crate::host::listener::ConnTable;
use crate::host::registry::HandlerRegistry;
use crate::protocol::{Command, ErrorKind, Response, encode_frame};

/// Host-side connection state for a single bridge client.
pub(crate) struct ClientConn {
    /// Unique identifier for this connection.
    conn_id: Uuid,
    /// Sender for encoded outgoing frames.
    frame_tx: UnboundedSender<Vec<u8>>,
    /// Handle to the read task (for shutdown).
    read_handle: JoinHandle<()>,
    /// Handle to the write task (for shutdown).
    write_handle: JoinHandle<()>,
}

impl std::fmt::Debug for ClientConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConn").field("conn_id", &self.conn_id).finish_non_exhaustive()
    }
}

impl ClientConn {
    /// Spawn read/write tasks for an accepted socket.
    pub(crate) fn spawn(
        conn_id: Uuid,
        stream: TcpStream,
        registry: Arc<RwLock<HandlerRegistry>>,
        sink: CommandSink,
        conns: ConnTable,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let read_handle = tokio::spawn(Self::read_loop(
            conn_id,
            read_half,
            registry,
            sink,
            frame_tx.clone(),
            conns,
        ));
        let write_handle = tokio::spawn(Self::write_loop(conn_id, write_half, frame_rx));

        Self { conn_id, frame_tx, read_handle, write_handle }
    }

    /// Sender that accepts pre-encoded frame bytes for this client.
    pub(crate) fn frame_sender(&self) -> UnboundedSender<Vec<u8>> {
        self.frame_tx.clone()
    }

    /// Tear the connection down, aborting both tasks.
    pub(crate) fn disconnect(self) {
        self.read_handle.abort();
        self.write_handle.abort();
    }

    /// Read loop — decodes commands and dispatches them.
    async fn read_loop(
        conn_id: Uuid,
        mut reader: tokio::net::tcp::OwnedReadHalf,
        registry: Arc<RwLock<HandlerRegistry>>,
        sink: CommandSink,
        frame_tx: UnboundedSender<Vec<u8>>,
        conns: ConnTable,
    ) {
        let mut decoder = crate::protocol::FrameDecoder::new();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut seq: u64 = 0;

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    log::info!("[Conn] Client disconnected: {conn_id}");
                    break;
                }
                Ok(n) => match decoder.feed::<Command>(&buf[..n]) {
                    Ok(commands) => {
                        for command in commands {
                            seq += 1;
                            if !Self::dispatch(conn_id, seq, command, &registry, &sink, &frame_tx)
                                .await
                            {
                                log::warn!("[Conn] Command queue closed; dropping {conn_id}");
                                remove_conn(&conns, conn_id);
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        // Framing is desynced; tell the client why, then drop.
                        log::error!("[Conn] Frame decode error for {conn_id}: {e}");
                        let response =
                            Response::error(ErrorKind::ResponseError, format!("undecodable command: {e}"));
                        send_response(&frame_tx, &response);
                        break;
                    }
                },
                Err(e) => {
                    log::error!("[Conn] Read error for {conn_id}: {e}");
                    break;
                }
            }
        }

        remove_conn(&conns, conn_id);
    }

    /// Dispatch one decoded command.
    ///
    /// Returns `false` if the execution bridge is gone and the
    /// connection should close.
    async fn dispatch(
        conn_id: Uuid,
        seq: u64,
        command: Command,
        registry: &Arc<RwLock<HandlerRegistry>>,
        sink: &CommandSink,
        frame_tx: &UnboundedSender<Vec<u8>>,
    ) -> bool {
        let known = {
            let registry = registry.read().unwrap_or_else(PoisonError::into_inner);
            registry.contains(&command.name)
        };

        if !known {
            // Fail fast without touching host state or the tick queue.
            log::debug!("[Conn] Unknown command '{}' from {conn_id}", command.name);
            let response = Response::error(
                ErrorKind::CommandError,
                format!("unknown command: {}", command.name),
            );
            send_response(frame_tx, &response);
            return true;
        }

        sink.submit(QueuedCommand { conn_id, seq, command }).await
    }

    /// Write loop — receives encoded frames and writes them out.
    async fn write_loop(
        conn_id: Uuid,
        mut writer: tokio::net::tcp::OwnedWriteHalf,
        mut frame_rx: UnboundedReceiver<Vec<u8>>,
    ) {
        while let Some(data) = frame_rx.recv().await {
            if let Err(e) = writer.write_all(&data).await {
                log::error!("[Conn] Write error for {conn_id}: {e}");
                break;
            }
        }
    }
}

/// Encode and queue a response on a connection's write task.
pub(crate) fn send_response(frame_tx: &UnboundedSender<Vec<u8>>, response: &Response) {
    match encode_frame(response) {
        Ok(bytes) => {
            if frame_tx.send(bytes).is_err() {
                log::warn!("[Conn] Write task gone; response dropped");
            }
        }
        Err(e) => log::error!("[Conn] Failed to encode response: {e}"),
    }
}

fn remove_conn(conns: &ConnTable, conn_id: Uuid) {
    conns.lock().unwrap_or_else(PoisonError::into_inner).remove(&conn_id);
}
