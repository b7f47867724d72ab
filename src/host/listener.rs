//! Loopback TCP listener for the host extension.
//!
//! Accepts bridge connections and creates a [`ClientConn`] for each.
//! A response router drains the execution bridge's outcome queue and
//! forwards each response to the owning connection's write task, so
//! responses leave in the same order handler execution completed —
//! FIFO from any single client's point of view.
//!
//! The listener binds `127.0.0.1` only. There is no authentication:
//! the design assumes a trusted local peer, which is a documented
//! limitation rather than a hardening target.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::constants::DEFAULT_HOST;
use crate::host::conn::ClientConn;
use crate::host::exec::{CommandSink, OutcomeStream};
use crate::host::registry::HandlerRegistry;

/// Shared table of live connections, keyed by connection id.
pub(crate) type ConnTable = Arc<Mutex<HashMap<Uuid, ClientConn>>>;

/// Host-side socket listener plus the response router.
#[derive(Debug)]
pub struct BridgeListener {
    /// Bound address (useful when the port was 0).
    local_addr: SocketAddr,
    /// Handle to the accept loop task.
    accept_handle: JoinHandle<()>,
    /// Handle to the response router task.
    router_handle: JoinHandle<()>,
    /// Live connections.
    conns: ConnTable,
}

impl BridgeListener {
    /// Bind the listener and spawn the accept loop and response router.
    ///
    /// Must be called from within a tokio runtime context (the host
    /// embeds one; see the simulated host). Pass port 0 to bind an
    /// ephemeral port and read it back from [`BridgeListener::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound.
    pub fn start(
        port: u16,
        registry: Arc<RwLock<HandlerRegistry>>,
        sink: CommandSink,
        outcomes: OutcomeStream,
    ) -> Result<Self> {
        let std_listener = std::net::TcpListener::bind((DEFAULT_HOST, port))
            .with_context(|| format!("Failed to bind {DEFAULT_HOST}:{port}"))?;
        let local_addr = std_listener.local_addr().context("Listener has no local address")?;
        std_listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(std_listener)?;

        let conns: ConnTable = Arc::new(Mutex::new(HashMap::new()));

        let accept_conns = Arc::clone(&conns);
        let accept_handle = tokio::spawn(Self::accept_loop(listener, registry, sink, accept_conns));

        let router_conns = Arc::clone(&conns);
        let router_handle = tokio::spawn(Self::route_outcomes(outcomes, router_conns));

        log::info!("[Listener] Bridge listening on {local_addr}");
        Ok(Self { local_addr, accept_handle, router_handle, conns })
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, stop routing, and drop every live connection.
    pub fn shutdown(self) {
        self.accept_handle.abort();
        self.router_handle.abort();
        let mut conns = self.conns.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, conn) in conns.drain() {
            conn.disconnect();
        }
        log::info!("[Listener] Bridge listener stopped");
    }

    /// Accept loop — one [`ClientConn`] per accepted socket.
    async fn accept_loop(
        listener: TcpListener,
        registry: Arc<RwLock<HandlerRegistry>>,
        sink: CommandSink,
        conns: ConnTable,
    ) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let conn_id = Uuid::new_v4();
                    log::info!("[Listener] Accepted {peer} as {conn_id}");
                    let conn = ClientConn::spawn(
                        conn_id,
                        stream,
                        Arc::clone(&registry),
                        sink.clone(),
                        Arc::clone(&conns),
                    );
                    conns.lock().unwrap_or_else(PoisonError::into_inner).insert(conn_id, conn);
                }
                Err(e) => {
                    log::error!("[Listener] Accept error: {e}");
                    break;
                }
            }
        }
    }

    /// Response router — forwards bridge outcomes to their connection.
    ///
    /// An outcome whose connection is gone (client closed the socket
    /// while its handler was still running) is logged and discarded;
    /// it is never delivered to a different caller.
    async fn route_outcomes(mut outcomes: OutcomeStream, conns: ConnTable) {
        while let Some(outcome) = outcomes.next().await {
            let sender = {
                let conns = conns.lock().unwrap_or_else(PoisonError::into_inner);
                conns.get(&outcome.conn_id).map(ClientConn::frame_sender)
            };
            match sender {
                Some(frame_tx) => {
                    crate::host::conn::send_response(&frame_tx, &outcome.response);
                }
                None => {
                    log::warn!(
                        "[Listener] Discarding late response for closed connection {} (seq {})",
                        outcome.conn_id,
                        outcome.seq
                    );
                }
            }
        }
    }
}
