//! Main-thread execution bridge.
//!
//! The socket layer receives commands at arbitrary times, but the
//! host's scripting state may only be touched from the host's own
//! cooperative tick. The bridge reconciles the two timelines with two
//! bounded thread-safe queues and nothing else:
//!
//! ```text
//! reader tasks --QueuedCommand--> [inbound] --> drain_tick (host tick)
//! writer router <--CommandOutcome-- [outbound] <-- handler outcomes
//! ```
//!
//! [`TickBridge::drain_tick`] is the function a host registers with its
//! scheduler. Each firing takes exactly the commands queued at entry,
//! executes their handlers synchronously in queue order with exclusive
//! access to host state, and pushes one outcome per command. Handler
//! errors and panics are converted to command-error responses here —
//! nothing escapes into the host's own event loop.
//!
//! A handler that never returns stalls the tick, not the socket: the
//! accept and read loops keep running, and the client's deadline fires.
//! That long-running-command hazard is documented, not solved — the
//! host offers no preemption primitive for scripted code.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::constants::COMMAND_QUEUE_DEPTH;
use crate::error::HandlerError;
use crate::host::registry::HandlerRegistry;
use crate::host::session::HostSession;
use crate::protocol::{Command, ErrorKind, Response};

/// A command accepted from the wire, waiting for the next host tick.
#[derive(Debug)]
pub struct QueuedCommand {
    /// Connection that submitted the command (for outcome routing).
    pub conn_id: Uuid,
    /// Per-connection sequence number (for diagnostics).
    pub seq: u64,
    /// The decoded command.
    pub command: Command,
}

/// The single outcome of one queued command.
#[derive(Debug)]
pub struct CommandOutcome {
    /// Connection the response belongs to.
    pub conn_id: Uuid,
    /// Sequence number of the originating command.
    pub seq: u64,
    /// The response to write back.
    pub response: Response,
}

/// Submission side of the inbound queue, cloned into each reader task.
#[derive(Debug, Clone)]
pub struct CommandSink {
    tx: mpsc::Sender<QueuedCommand>,
}

impl CommandSink {
    /// Queue a command for the next tick. Awaits when the queue is at
    /// capacity (backpressure on a stalled tick). Returns `false` if
    /// the bridge was torn down.
    pub async fn submit(&self, queued: QueuedCommand) -> bool {
        self.tx.send(queued).await.is_ok()
    }

    /// Queue a command from a non-async context (tests, embedders that
    /// drive the socket side themselves).
    pub fn blocking_submit(&self, queued: QueuedCommand) -> bool {
        self.tx.blocking_send(queued).is_ok()
    }
}

/// Consumption side of the outbound queue, drained by the response
/// router in the socket layer.
#[derive(Debug)]
pub struct OutcomeStream {
    rx: mpsc::Receiver<CommandOutcome>,
}

impl OutcomeStream {
    /// Next outcome, or `None` after the bridge is dropped.
    pub async fn next(&mut self) -> Option<CommandOutcome> {
        self.rx.recv().await
    }

    /// Non-blocking receive for synchronous callers.
    pub fn try_next(&mut self) -> Option<CommandOutcome> {
        self.rx.try_recv().ok()
    }
}

/// The drain side, owned by the host's main tick.
#[derive(Debug)]
pub struct TickBridge {
    inbound_rx: mpsc::Receiver<QueuedCommand>,
    outbound_tx: mpsc::Sender<CommandOutcome>,
    registry: Arc<RwLock<HandlerRegistry>>,
}

/// Build the bridge queues around an injected registry.
pub fn channels(registry: Arc<RwLock<HandlerRegistry>>) -> (CommandSink, TickBridge, OutcomeStream) {
    let (inbound_tx, inbound_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (outbound_tx, outbound_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

    let sink = CommandSink { tx: inbound_tx };
    let bridge = TickBridge { inbound_rx, outbound_tx, registry };
    let outcomes = OutcomeStream { rx: outbound_rx };
    (sink, bridge, outcomes)
}

impl TickBridge {
    /// Drain and execute the commands queued since the last firing.
    ///
    /// Called once per tick from the host's main thread. Commands that
    /// arrive while this tick is executing wait for the next firing.
    /// Returns the number of commands handled.
    pub fn drain_tick(&mut self, session: &mut dyn HostSession) -> usize {
        // Snapshot the queue at entry so a slow handler cannot extend
        // this tick indefinitely as new commands trickle in.
        let mut batch = Vec::new();
        while let Ok(queued) = self.inbound_rx.try_recv() {
            batch.push(queued);
        }

        let handled = batch.len();
        for queued in batch {
            let response = self.execute_one(session, &queued);
            let outcome = CommandOutcome {
                conn_id: queued.conn_id,
                seq: queued.seq,
                response,
            };
            // blocking_send is safe here: the tick never runs on a
            // runtime thread. The writer side drains continuously, so
            // this only parks when a burst outruns the router.
            if self.outbound_tx.blocking_send(outcome).is_err() {
                log::warn!("[Bridge] Outcome queue closed; listener is gone");
            }
        }
        handled
    }

    /// Execute one command, converting every failure mode to a
    /// response. Never panics, never returns early.
    fn execute_one(&self, session: &mut dyn HostSession, queued: &QueuedCommand) -> Response {
        let name = &queued.command.name;
        let handler = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            registry.get(name).cloned()
        };

        let Some(handler) = handler else {
            // Dispatch rejects unknown names before queuing, so this
            // only fires when deactivate() raced the queue.
            return Response::error(ErrorKind::CommandError, format!("unknown command: {name}"));
        };

        log::debug!("[Bridge] Executing {name} (seq {})", queued.seq);
        let params = queued.command.params.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| (handler.execute)(session, params)));

        match result {
            Ok(Ok(value)) => Response::success(value),
            Ok(Err(HandlerError { message })) => {
                log::warn!("[Bridge] Handler {name} failed: {message}");
                Response::error(ErrorKind::CommandError, message)
            }
            Err(panic_payload) => {
                let message = panic_message(&*panic_payload);
                log::error!("[Bridge] Handler {name} panicked: {message}");
                Response::error(
                    ErrorKind::CommandError,
                    format!("handler '{name}' panicked: {message}"),
                )
            }
        }
    }
}

/// Best-effort extraction of a panic payload message.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
