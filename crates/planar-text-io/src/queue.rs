//! Inbound message queue.
//!
//! The IO task never processes responses itself. Each framed line is wrapped
//! in an [`InboundMessage`] and pushed onto an unbounded FIFO; a single
//! worker task pops messages in arrival order and hands them to a
//! [`LineHandler`]. One worker means handlers never run concurrently or
//! reentrantly.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use planar_core::error::{Error, Result};

/// One framed line from the device.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Line text without the terminator.
    pub text: String,
    /// When the IO task framed the line.
    pub received_at: Instant,
}

impl InboundMessage {
    pub fn new(text: impl Into<String>) -> Self {
        InboundMessage {
            text: text.into(),
            received_at: Instant::now(),
        }
    }
}

/// Callback invoked by the queue worker for every inbound line.
///
/// Errors and panics are logged by the worker and do not stop it.
pub trait LineHandler: Send + Sync + 'static {
    fn handle_line(&self, message: &InboundMessage) -> Result<()>;
}

/// Producer side of the inbound queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: mpsc::UnboundedSender<InboundMessage>,
}

impl InboundSender {
    /// Push a message. Fails only when the worker has gone away.
    pub fn enqueue(&self, message: InboundMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| Error::Transport("inbound queue closed".into()))
    }
}

/// Consumer side of the inbound queue, handed to [`spawn_worker`].
#[derive(Debug)]
pub struct InboundReceiver {
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl InboundReceiver {
    /// Pop the next message directly, for callers that run their own loop.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }
}

/// Create an unbounded inbound queue.
pub fn inbound_queue() -> (InboundSender, InboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InboundSender { tx }, InboundReceiver { rx })
}

/// Spawn the single consumer. It runs until every sender is dropped.
pub fn spawn_worker(
    name: impl Into<String>,
    mut queue: InboundReceiver,
    handler: Arc<dyn LineHandler>,
) -> JoinHandle<()> {
    let name = name.into();
    tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle_line(&message)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(queue = %name, line = %message.text, error = %e, "line handler failed");
                }
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".into());
                    error!(queue = %name, line = %message.text, %reason, "line handler panicked");
                }
            }
        }
        debug!(queue = %name, "inbound queue closed, worker exiting");
    })
}
