//! IO task for CR-framed display protocols.
//!
//! One tokio task owns the transport exclusively. It writes outbound
//! commands handed to it through a bounded channel, reads the byte stream
//! when idle, frames it into lines and pushes each line onto the inbound
//! queue. Commands are fire-and-forget: the device answers asynchronously
//! and its answers are handled like any other inbound line.

use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use planar_core::error::{Error, Result};
use planar_core::transport::Transport;
use planar_core::types::{CommandOutcome, IgnoreReason};

use crate::protocol::{LineFramer, encode_command};
use crate::queue::{InboundMessage, InboundSender};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the display IO task.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// How long one idle read waits before the loop re-checks for commands.
    pub read_timeout: Duration,
    /// Pause between reads while the transport reports not connected.
    pub disconnected_backoff: Duration,
    /// Capacity of the outbound command channel.
    pub command_capacity: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            read_timeout: Duration::from_millis(100),
            disconnected_backoff: Duration::from_millis(250),
            command_capacity: 32,
        }
    }
}

/// A request sent to the IO task.
pub enum Request {
    /// Write one command; the terminator is appended by the IO task.
    Send { text: String },
    /// Graceful shutdown; returns the transport for recovery.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// Outbound side of the IO task. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Request>,
}

impl CommandSender {
    /// Queue one command for transmission.
    ///
    /// Never waits. Empty commands are refused here; a disconnected
    /// transport is detected by the IO task at write time, which drops the
    /// command with a log entry.
    pub fn send_text(&self, text: &str) -> CommandOutcome {
        if text.is_empty() {
            debug!("empty command, nothing to send");
            return CommandOutcome::Ignored(IgnoreReason::EmptyCommand);
        }

        match self.tx.try_send(Request::Send {
            text: text.to_string(),
        }) {
            Ok(()) => CommandOutcome::Sent,
            Err(TrySendError::Full(_)) => {
                warn!(cmd = %text, "command queue full, dropping command");
                CommandOutcome::Ignored(IgnoreReason::Backlogged)
            }
            Err(TrySendError::Closed(_)) => {
                debug!(cmd = %text, "IO task gone, dropping command");
                CommandOutcome::Ignored(IgnoreReason::Closed)
            }
        }
    }

    /// `true` once the IO task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle to the IO task. Stored inside the device driver.
pub struct DisplayIo {
    /// Outbound command channel.
    pub commands: CommandSender,
    /// Cancellation token for abrupt shutdown.
    pub cancel: CancellationToken,
    /// Join handle for the IO task.
    pub task: JoinHandle<()>,
}

impl DisplayIo {
    /// Shut down the IO task and recover the transport.
    ///
    /// Commands queued before this call are written first.
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .commands
            .tx
            .send(Request::Shutdown { reply: reply_tx })
            .await;
        let transport = reply_rx.await.map_err(|_| Error::NotConnected)?;
        let _ = self.task.await;
        Ok(transport)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task. Framed lines are pushed to `inbound`.
pub fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    inbound: InboundSender,
) -> DisplayIo {
    let (tx, rx) = mpsc::channel::<Request>(config.command_capacity.max(1));
    let cancel = CancellationToken::new();

    let task = tokio::spawn(io_loop(transport, config, inbound, rx, cancel.clone()));

    DisplayIo {
        commands: CommandSender { tx },
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Outbound commands
/// 3. Idle reading and framing
async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    inbound: InboundSender,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut framer = LineFramer::new();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("display IO task cancelled");
                break;
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Send { text }) => write_command(&mut *transport, &text).await,
                    Some(Request::Shutdown { reply }) => {
                        debug!("IO task shutdown requested");
                        let _ = reply.send(transport);
                        return;
                    }
                    None => {
                        debug!("command channel closed, exiting IO task");
                        break;
                    }
                }
            }

            _ = async {
                let mut buf = [0u8; 256];
                match transport.receive(&mut buf, config.read_timeout).await {
                    Ok(n) if n > 0 => {
                        trace!(bytes = ?&buf[..n], "received");
                        for line in framer.push(&buf[..n]) {
                            trace!(line = %line, "framed line");
                            if let Err(e) = inbound.enqueue(InboundMessage::new(line)) {
                                warn!(error = %e, "inbound queue rejected line");
                            }
                        }
                    }
                    Err(Error::NotConnected) => {
                        tokio::time::sleep(config.disconnected_backoff).await;
                    }
                    _ => {
                        // Timeout or error; yield so the loop can check for
                        // commands or cancellation.
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            } => {}
        }
    }
}

/// Write one command, skipping it when the link is down. No retry.
async fn write_command(transport: &mut dyn Transport, text: &str) {
    if !transport.is_connected() {
        debug!(cmd = %text, "transport not connected, command dropped");
        return;
    }

    match transport.send(&encode_command(text)).await {
        Ok(()) => debug!(cmd = %text, "command sent"),
        Err(e) => warn!(cmd = %text, error = %e, "command send failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::inbound_queue;
    use planar_test_harness::MockTransport;

    #[tokio::test]
    async fn sends_terminated_command() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let (inbound, _rx) = inbound_queue();
        let io = spawn_io_task(Box::new(mock), IoConfig::default(), inbound);

        assert_eq!(io.commands.send_text("SYSTEM.STATE?"), CommandOutcome::Sent);
        io.shutdown().await.unwrap();

        assert_eq!(handle.sent_data(), vec![b"SYSTEM.STATE?\r".to_vec()]);
    }

    #[tokio::test]
    async fn empty_command_is_ignored() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let (inbound, _rx) = inbound_queue();
        let io = spawn_io_task(Box::new(mock), IoConfig::default(), inbound);

        assert_eq!(
            io.commands.send_text(""),
            CommandOutcome::Ignored(IgnoreReason::EmptyCommand)
        );
        io.shutdown().await.unwrap();
        assert!(handle.sent_data().is_empty());
    }

    #[tokio::test]
    async fn disconnected_transport_drops_command() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        handle.set_connected(false);
        let (inbound, _rx) = inbound_queue();
        let io = spawn_io_task(Box::new(mock), IoConfig::default(), inbound);

        assert_eq!(io.commands.send_text("DISPLAY.POWER=ON"), CommandOutcome::Sent);
        io.shutdown().await.unwrap();
        assert!(handle.sent_data().is_empty());
    }

    #[tokio::test]
    async fn full_channel_reports_backlog() {
        let mock = MockTransport::new();
        let (inbound, _rx) = inbound_queue();
        let config = IoConfig {
            command_capacity: 1,
            ..IoConfig::default()
        };
        let io = spawn_io_task(Box::new(mock), config, inbound);

        // The IO task has not run yet on the current-thread runtime.
        assert_eq!(io.commands.send_text("SOURCE.SELECT?"), CommandOutcome::Sent);
        assert_eq!(
            io.commands.send_text("SOURCE.SELECT?"),
            CommandOutcome::Ignored(IgnoreReason::Backlogged)
        );
        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn frames_inbound_lines_in_order() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let (inbound, mut rx) = inbound_queue();
        let io = spawn_io_task(Box::new(mock), IoConfig::default(), inbound);

        handle.push_inbound(b"system.state:powering.on\rsource.sel");
        handle.push_inbound(b"ect:hdmi.2\r\r");

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.text, "system.state:powering.on");
        assert_eq!(second.text, "source.select:hdmi.2");
        assert!(first.received_at <= second.received_at);

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn scripted_reply_reaches_queue() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        handle.expect_line("SYSTEM.STATE?", "system.state:standby");
        let (inbound, mut rx) = inbound_queue();
        let io = spawn_io_task(Box::new(mock), IoConfig::default(), inbound);

        io.commands.send_text("SYSTEM.STATE?");
        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.text, "system.state:standby");

        io.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_returns_transport() {
        let mock = MockTransport::new();
        let (inbound, _rx) = inbound_queue();
        let io = spawn_io_task(Box::new(mock), IoConfig::default(), inbound);

        let transport = io.shutdown().await.unwrap();
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn cancel_closes_command_channel() {
        let mock = MockTransport::new();
        let (inbound, _rx) = inbound_queue();
        let io = spawn_io_task(Box::new(mock), IoConfig::default(), inbound);
        let commands = io.commands.clone();

        io.cancel.cancel();
        io.task.await.unwrap();

        assert!(commands.is_closed());
        assert_eq!(
            commands.send_text("SYSTEM.STATE?"),
            CommandOutcome::Ignored(IgnoreReason::Closed)
        );
    }
}
