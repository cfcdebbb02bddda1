//! Mock transport for deterministic testing of display drivers.
//!
//! [`MockTransport`] implements the [`Transport`] trait over shared state
//! that a [`MockHandle`] can reach after the transport has been moved into
//! an IO task. Tests use the handle to inject unsolicited device lines,
//! script replies to specific commands, and inspect everything sent.
//!
//! # Example
//!
//! ```
//! use planar_test_harness::MockTransport;
//!
//! let mock = MockTransport::new();
//! let handle = mock.handle();
//! handle.expect_line("SYSTEM.STATE?", "system.state:on");
//! handle.push_line("display.power:on");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use planar_core::error::{Error, Result};
use planar_core::transport::Transport;

/// Line terminator appended by the `*_line` helpers.
const CR: u8 = b'\r';

/// A scripted reply: when `request` is sent, `response` becomes readable.
#[derive(Debug, Clone)]
struct Rule {
    request: Vec<u8>,
    response: Vec<u8>,
    /// Persistent rules answer every matching send; others are consumed once.
    repeat: bool,
}

#[derive(Debug)]
struct MockState {
    rules: VecDeque<Rule>,
    inbound: VecDeque<u8>,
    connected: bool,
    sent_log: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<MockState>,
    data_ready: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A mock [`Transport`] for testing without hardware.
///
/// Sends are always recorded. A send that matches a scripted rule queues
/// that rule's response for `receive()`; a send with no matching rule is
/// accepted silently, the way a real display ignores commands it does not
/// answer.
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

/// Control handle for a [`MockTransport`] that has been moved elsewhere.
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            shared: Arc::new(Shared {
                state: Mutex::new(MockState {
                    rules: VecDeque::new(),
                    inbound: VecDeque::new(),
                    connected: true,
                    sent_log: Vec::new(),
                }),
                data_ready: Notify::new(),
            }),
        }
    }

    /// Return a handle sharing this transport's state.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHandle {
    /// Reply once with `response` when exactly `request` is sent.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.add_rule(request, response, false);
    }

    /// Reply with `response` every time exactly `request` is sent.
    pub fn respond_always(&self, request: &[u8], response: &[u8]) {
        self.add_rule(request, response, true);
    }

    /// Like [`expect`](Self::expect), with both sides CR-terminated.
    pub fn expect_line(&self, command: &str, reply: &str) {
        self.expect(&with_cr(command), &with_cr(reply));
    }

    /// Like [`respond_always`](Self::respond_always), with both sides CR-terminated.
    pub fn respond_always_line(&self, command: &str, reply: &str) {
        self.respond_always(&with_cr(command), &with_cr(reply));
    }

    fn add_rule(&self, request: &[u8], response: &[u8], repeat: bool) {
        self.shared.lock().rules.push_back(Rule {
            request: request.to_vec(),
            response: response.to_vec(),
            repeat,
        });
    }

    /// Make raw bytes readable as if the display had sent them.
    pub fn push_inbound(&self, data: &[u8]) {
        self.shared.lock().inbound.extend(data.iter().copied());
        self.shared.data_ready.notify_one();
    }

    /// Inject one CR-terminated line from the display.
    pub fn push_line(&self, line: &str) {
        self.push_inbound(&with_cr(line));
    }

    /// All data sent through the transport, one element per `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.shared.lock().sent_log.clone()
    }

    /// Sent commands decoded as text with the trailing CR removed.
    pub fn sent_lines(&self) -> Vec<String> {
        self.shared
            .lock()
            .sent_log
            .iter()
            .map(|bytes| {
                let body = bytes.strip_suffix(&[CR]).unwrap_or(bytes);
                String::from_utf8_lossy(body).into_owned()
            })
            .collect()
    }

    /// Forget everything sent so far.
    pub fn clear_sent(&self) {
        self.shared.lock().sent_log.clear();
    }

    /// Number of one-shot rules that have not been matched yet.
    pub fn remaining_expectations(&self) -> usize {
        self.shared.lock().rules.iter().filter(|r| !r.repeat).count()
    }

    /// Set the connected state.
    ///
    /// When `false`, `send()` and `receive()` return [`Error::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.shared.lock().connected = connected;
        self.shared.data_ready.notify_one();
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }
}

fn with_cr(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(CR);
    bytes
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.shared.lock();
        if !state.connected {
            return Err(Error::NotConnected);
        }

        state.sent_log.push(data.to_vec());

        let matched = state.rules.iter().position(|r| r.request == data);
        if let Some(idx) = matched {
            let response = if state.rules[idx].repeat {
                state.rules[idx].response.clone()
            } else {
                state
                    .rules
                    .remove(idx)
                    .map(|r| r.response)
                    .unwrap_or_default()
            };
            state.inbound.extend(response);
            drop(state);
            self.shared.data_ready.notify_one();
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut state = self.shared.lock();
                if !state.connected {
                    return Err(Error::NotConnected);
                }
                if !state.inbound.is_empty() {
                    let n = state.inbound.len().min(buf.len());
                    for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
            }

            if tokio::time::timeout_at(deadline, self.shared.data_ready.notified())
                .await
                .is_err()
            {
                return Err(Error::Timeout);
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.shared.lock();
        state.connected = false;
        state.inbound.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_reply_follows_matching_send() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();
        handle.expect_line("SYSTEM.STATE?", "system.state:on");

        mock.send(b"SYSTEM.STATE?\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"system.state:on\r");
        assert_eq!(handle.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn unmatched_send_is_recorded_without_reply() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();

        mock.send(b"DISPLAY.POWER=ON\r").await.unwrap();
        assert_eq!(handle.sent_lines(), vec!["DISPLAY.POWER=ON".to_string()]);

        let mut buf = [0u8; 16];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn persistent_rule_answers_every_send() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();
        handle.respond_always_line("SOURCE.SELECT?", "source.select:dp");

        mock.send(b"SOURCE.SELECT?\r").await.unwrap();
        mock.send(b"SOURCE.SELECT?\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"source.select:dp\rsource.select:dp\r");
        assert_eq!(handle.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn pushed_line_wakes_pending_receive() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();

        let pusher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.push_line("display.power:off");
        });

        let mut buf = [0u8; 64];
        let n = mock.receive(&mut buf, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&buf[..n], b"display.power:off\r");
        pusher.await.unwrap();
    }

    #[tokio::test]
    async fn receive_respects_buffer_size() {
        let mut mock = MockTransport::new();
        mock.handle().push_inbound(b"abcdef");

        let mut buf = [0u8; 4];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"abcd");
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"ef");
    }

    #[tokio::test]
    async fn disconnected_transport_errors() {
        let mut mock = MockTransport::new();
        let handle = mock.handle();
        handle.set_connected(false);

        assert!(!mock.is_connected());
        assert!(matches!(mock.send(b"x").await, Err(Error::NotConnected)));
        let mut buf = [0u8; 4];
        assert!(matches!(
            mock.receive(&mut buf, Duration::from_millis(10)).await,
            Err(Error::NotConnected)
        ));
        assert!(handle.sent_data().is_empty());
    }

    #[tokio::test]
    async fn close_disconnects() {
        let mut mock = MockTransport::new();
        mock.close().await.unwrap();
        assert!(!mock.is_connected());
    }
}
