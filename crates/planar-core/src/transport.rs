//! Transport trait for display communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a display:
//! an RS-232 port, a raw TCP socket, or the scripted mock from the
//! `planar-test-harness` crate. The IO task in `planar-text-io` is the only
//! owner of a transport once a device is built.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a display.
///
/// Framing is not the transport's concern: the IO task splits the byte
/// stream on the protocol terminator.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the display.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying link.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the display into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing arrives within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
