//! TCP transport for displays reached through their LAN control port or a
//! serial-to-IP bridge.
//!
//! # Example
//!
//! ```no_run
//! use planar_transport::TcpTransport;
//! use planar_core::transport::Transport;
//!
//! # async fn example() -> planar_core::Result<()> {
//! let mut transport = TcpTransport::connect("10.0.20.31:57").await?;
//! transport.send(b"SYSTEM.STATE?\r").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use planar_core::error::{Error, Result};
use planar_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport for display communication.
///
/// The connection is established eagerly. EOF or a reset from the peer is
/// reported once as [`Error::ConnectionLost`]; the socket is then dropped
/// and every later call reports [`Error::NotConnected`].
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying TCP stream, `None` after `close()` is called.
    stream: Option<TcpStream>,
    addr: String,
}

impl TcpTransport {
    /// Connect to a `host:port` endpoint using the default timeout.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to a `host:port` endpoint, giving up after `timeout`.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(
            addr = %addr,
            timeout_ms = timeout.as_millis(),
            "connecting to display"
        );

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "display connection timed out");
                Error::Timeout
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "display connection failed");
                map_connect_error(e, addr)
            })?;

        // Commands are a few bytes each; do not let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "failed to set TCP_NODELAY");
        }

        tracing::info!(addr = %addr, "display connection established");

        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
        })
    }

    /// Wrap an already-connected stream. `addr` is only used for logging.
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        Self {
            stream: Some(stream),
            addr,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Drop the socket if `err` means the link is gone.
    fn fail(&mut self, err: Error) -> Error {
        if matches!(err, Error::ConnectionLost) {
            self.stream = None;
        }
        err
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(addr = %self.addr, data = ?data, "sending");

        let written = match stream.write_all(data).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::error!(addr = %self.addr, error = %e, "send failed");
            return Err(self.fail(map_io_error(e)));
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let read = tokio::time::timeout(timeout, stream.read(buf)).await;
        match read {
            Ok(Ok(0)) => {
                tracing::warn!(addr = %self.addr, "display closed the connection");
                self.stream = None;
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(addr = %self.addr, data = ?&buf[..n], "received");
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(addr = %self.addr, error = %e, "receive failed");
                Err(self.fail(map_io_error(e)))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::warn!(addr = %self.addr, error = %e, "TCP shutdown failed");
            }
            tracing::info!(addr = %self.addr, "display connection closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

fn map_connect_error(e: std::io::Error, addr: &str) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused: {addr}"))
        }
        _ => Error::Io(e),
    }
}

fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn test_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn query_and_reply_over_socket() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"SYSTEM.STATE?\r");
            stream.write_all(b"system.state:on\r").await.unwrap();
            stream.flush().await.unwrap();
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.addr(), addr);

        transport.send(b"SYSTEM.STATE?\r").await.unwrap();
        let mut buf = [0u8; 64];
        let n = transport
            .receive(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"system.state:on\r");

        transport.close().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        match TcpTransport::connect(&addr).await {
            Err(Error::Transport(msg)) => assert!(msg.contains("connection refused")),
            other => panic!("expected Transport error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn receive_timeout() {
        let (listener, addr) = test_listener().await;
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        let mut buf = [0u8; 64];
        let result = transport.receive(&mut buf, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(Error::Timeout)));

        server.abort();
    }

    #[tokio::test]
    async fn peer_close_is_connection_lost() {
        let (listener, addr) = test_listener().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        server.await.unwrap();

        let mut buf = [0u8; 64];
        let result = transport.receive(&mut buf, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(Error::ConnectionLost)), "got: {result:?}");
        assert!(!transport.is_connected());

        // Reported once; afterwards the link is simply down.
        let again = transport.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(again, Err(Error::NotConnected)), "got: {again:?}");
        assert!(matches!(
            transport.send(b"SYSTEM.STATE?\r").await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn closed_transport_reports_not_connected() {
        let (listener, addr) = test_listener().await;
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        // Closing twice is fine.
        transport.close().await.unwrap();

        assert!(matches!(
            transport.send(b"SYSTEM.STATE?\r").await,
            Err(Error::NotConnected)
        ));
        let mut buf = [0u8; 8];
        assert!(matches!(
            transport.receive(&mut buf, Duration::from_millis(10)).await,
            Err(Error::NotConnected)
        ));

        server.abort();
    }
}
