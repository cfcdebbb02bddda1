//! Error types for planar display control.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, configuration
//! problems, and bad caller input are all captured here.
//!
//! Device-side rejections (`ERR` lines) and refused commands are not errors:
//! the former are dropped by the response parser, the latter surface as
//! [`CommandOutcome::Ignored`](crate::types::CommandOutcome::Ignored).

/// The error type for all planar display operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, TCP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (oversized frame, undecodable bytes).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for data from the display.
    #[error("timeout waiting for response")]
    Timeout,

    /// An invalid parameter was passed to an operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The device configuration could not be parsed or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// No connection to the display has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the display was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_config() {
        let e = Error::Config("duplicate feedback token: hdmi.1".into());
        assert_eq!(
            e.to_string(),
            "configuration error: duplicate feedback token: hdmi.1"
        );
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("input 9 out of range".into());
        assert_eq!(e.to_string(), "invalid parameter: input 9 out of range");
    }

    #[test]
    fn error_display_unit_variants() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
        assert_eq!(Error::NotConnected.to_string(), "not connected");
        assert_eq!(Error::ConnectionLost.to_string(), "connection lost");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
