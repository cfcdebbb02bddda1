//! Transport implementations for Planar display control.
//!
//! Concrete implementations of the [`Transport`](planar_core::Transport)
//! trait from `planar-core`:
//!
//! - [`SerialTransport`]: RS-232 ports and USB serial adapters
//! - [`TcpTransport`]: the display's LAN control port or a serial-to-IP bridge

pub mod serial;
pub mod tcp;

pub use serial::{
    DEFAULT_BAUD_RATE, DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits,
};
pub use tcp::TcpTransport;
