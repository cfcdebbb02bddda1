//! planar-test-harness: Test utilities and mock transports for Planar
//! display drivers.
//!
//! This crate provides [`MockTransport`] for deterministic testing of the
//! protocol engine without a physical display, plus the [`MockHandle`] used
//! to drive it once the transport belongs to an IO task.

pub mod mock_transport;

pub use mock_transport::{MockHandle, MockTransport};
