//! PlanarQeBuilder -- fluent builder for constructing [`PlanarQe`] instances.
//!
//! Separates configuration from construction so that callers can load the
//! device properties, override individual values and pick a transport
//! before anything is spawned.
//!
//! # Example
//!
//! ```no_run
//! use planar_qe::builder::PlanarQeBuilder;
//!
//! # async fn example() -> planar_core::Result<()> {
//! let display = PlanarQeBuilder::new()
//!     .key("lobby-wall")
//!     .supports_usb(true)
//!     .build_tcp("10.0.0.40:57")
//!     .await?;
//! display.initialize();
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use planar_core::error::{Error, Result};
use planar_core::transport::Transport;
use planar_core::types::DisplayInfo;
use planar_text_io::io::IoConfig;
use planar_transport::{SerialTransport, TcpTransport};

use crate::config::{DeviceConfig, PlanarQeConfig};
use crate::controller::{Options, PlanarQe};
use crate::engine::DisplayEngine;
use crate::inputs::{InputPort, standard_ports};
use crate::monitor::{CommMonitor, DEFAULT_ERROR_AFTER, DEFAULT_WARNING_AFTER};
use crate::poll::SETTLE_DELAY;

pub const DEFAULT_KEY: &str = "display-1";
pub const DEFAULT_NAME: &str = "Planar QE";

/// Fluent builder for [`PlanarQe`].
///
/// Every setting has a default, so the simplest usage is:
///
/// ```ignore
/// let display = PlanarQeBuilder::new().build_tcp("10.0.0.40:57").await?;
/// ```
pub struct PlanarQeBuilder {
    key: String,
    name: String,
    config: PlanarQeConfig,
    ports: Option<Vec<InputPort>>,
    settle_delay: Duration,
    warning_after: Duration,
    error_after: Duration,
    io: IoConfig,
}

impl Default for PlanarQeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanarQeBuilder {
    pub fn new() -> Self {
        PlanarQeBuilder {
            key: DEFAULT_KEY.to_string(),
            name: DEFAULT_NAME.to_string(),
            config: PlanarQeConfig::default(),
            ports: None,
            settle_delay: SETTLE_DELAY,
            warning_after: DEFAULT_WARNING_AFTER,
            error_after: DEFAULT_ERROR_AFTER,
            io: IoConfig::default(),
        }
    }

    /// Start from a device entry: key, name and properties.
    pub fn from_device(device: DeviceConfig) -> Self {
        let mut builder = Self::new().key(&device.key).config(device.properties);
        if let Some(name) = device.name {
            builder = builder.name(&name);
        }
        builder
    }

    pub fn key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Replace all device properties at once.
    pub fn config(mut self, config: PlanarQeConfig) -> Self {
        self.config = config;
        self
    }

    /// Poll interval in milliseconds. Values below 45000 are raised to it.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Warm-up window in milliseconds, capped at 15000.
    pub fn warming_time_ms(mut self, ms: u64) -> Self {
        self.config.warming_time_ms = ms;
        self
    }

    /// Cool-down window in milliseconds, capped at 15000.
    pub fn cooling_time_ms(mut self, ms: u64) -> Self {
        self.config.cooling_time_ms = ms;
        self
    }

    /// Put the USB-C port first in the table.
    pub fn supports_usb(mut self, enabled: bool) -> Self {
        self.config.supports_usb = enabled;
        self
    }

    /// Use a custom port table instead of the standard one.
    pub fn ports(mut self, ports: Vec<InputPort>) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Delay between the state and input queries of a status poll.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Silence thresholds for the Warning and Error monitor levels.
    pub fn monitor_thresholds(mut self, warning_after: Duration, error_after: Duration) -> Self {
        self.warning_after = warning_after;
        self.error_after = error_after;
        self
    }

    pub fn io_config(mut self, io: IoConfig) -> Self {
        self.io = io;
        self
    }

    /// Build a [`PlanarQe`] with a caller-provided transport.
    ///
    /// This is the entry point for tests (pass a `MockTransport` from
    /// `planar-test-harness`) and for callers that manage the transport
    /// themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<PlanarQe> {
        if self.key.is_empty() {
            return Err(Error::InvalidParameter("device key must not be empty".into()));
        }
        if self.warning_after >= self.error_after {
            return Err(Error::InvalidParameter(
                "monitor warning threshold must be below the error threshold".into(),
            ));
        }

        let ports = self
            .ports
            .unwrap_or_else(|| standard_ports(self.config.supports_usb));
        let engine = DisplayEngine::new(
            ports,
            self.config.warmup_time(),
            self.config.cooldown_time(),
        )?;

        let options = Options {
            info: DisplayInfo {
                manufacturer: "Planar".into(),
                model_name: "QE Series".into(),
                key: self.key,
                name: self.name,
            },
            settle_delay: self.settle_delay,
            poll_interval: self.config.poll_interval(),
            monitor: CommMonitor::new(self.warning_after, self.error_after),
            io: self.io,
        };
        Ok(PlanarQe::new(transport, engine, options))
    }

    /// Connect over TCP (`host:port`) and build.
    pub async fn build_tcp(self, addr: &str) -> Result<PlanarQe> {
        let transport = TcpTransport::connect(addr).await?;
        self.build_with_transport(Box::new(transport)).await
    }

    /// Open a serial port and build.
    pub async fn build_serial(self, port: &str, baud_rate: u32) -> Result<PlanarQe> {
        let transport = SerialTransport::open(port, baud_rate).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}
