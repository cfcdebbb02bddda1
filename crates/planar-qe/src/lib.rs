//! Planar QE series display driver.
//!
//! The QE panels speak a line-oriented ASCII protocol over RS-232 or TCP:
//! commands such as `DISPLAY.POWER=ON` go out terminated by `\r`, and the
//! display reports its state with `type:value` lines such as
//! `system.state:powering.on` or `source.select:hdmi.2`. Nothing is
//! request/response; every reply is handled as an unsolicited update.
//!
//! This crate provides:
//!
//! - **Command builders** ([`commands`]) -- wire text for power, source and
//!   query commands.
//! - **Response parser** ([`protocol`]) -- classifies inbound lines.
//! - **Power state machine** ([`power`]) -- warm-up and cool-down debounce.
//! - **Input routing** ([`inputs`], [`routing`]) -- the port table,
//!   confirmed selection and per-port feedback.
//! - **Engine** ([`engine`]) -- the synchronous core tying the above
//!   together, including switches deferred until power settles on.
//! - **Controller** ([`controller`]) -- the
//!   [`DisplayControl`](planar_core::DisplayControl) implementation with
//!   timers, event broadcast and the communication [`monitor`].
//! - **Builder** ([`builder`]) and **config** ([`config`]).
//!
//! # Example
//!
//! ```no_run
//! use planar_core::DisplayControl;
//! use planar_qe::PlanarQeBuilder;
//!
//! # async fn example() -> planar_core::Result<()> {
//! let display = PlanarQeBuilder::new().build_tcp("10.0.0.40:57").await?;
//! display.initialize();
//! let mut events = display.subscribe();
//! display.set_input(2);
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod commands;
pub mod config;
pub mod controller;
pub mod engine;
pub mod inputs;
pub mod monitor;
pub mod poll;
pub mod power;
pub mod protocol;
pub mod routing;

pub use builder::PlanarQeBuilder;
pub use config::{DeviceConfig, PlanarQeConfig};
pub use controller::PlanarQe;
pub use inputs::{InputCatalog, InputPort, standard_ports};
