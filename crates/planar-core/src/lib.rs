//! planar-core: Core traits, types, and error definitions for Planar display
//! control.
//!
//! This crate defines the vendor-agnostic pieces every display driver in the
//! workspace shares. Applications depend on these types without pulling in
//! a specific protocol implementation.
//!
//! # Key types
//!
//! - [`DisplayControl`] -- the trait for controlling a display
//! - [`Transport`] -- byte-level communication channel
//! - [`DisplayEvent`] -- asynchronous state change notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod display;
pub mod error;
pub mod events;
pub mod transport;
pub mod types;

pub use display::DisplayControl;
pub use error::{Error, Result};
pub use events::DisplayEvent;
pub use transport::Transport;
pub use types::*;
