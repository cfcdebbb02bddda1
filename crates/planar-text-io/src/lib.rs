//! Shared IO pipeline for CR-terminated display protocols.
//!
//! One tokio task owns the transport exclusively and handles outbound
//! command writes plus idle reading. Inbound bytes are framed into lines and
//! handed to a single queue worker, so response processing is strictly
//! sequential and decoupled from the transport.
//!
//! # Architecture
//!
//! - [`protocol`] -- CR line framing and command encoding
//! - [`queue`] -- unbounded inbound FIFO with a single worker
//! - [`io`] -- IO task types, spawn, and the select loop

pub mod io;
pub mod protocol;
pub mod queue;
