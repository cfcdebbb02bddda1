//! Planar QE command builders.
//!
//! All functions are pure and return the command text without its
//! terminator; the IO task appends `\r` when writing. Replies never come
//! back on a request/response basis, they arrive as ordinary inbound lines.

use std::fmt;

/// A selectable video source as the display names it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// HDMI input 1-4.
    Hdmi(u8),
    DisplayPort,
    /// Slot-in PC (Open Pluggable Specification).
    Ops,
}

impl Source {
    /// The token used after `SOURCE.SELECT=`.
    pub fn wire_name(&self) -> String {
        match self {
            Source::Hdmi(n) => format!("HDMI.{n}"),
            Source::DisplayPort => "DP".to_string(),
            Source::Ops => "OPS".to_string(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// `DISPLAY.POWER=ON`
pub fn cmd_power_on() -> String {
    "DISPLAY.POWER=ON".to_string()
}

/// `DISPLAY.POWER=OFF`
pub fn cmd_power_off() -> String {
    "DISPLAY.POWER=OFF".to_string()
}

/// `SYSTEM.STATE?` -- answered with `system.state:<state>`.
pub fn cmd_query_state() -> String {
    "SYSTEM.STATE?".to_string()
}

/// `SOURCE.SELECT?` -- answered with `source.select:<token>`.
pub fn cmd_query_source() -> String {
    "SOURCE.SELECT?".to_string()
}

/// `SOURCE.SELECT+` -- step to the next source.
pub fn cmd_next_source() -> String {
    "SOURCE.SELECT+".to_string()
}

/// `SOURCE.SELECT=<source>`
pub fn cmd_select_source(source: Source) -> String {
    format!("SOURCE.SELECT={}", source.wire_name())
}
