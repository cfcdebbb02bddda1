//! Response parsing for Planar QE feedback lines.
//!
//! The display reports state as `type:value` lines, e.g.
//! `system.state:powering.on` or `source.select:hdmi.2`. Device-side errors
//! contain `ERR` and are not tracked.

use std::fmt;
use std::str::FromStr;

/// Lifecycle values reported by `system.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemState {
    PoweringOn,
    PoweringDown,
    On,
    Standby,
    Fault,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SystemState::PoweringOn => "powering.on",
            SystemState::PoweringDown => "powering.down",
            SystemState::On => "on",
            SystemState::Standby => "standby",
            SystemState::Fault => "fault",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a `system.state` value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSystemStateError(String);

impl fmt::Display for ParseSystemStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown system state: {}", self.0)
    }
}

impl std::error::Error for ParseSystemStateError {}

impl FromStr for SystemState {
    type Err = ParseSystemStateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "powering.on" => Ok(SystemState::PoweringOn),
            "powering.down" => Ok(SystemState::PoweringDown),
            "on" => Ok(SystemState::On),
            "standby" => Ok(SystemState::Standby),
            "fault" => Ok(SystemState::Fault),
            _ => Err(ParseSystemStateError(s.to_string())),
        }
    }
}

/// One classified feedback line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `system.state:<state>`
    SystemState(SystemState),
    /// `system.state:` with a value outside the known set.
    UnknownSystemState(String),
    /// `display.power:<value>`; true when the value contains `on`.
    DisplayPower(bool),
    /// `source.select:<token>`, token lower-cased.
    SourceSelect(String),
    /// A well-formed line of a type this driver does not track.
    Unknown { kind: String, value: String },
    /// No `:` separator, or a device error report.
    Untracked,
}

pub const TYPE_SYSTEM_STATE: &str = "system.state";
pub const TYPE_DISPLAY_POWER: &str = "display.power";
pub const TYPE_SOURCE_SELECT: &str = "source.select";

/// Classify one line of device output.
///
/// The `ERR` check is case-sensitive and runs on the raw line. Everything
/// else is compared lower-cased, split on the first `:`.
pub fn parse_response(line: &str) -> Response {
    if !line.contains(':') || line.contains("ERR") {
        return Response::Untracked;
    }

    let lower = line.to_lowercase();
    let Some((kind, value)) = lower.split_once(':') else {
        return Response::Untracked;
    };
    let kind = kind.trim();
    let value = value.trim();

    match kind {
        TYPE_SYSTEM_STATE => match value.parse::<SystemState>() {
            Ok(state) => Response::SystemState(state),
            Err(_) => Response::UnknownSystemState(value.to_string()),
        },
        TYPE_DISPLAY_POWER => Response::DisplayPower(value.contains("on")),
        TYPE_SOURCE_SELECT => Response::SourceSelect(value.to_string()),
        _ => Response::Unknown {
            kind: kind.to_string(),
            value: value.to_string(),
        },
    }
}
