//! Core types shared by display drivers and their consumers.

use std::fmt;
use std::str::FromStr;

/// Power lifecycle of a display.
///
/// Exactly one state holds at any time. The public boolean views
/// ([`is_on`](Self::is_on), [`is_warming_up`](Self::is_warming_up),
/// [`is_cooling_down`](Self::is_cooling_down)) are derived from it, so
/// warming and cooling can never both be true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerState {
    /// Standby.
    #[default]
    Off,
    /// Powering on; inputs may not respond yet.
    WarmingUp,
    /// Fully on.
    On,
    /// Powering down.
    CoolingDown,
}

impl PowerState {
    /// `true` while warming up or fully on.
    pub fn is_on(&self) -> bool {
        matches!(self, PowerState::WarmingUp | PowerState::On)
    }

    pub fn is_warming_up(&self) -> bool {
        matches!(self, PowerState::WarmingUp)
    }

    pub fn is_cooling_down(&self) -> bool {
        matches!(self, PowerState::CoolingDown)
    }

    /// `true` in either transitional state.
    pub fn in_transition(&self) -> bool {
        self.is_warming_up() || self.is_cooling_down()
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerState::Off => "off",
            PowerState::WarmingUp => "warming-up",
            PowerState::On => "on",
            PowerState::CoolingDown => "cooling-down",
        };
        write!(f, "{s}")
    }
}

bitflags::bitflags! {
    /// Signal carried by an input port.
    ///
    /// Combine with bitwise OR: `SignalType::USB_INPUT | SignalType::USB_OUTPUT`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SignalType: u8 {
        const NONE = 0;
        const AUDIO = 1 << 0;
        const VIDEO = 1 << 1;
        const USB_INPUT = 1 << 2;
        const USB_OUTPUT = 1 << 3;
        const AUDIO_VIDEO = Self::AUDIO.bits() | Self::VIDEO.bits();
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                write!(f, "+")?;
            }
            write!(f, "{}", name.to_ascii_lowercase().replace('_', "-"))?;
        }
        Ok(())
    }
}

/// Physical connector of an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    Hdmi,
    DisplayPort,
    UsbC,
    /// Slot-in PC or other internal source without an external connector.
    None,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionKind::Hdmi => "HDMI",
            ConnectionKind::DisplayPort => "DisplayPort",
            ConnectionKind::UsbC => "USB-C",
            ConnectionKind::None => "none",
        };
        write!(f, "{s}")
    }
}

/// Level reported by the communication monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MonitorStatus {
    /// Nothing received yet.
    #[default]
    Unknown,
    Ok,
    /// Silent past the warning threshold.
    Warning,
    /// Silent past the error threshold.
    Error,
}

impl MonitorStatus {
    /// A device is online while the monitor reports Ok or Warning.
    pub fn is_online(&self) -> bool {
        matches!(self, MonitorStatus::Ok | MonitorStatus::Warning)
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorStatus::Unknown => "unknown",
            MonitorStatus::Ok => "ok",
            MonitorStatus::Warning => "warning",
            MonitorStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a string cannot be parsed into a [`MonitorStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMonitorStatusError(String);

impl fmt::Display for ParseMonitorStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown monitor status: {}", self.0)
    }
}

impl std::error::Error for ParseMonitorStatusError {}

impl FromStr for MonitorStatus {
    type Err = ParseMonitorStatusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(MonitorStatus::Unknown),
            "ok" => Ok(MonitorStatus::Ok),
            "warning" => Ok(MonitorStatus::Warning),
            "error" => Ok(MonitorStatus::Error),
            _ => Err(ParseMonitorStatusError(s.to_string())),
        }
    }
}

/// Static information about a display device instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Manufacturer name, e.g. "Planar".
    pub manufacturer: String,
    /// Model family, e.g. "QE Series".
    pub model_name: String,
    /// Unique device key within the host application.
    pub key: String,
    /// Human-readable device name.
    pub name: String,
}

/// Why a command was not put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// The command text was empty.
    EmptyCommand,
    /// A power command arrived during warm-up or cool-down.
    InTransition,
    /// The requested input number is outside the accepted range.
    OutOfRange,
    /// The requested port key does not exist.
    UnknownInput,
    /// The port has no selector (it cannot be routed to).
    NoSelector,
    /// The outbound command queue is full.
    Backlogged,
    /// The IO task has shut down.
    Closed,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IgnoreReason::EmptyCommand => "empty command",
            IgnoreReason::InTransition => "power transition in progress",
            IgnoreReason::OutOfRange => "input number out of range",
            IgnoreReason::UnknownInput => "unknown input",
            IgnoreReason::NoSelector => "input has no selector",
            IgnoreReason::Backlogged => "command queue full",
            IgnoreReason::Closed => "io task closed",
        };
        write!(f, "{s}")
    }
}

/// Result of a fire-and-forget command.
///
/// Commands never wait for a device reply, so there is nothing to return
/// beyond whether the request was handed to the IO task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandOutcome {
    /// Handed to the IO task for transmission.
    Sent,
    /// Parked until the display finishes powering on.
    Deferred,
    /// Refused without sending anything.
    Ignored(IgnoreReason),
}

impl CommandOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, CommandOutcome::Ignored(_))
    }
}
