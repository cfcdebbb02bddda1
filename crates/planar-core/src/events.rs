//! Display event types.
//!
//! Events are emitted by device drivers through a [`tokio::sync::broadcast`]
//! channel when observable state changes. Control-room UIs subscribe to
//! these instead of polling the power and input getters.

use crate::types::MonitorStatus;

/// An event emitted by a display driver when its state changes.
///
/// Subscribe via [`crate::display::DisplayControl::subscribe()`]. Delivery is
/// best-effort through a bounded broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// The derived "power is on" value changed.
    PowerChanged {
        /// `true` while warming up or on.
        on: bool,
    },

    /// The warm-up flag changed.
    WarmingChanged {
        /// `true` while the display is warming up.
        warming: bool,
    },

    /// The cool-down flag changed.
    CoolingChanged {
        /// `true` while the display is cooling down.
        cooling: bool,
    },

    /// The current input changed as reported by the display.
    InputChanged {
        /// 1-based position in the port table, 0 when unknown.
        number: usize,
        /// Key of the selected port, `None` when unknown.
        key: Option<String>,
    },

    /// A per-port selected flag changed.
    InputFeedback {
        /// Port key.
        key: String,
        /// Whether the port is now the active one.
        selected: bool,
    },

    /// The communication monitor changed level.
    MonitorStatusChanged {
        /// New monitor level.
        status: MonitorStatus,
    },

    /// The device went online or offline.
    OnlineChanged {
        /// `true` when the monitor reports Ok or Warning.
        online: bool,
    },
}
