//! The `DisplayControl` trait -- unified interface for display backends.
//!
//! Room-control logic programs against `dyn DisplayControl` without knowing
//! which vendor protocol sits underneath. All commands are fire-and-forget:
//! state only changes when the display reports it, and observers learn of
//! it through [`subscribe()`](DisplayControl::subscribe).

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::events::DisplayEvent;
use crate::types::*;

/// Asynchronous interface for controlling a flat-panel display.
#[async_trait]
pub trait DisplayControl: Send + Sync {
    /// Static information about the device (manufacturer, model, key).
    fn info(&self) -> &DisplayInfo;

    /// Request power on. Refused while warming up or cooling down.
    fn power_on(&self) -> CommandOutcome;

    /// Request power off. Refused while warming up or cooling down.
    fn power_off(&self) -> CommandOutcome;

    /// Send on or off depending on the current derived power value.
    fn power_toggle(&self) -> CommandOutcome;

    /// Current power lifecycle state.
    fn power_state(&self) -> PowerState;

    /// Route to the input at 1-based position `number` in the port table.
    fn set_input(&self, number: usize) -> CommandOutcome;

    /// Route to the input with the given port key.
    fn select_input(&self, key: &str) -> CommandOutcome;

    /// Key of the input the display last reported, if known.
    fn current_input(&self) -> Option<String>;

    /// Ask the display for power state and, if on, the current input.
    async fn status_get(&self);

    /// `true` while the communication monitor reports Ok or Warning.
    fn is_online(&self) -> bool;

    /// Re-publish every observable value to subscribers.
    fn fire_updates(&self);

    /// Subscribe to state change events.
    fn subscribe(&self) -> broadcast::Receiver<DisplayEvent>;
}
