//! Synchronous protocol engine.
//!
//! [`DisplayEngine`] owns every piece of mutable display state and never
//! performs IO. Each operation records what must happen next as
//! [`Effect`]s: commands to write, events to publish, timers to arm. The
//! controller applies them after releasing its lock, so no callback ever
//! runs while state is borrowed.

use std::time::Duration;

use tracing::{debug, info, warn};

use planar_core::error::Result;
use planar_core::events::DisplayEvent;
use planar_core::types::{CommandOutcome, IgnoreReason, PowerState};

use crate::commands::{self, Source};
use crate::inputs::{InputCatalog, InputPort};
use crate::power::{PowerChange, PowerMachine, TimerKind, TimerRequest};
use crate::protocol::{Response, SystemState, parse_response};
use crate::routing::InputRouter;

/// Something the engine needs done outside its lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write a command (terminator not included).
    Send(String),
    /// Publish an event to subscribers.
    Notify(DisplayEvent),
    /// Arm a single-shot timer, replacing any live timer of the same kind.
    StartTimer(TimerRequest),
}

/// Ordered effect list produced by one engine call.
#[derive(Debug, Default)]
pub struct Effects(Vec<Effect>);

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    fn send(&mut self, cmd: String) {
        self.0.push(Effect::Send(cmd));
    }

    fn notify(&mut self, event: DisplayEvent) {
        self.0.push(Effect::Notify(event));
    }

    fn start_timer(&mut self, request: TimerRequest) {
        self.0.push(Effect::StartTimer(request));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Effect] {
        &self.0
    }

    /// Commands in the order they were recorded.
    pub fn sent(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter_map(|e| match e {
                Effect::Send(cmd) => Some(cmd.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<&DisplayEvent> {
        self.0
            .iter()
            .filter_map(|e| match e {
                Effect::Notify(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn timers(&self) -> Vec<TimerRequest> {
        self.0
            .iter()
            .filter_map(|e| match e {
                Effect::StartTimer(request) => Some(*request),
                _ => None,
            })
            .collect()
    }
}

impl IntoIterator for Effects {
    type Item = Effect;
    type IntoIter = std::vec::IntoIter<Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Power, routing and deferred-switch state for one display.
#[derive(Debug)]
pub struct DisplayEngine {
    power: PowerMachine,
    router: InputRouter,
    catalog: InputCatalog,
    /// Switches requested while off, sent once power settles on.
    pending_switches: Vec<Source>,
}

impl DisplayEngine {
    pub fn new(ports: Vec<InputPort>, warmup_time: Duration, cooldown_time: Duration) -> Result<Self> {
        let catalog = InputCatalog::from_ports(&ports);
        let router = InputRouter::new(ports)?;
        Ok(DisplayEngine {
            power: PowerMachine::new(warmup_time, cooldown_time),
            router,
            catalog,
            pending_switches: Vec::new(),
        })
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    pub fn router(&self) -> &InputRouter {
        &self.router
    }

    pub fn catalog(&self) -> &InputCatalog {
        &self.catalog
    }

    pub fn pending_switches(&self) -> &[Source] {
        &self.pending_switches
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Parse one device line and apply it.
    pub fn handle_line(&mut self, line: &str, fx: &mut Effects) -> Response {
        let response = parse_response(line);
        match &response {
            Response::SystemState(SystemState::Fault) => {
                warn!(line = %line, "display reports fault state");
            }
            Response::SystemState(reported) => {
                debug!(state = %reported, "system state");
                if let Some(change) = self.power.apply_system_state(*reported) {
                    self.apply_power_change(change, fx);
                }
            }
            Response::UnknownSystemState(value) => {
                debug!(value = %value, "unknown system state");
            }
            Response::DisplayPower(on) => {
                debug!(on = *on, "display power");
                if let Some(change) = self.power.set_power_is_on(*on) {
                    self.apply_power_change(change, fx);
                }
            }
            Response::SourceSelect(token) => self.confirm_source(token, fx),
            Response::Unknown { kind, .. } => {
                debug!(response_type = %kind, line = %line, "unknown response type");
            }
            Response::Untracked => {
                debug!(line = %line, "ignoring untracked response");
            }
        }
        response
    }

    fn confirm_source(&mut self, token: &str, fx: &mut Effects) {
        let Some(change) = self.router.confirm(token) else {
            return;
        };

        info!(input = %change.key, number = change.number, "input changed");
        fx.notify(DisplayEvent::InputChanged {
            number: change.number,
            key: Some(change.key.clone()),
        });
        for (key, selected) in change.feedback {
            fx.notify(DisplayEvent::InputFeedback { key, selected });
        }
        self.catalog.select(&change.key);
    }

    fn apply_power_change(&mut self, change: PowerChange, fx: &mut Effects) {
        info!(from = %change.before, to = %change.after, "power state changed");

        if change.power_changed() {
            fx.notify(DisplayEvent::PowerChanged {
                on: change.after.is_on(),
            });
        }
        if change.warming_changed() {
            fx.notify(DisplayEvent::WarmingChanged {
                warming: change.after.is_warming_up(),
            });
        }
        if change.cooling_changed() {
            fx.notify(DisplayEvent::CoolingChanged {
                cooling: change.after.is_cooling_down(),
            });
        }
        if let Some(request) = change.timer {
            fx.start_timer(request);
        }
        if change.settled_on() && !self.pending_switches.is_empty() {
            for source in self.pending_switches.drain(..) {
                info!(source = %source, "power settled, sending deferred switch");
                fx.send(commands::cmd_select_source(source));
            }
        }
    }

    /// A warm-up or cool-down timer armed with `generation` fired.
    pub fn timer_elapsed(&mut self, kind: TimerKind, generation: u64, fx: &mut Effects) {
        if let Some(change) = self.power.timer_elapsed(kind, generation) {
            self.apply_power_change(change, fx);
        } else {
            debug!(?kind, generation, "ignoring stale timer");
        }
    }

    // -----------------------------------------------------------------------
    // Power commands
    // -----------------------------------------------------------------------

    pub fn power_on(&mut self, fx: &mut Effects) -> CommandOutcome {
        if self.power.state().in_transition() {
            info!(state = %self.power.state(), "power on refused during transition");
            return CommandOutcome::Ignored(IgnoreReason::InTransition);
        }
        fx.send(commands::cmd_power_on());
        CommandOutcome::Sent
    }

    pub fn power_off(&mut self, fx: &mut Effects) -> CommandOutcome {
        if self.power.state().in_transition() {
            info!(state = %self.power.state(), "power off refused during transition");
            return CommandOutcome::Ignored(IgnoreReason::InTransition);
        }
        fx.send(commands::cmd_power_off());
        CommandOutcome::Sent
    }

    pub fn power_toggle(&mut self, fx: &mut Effects) -> CommandOutcome {
        if self.power.state().is_on() {
            self.power_off(fx)
        } else {
            self.power_on(fx)
        }
    }

    // -----------------------------------------------------------------------
    // Input commands
    // -----------------------------------------------------------------------

    /// Route to the port at 1-based position `number`.
    pub fn set_input(&mut self, number: usize, fx: &mut Effects) -> CommandOutcome {
        let Some(port) = self.router.resolve_number(number) else {
            warn!(
                number,
                port_count = self.router.port_count(),
                "input number out of range"
            );
            return CommandOutcome::Ignored(IgnoreReason::OutOfRange);
        };
        debug!(number, input = %port.key, "set input");
        let selector = port.selector;
        self.execute_switch(selector, fx)
    }

    /// Route to the port with `key`.
    pub fn select_input(&mut self, key: &str, fx: &mut Effects) -> CommandOutcome {
        let Some(port) = self.router.find_key(key) else {
            warn!(input = %key, "unknown input key");
            return CommandOutcome::Ignored(IgnoreReason::UnknownInput);
        };
        let selector = port.selector;
        self.execute_switch(selector, fx)
    }

    /// Send a routing command now, or park it until power settles on.
    pub fn execute_switch(&mut self, selector: Option<Source>, fx: &mut Effects) -> CommandOutcome {
        let Some(source) = selector else {
            debug!("input has no selector, nothing to send");
            return CommandOutcome::Ignored(IgnoreReason::NoSelector);
        };

        if self.power.state().is_on() {
            fx.send(commands::cmd_select_source(source));
            return CommandOutcome::Sent;
        }

        info!(source = %source, "display off, deferring switch until power on");
        self.pending_switches.push(source);
        self.power_on(fx);
        CommandOutcome::Deferred
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Record a notification for every current value.
    pub fn current_values(&self, fx: &mut Effects) {
        let state = self.power.state();
        fx.notify(DisplayEvent::PowerChanged { on: state.is_on() });
        fx.notify(DisplayEvent::WarmingChanged {
            warming: state.is_warming_up(),
        });
        fx.notify(DisplayEvent::CoolingChanged {
            cooling: state.is_cooling_down(),
        });
        fx.notify(DisplayEvent::InputChanged {
            number: self.router.current_number(),
            key: self.router.current_key().map(str::to_string),
        });
        for (key, selected) in self.router.feedback() {
            fx.notify(DisplayEvent::InputFeedback { key, selected });
        }
    }
}
