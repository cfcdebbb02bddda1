//! Power lifecycle with warm-up and cool-down debounce.
//!
//! [`PowerMachine`] holds the canonical [`PowerState`]. Entering a
//! transitional state hands back a [`TimerRequest`]; the owner schedules it
//! and reports the expiry through [`PowerMachine::timer_elapsed`]. Each arm
//! bumps a generation counter so a fire from a replaced timer is ignored.

use std::time::Duration;

use planar_core::types::PowerState;

use crate::protocol::SystemState;

/// Upper bound on warm-up and cool-down windows.
pub const MAX_TRANSITION_TIME: Duration = Duration::from_millis(15_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    WarmUp,
    CoolDown,
}

/// A single-shot timer the owner must schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub kind: TimerKind,
    pub generation: u64,
    pub after: Duration,
}

/// One applied state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerChange {
    pub before: PowerState,
    pub after: PowerState,
    pub timer: Option<TimerRequest>,
}

impl PowerChange {
    pub fn power_changed(&self) -> bool {
        self.before.is_on() != self.after.is_on()
    }

    pub fn warming_changed(&self) -> bool {
        self.before.is_warming_up() != self.after.is_warming_up()
    }

    pub fn cooling_changed(&self) -> bool {
        self.before.is_cooling_down() != self.after.is_cooling_down()
    }

    /// The display has finished powering on.
    pub fn settled_on(&self) -> bool {
        self.after == PowerState::On
    }
}

#[derive(Debug)]
pub struct PowerMachine {
    state: PowerState,
    warmup_time: Duration,
    cooldown_time: Duration,
    warmup_generation: u64,
    cooldown_generation: u64,
}

impl PowerMachine {
    /// Start in `Off`. Both windows are capped at [`MAX_TRANSITION_TIME`].
    pub fn new(warmup_time: Duration, cooldown_time: Duration) -> Self {
        PowerMachine {
            state: PowerState::Off,
            warmup_time: warmup_time.min(MAX_TRANSITION_TIME),
            cooldown_time: cooldown_time.min(MAX_TRANSITION_TIME),
            warmup_generation: 0,
            cooldown_generation: 0,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn warmup_time(&self) -> Duration {
        self.warmup_time
    }

    pub fn cooldown_time(&self) -> Duration {
        self.cooldown_time
    }

    /// Apply a `system.state` report. `Fault` is not a transition.
    pub fn apply_system_state(&mut self, reported: SystemState) -> Option<PowerChange> {
        let next = match reported {
            SystemState::PoweringOn => PowerState::WarmingUp,
            SystemState::PoweringDown => PowerState::CoolingDown,
            SystemState::On => PowerState::On,
            SystemState::Standby => PowerState::Off,
            SystemState::Fault => return None,
        };
        self.transition(next)
    }

    /// Guarded write of the derived "power is on" value.
    ///
    /// A write that does not change on-ness is a no-op; a real change enters
    /// the matching transitional state.
    pub fn set_power_is_on(&mut self, on: bool) -> Option<PowerChange> {
        if on == self.state.is_on() {
            return None;
        }
        self.transition(if on {
            PowerState::WarmingUp
        } else {
            PowerState::CoolingDown
        })
    }

    /// Report that a timer armed with `generation` has expired.
    pub fn timer_elapsed(&mut self, kind: TimerKind, generation: u64) -> Option<PowerChange> {
        match kind {
            TimerKind::WarmUp
                if generation == self.warmup_generation
                    && self.state == PowerState::WarmingUp =>
            {
                self.transition(PowerState::On)
            }
            TimerKind::CoolDown
                if generation == self.cooldown_generation
                    && self.state == PowerState::CoolingDown =>
            {
                self.transition(PowerState::Off)
            }
            _ => None,
        }
    }

    fn transition(&mut self, next: PowerState) -> Option<PowerChange> {
        if next == self.state {
            return None;
        }

        let before = self.state;
        self.state = next;

        let timer = match next {
            PowerState::WarmingUp => {
                self.warmup_generation += 1;
                Some(TimerRequest {
                    kind: TimerKind::WarmUp,
                    generation: self.warmup_generation,
                    after: self.warmup_time,
                })
            }
            PowerState::CoolingDown => {
                self.cooldown_generation += 1;
                Some(TimerRequest {
                    kind: TimerKind::CoolDown,
                    generation: self.cooldown_generation,
                    after: self.cooldown_time,
                })
            }
            PowerState::On | PowerState::Off => None,
        };

        Some(PowerChange {
            before,
            after: next,
            timer,
        })
    }
}
