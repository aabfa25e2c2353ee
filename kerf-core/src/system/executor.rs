//! Real-time event dispatcher
//!
//! The main loop's drain point for the event bus. Pending flags are
//! handled in a fixed priority order - reset, alarm, safety door, feed
//! hold, motion cancel, cycle stop, cycle start, status report - and
//! each dispatch clears only the bit it acted on, so anything raised
//! mid-dispatch survives to the next pass.

use super::events::{Alarm, EventBus, RtEvent};
use super::machine::{OperatingStateMachine, StartOutcome};

/// Action produced by one dispatch step
///
/// The actuation layer (steppers, spindle, reporting - outside this
/// workspace) executes these; the state transition has already happened
/// by the time the action is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtAction {
    /// Abort everything and restart the controller loop
    Reset,
    /// Alarm latched; report the causes and stop issuing motion
    Alarm(Alarm),
    /// Door opened: decelerate to a hold and de-energize outputs
    SafetyDoor,
    /// Decelerate to a hold, keeping the program
    FeedHold,
    /// Decelerate and discard the remainder of the motion
    MotionCancel,
    /// Step execution came to rest
    CycleStop,
    /// Begin executing buffered motion from rest
    CycleStart,
    /// Resume held motion; `energize` restores outputs first
    Resume { energize: bool },
    /// Emit a status report
    StatusReport,
}

/// Main-loop dispatcher over the event bus
///
/// Owns the operating state machine. Call [`dispatch`] from suspension
/// points in the main loop until it returns `None`; after a
/// [`RtAction::Reset`] the outer loop must reinitialize instead of
/// continuing to dispatch.
///
/// [`dispatch`]: RealtimeExecutor::dispatch
#[derive(Debug)]
pub struct RealtimeExecutor {
    machine: OperatingStateMachine,
    abort: bool,
}

impl Default for RealtimeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeExecutor {
    /// Create an executor at rest
    pub fn new() -> Self {
        Self {
            machine: OperatingStateMachine::new(),
            abort: false,
        }
    }

    /// The operating state machine
    pub fn machine(&self) -> &OperatingStateMachine {
        &self.machine
    }

    /// Mutable access for collaborators driving cycle/homing phases
    pub fn machine_mut(&mut self) -> &mut OperatingStateMachine {
        &mut self.machine
    }

    /// A reset was dispatched and the controller must restart
    pub fn abort_pending(&self) -> bool {
        self.abort
    }

    /// Restart point after an abort: drop all pending events and alarms
    /// and return the state machine to rest
    pub fn reinitialize(&mut self, bus: &EventBus) {
        bus.reset();
        self.machine.reset();
        self.abort = false;
    }

    /// Handle the highest-priority pending event
    ///
    /// Returns the action the caller must execute, or `None` once
    /// nothing is pending. Bits whose handling turns out to be a no-op
    /// in the current state (e.g. a feed hold while idle) are cleared
    /// and dispatch falls through to the next priority in the same call.
    pub fn dispatch(&mut self, bus: &EventBus) -> Option<RtAction> {
        let pending = bus.pending();

        if pending.contains(RtEvent::RESET) {
            bus.clear(RtEvent::RESET);
            self.abort = true;
            return Some(RtAction::Reset);
        }

        // Alarms are edge-reported: the latch itself persists until
        // unlock/reset, the action fires when the machine enters alarm.
        let alarms = bus.alarms();
        if !alarms.is_empty() && !self.machine.in_alarm() {
            self.machine.alarm_raised();
            return Some(RtAction::Alarm(alarms));
        }

        if pending.contains(RtEvent::SAFETY_DOOR) {
            bus.clear(RtEvent::SAFETY_DOOR);
            if self.machine.safety_door_open() {
                return Some(RtAction::SafetyDoor);
            }
        }

        if pending.contains(RtEvent::FEED_HOLD) {
            bus.clear(RtEvent::FEED_HOLD);
            if self.machine.feed_hold() {
                return Some(RtAction::FeedHold);
            }
        }

        if pending.contains(RtEvent::MOTION_CANCEL) {
            bus.clear(RtEvent::MOTION_CANCEL);
            if self.machine.motion_cancel() {
                return Some(RtAction::MotionCancel);
            }
        }

        if pending.contains(RtEvent::CYCLE_STOP) {
            bus.clear(RtEvent::CYCLE_STOP);
            if self.machine.cycle_stopped() {
                return Some(RtAction::CycleStop);
            }
        }

        if pending.contains(RtEvent::CYCLE_START) {
            bus.clear(RtEvent::CYCLE_START);
            match self.machine.cycle_start() {
                StartOutcome::Started => return Some(RtAction::CycleStart),
                StartOutcome::Resumed { energize } => {
                    return Some(RtAction::Resume { energize })
                }
                StartOutcome::Ignored => {}
            }
        }

        if pending.contains(RtEvent::STATUS_REPORT) {
            bus.clear(RtEvent::STATUS_REPORT);
            return Some(RtAction::StatusReport);
        }

        None
    }

    /// Operator unlock after an alarm
    ///
    /// Refused while the critical-event alarm is latched; that one
    /// requires a reset.
    pub fn unlock(&mut self, bus: &EventBus) -> bool {
        if bus.alarms().contains(Alarm::CRITICAL_EVENT) {
            return false;
        }
        bus.clear_alarms();
        self.machine.unlocked();
        true
    }

    /// Operator toggle of g-code check mode
    pub fn toggle_check_mode(&mut self) -> Option<bool> {
        self.machine.toggle_check_mode()
    }
}
