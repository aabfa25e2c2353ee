//! Probe pin monitor
//!
//! Coordinates a probing cycle with the step-timer interrupt: every
//! tick the monitor checks the polarity-corrected probe pin and, on the
//! first trigger, snapshots the machine position and asks the real-time
//! layer to cancel the remainder of the move.

use kerf_hal::gpio::InputPin;

use crate::system::events::{EventBus, RtEvent};
use crate::N_AXIS;

/// Probing-cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProbeState {
    /// No probe cycle armed; ticks are no-ops
    #[default]
    Off,
    /// Watching the pin for a trigger
    Active,
}

/// Probe trigger detection, polled once per step-timer tick
///
/// [`ProbeMonitor::on_probe_tick`] runs inside the highest-frequency
/// interrupt and is O(1) with minimal branching. The recorded position
/// is written exactly once per armed cycle.
pub struct ProbeMonitor<P: InputPin> {
    pin: P,
    state: ProbeState,
    invert: bool,
    position: [i32; N_AXIS],
    succeeded: bool,
}

impl<P: InputPin> ProbeMonitor<P> {
    /// Create a disarmed monitor
    ///
    /// `invert_setting` is the pin-polarity configuration (normally-open
    /// vs normally-closed wiring).
    pub fn new(pin: P, invert_setting: bool) -> Self {
        let mut monitor = Self {
            pin,
            state: ProbeState::Off,
            invert: false,
            position: [0; N_AXIS],
            succeeded: false,
        };
        monitor.configure_invert_mask(invert_setting, false);
        monitor
    }

    /// Recompute pin polarity for the coming cycle
    ///
    /// The effective polarity is the pin wiring setting XOR-ed with the
    /// cycle direction: probing away from the workpiece triggers on the
    /// opposite edge.
    pub fn configure_invert_mask(&mut self, invert_setting: bool, probe_away: bool) {
        self.invert = !invert_setting ^ probe_away;
    }

    /// Arm the monitor for a probe cycle
    pub fn arm(&mut self) {
        self.state = ProbeState::Active;
        self.succeeded = false;
    }

    /// Disarm without recording (cycle abandoned)
    pub fn disarm(&mut self) {
        self.state = ProbeState::Off;
    }

    /// Current probing state
    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// Polarity-corrected pin reading
    pub fn is_triggered(&self) -> bool {
        self.pin.is_high() ^ self.invert
    }

    /// Position recorded by the last trigger
    pub fn position(&self) -> &[i32; N_AXIS] {
        &self.position
    }

    /// Whether the last armed cycle ended in a trigger
    ///
    /// The motion layer reads this after the cycle to tell a recorded
    /// contact from a run-to-end (probe-fail) result.
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// Step-timer interrupt tick
    ///
    /// While armed and triggered: snapshot `position`, disarm, and raise
    /// the motion-cancel event. While disarmed this is a no-op.
    pub fn on_probe_tick(&mut self, position: &[i32; N_AXIS], bus: &EventBus) {
        if self.state == ProbeState::Active && self.is_triggered() {
            self.state = ProbeState::Off;
            self.position = *position;
            self.succeeded = true;
            bus.raise(RtEvent::MOTION_CANCEL);
        }
    }
}
