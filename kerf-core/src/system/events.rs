//! Real-time event and alarm bus
//!
//! Interrupt handlers signal the main loop by setting bits in two shared
//! bitsets; the main loop drains them through the executor. Every
//! read-modify-write runs inside a critical section that restores the
//! prior interrupt-enable state on exit, so a set bit is never lost to a
//! torn update.

use core::cell::Cell;

use bitflags::bitflags;
use critical_section::Mutex;

bitflags! {
    /// Pending real-time actions
    ///
    /// Set from any context; cleared one bit at a time by the executor
    /// after the corresponding action has run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RtEvent: u8 {
        /// Host asked for a status report
        const STATUS_REPORT = 1 << 0;
        /// Resume or begin buffered motion
        const CYCLE_START = 1 << 1;
        /// Step execution came to rest
        const CYCLE_STOP = 1 << 2;
        /// Pause in-progress motion without discarding it
        const FEED_HOLD = 1 << 3;
        /// Full controller reset
        const RESET = 1 << 4;
        /// Safety door interlock opened
        const SAFETY_DOOR = 1 << 5;
        /// Discard the remainder of the current motion
        const MOTION_CANCEL = 1 << 6;
    }
}

bitflags! {
    /// Latched alarm causes
    ///
    /// Any set bit forces the state machine into the alarm state; bits
    /// persist until an explicit unlock or reset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Alarm: u8 {
        /// Unrecoverable event; requires a reset before unlock
        const CRITICAL_EVENT = 1 << 0;
        /// Hard limit switch tripped
        const HARD_LIMIT = 1 << 1;
        /// Commanded motion exceeded the machine envelope
        const SOFT_LIMIT = 1 << 2;
        /// Cycle aborted mid-motion
        const ABORT_CYCLE = 1 << 3;
        /// Probe cycle ended without a trigger
        const PROBE_FAIL = 1 << 4;
        /// Homing cycle failed to find its switches
        const HOMING_FAIL = 1 << 5;
    }
}

/// Shared event/alarm bitsets
///
/// The one object handed by reference to every context. `const`
/// constructible so it can live in a `static`; reset (not reallocated)
/// on every controller restart.
pub struct EventBus {
    exec: Mutex<Cell<u8>>,
    alarm: Mutex<Cell<u8>>,
}

impl EventBus {
    /// Create a bus with nothing pending
    pub const fn new() -> Self {
        Self {
            exec: Mutex::new(Cell::new(0)),
            alarm: Mutex::new(Cell::new(0)),
        }
    }

    /// Set real-time event bits; safe from interrupt or main context
    pub fn raise(&self, events: RtEvent) {
        critical_section::with(|cs| {
            let cell = self.exec.borrow(cs);
            cell.set(cell.get() | events.bits());
        });
    }

    /// Snapshot the pending real-time events
    pub fn pending(&self) -> RtEvent {
        let bits = critical_section::with(|cs| self.exec.borrow(cs).get());
        RtEvent::from_bits_truncate(bits)
    }

    /// Check whether any of the given events are pending
    pub fn is_pending(&self, events: RtEvent) -> bool {
        self.pending().intersects(events)
    }

    /// Clear only the given event bits, preserving the rest
    pub fn clear(&self, events: RtEvent) {
        critical_section::with(|cs| {
            let cell = self.exec.borrow(cs);
            cell.set(cell.get() & !events.bits());
        });
    }

    /// Latch alarm bits; safe from interrupt or main context
    pub fn raise_alarm(&self, alarms: Alarm) {
        critical_section::with(|cs| {
            let cell = self.alarm.borrow(cs);
            cell.set(cell.get() | alarms.bits());
        });
    }

    /// Snapshot the latched alarms
    pub fn alarms(&self) -> Alarm {
        let bits = critical_section::with(|cs| self.alarm.borrow(cs).get());
        Alarm::from_bits_truncate(bits)
    }

    /// Clear all latched alarms (unlock/reset path only)
    pub fn clear_alarms(&self) {
        critical_section::with(|cs| self.alarm.borrow(cs).set(0));
    }

    /// Drop everything pending; used when the controller restarts
    pub fn reset(&self) {
        critical_section::with(|cs| {
            self.exec.borrow(cs).set(0);
            self.alarm.borrow(cs).set(0);
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
