//! Operating state machine
//!
//! One primary state plus an orthogonal set of suspend flags refining
//! behavior while motion is held. All transitions run in the main loop;
//! interrupt contexts only raise events that the executor translates
//! into calls here.

use bitflags::bitflags;

/// Primary controller state
///
/// `Idle` is the rest state and the value after reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingState {
    /// At rest, ready to accept commands
    #[default]
    Idle,
    /// Latched fault; motion-issuing requests are refused until unlock
    Alarm,
    /// G-code check mode: parsing runs, execution is blocked
    CheckMode,
    /// Homing cycle in progress
    Homing,
    /// Buffered motion executing
    Cycle,
    /// Feed hold: motion paused, program retained
    Hold,
    /// Door interlock open: held and de-energized
    SafetyDoor,
    /// Discarding the remainder of the current motion
    MotionCancel,
}

bitflags! {
    /// Suspend sub-phases active while held
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Suspend: u8 {
        /// A hold is in effect (deceleration may still be running)
        const HOLD_ACTIVE = 1 << 0;
        /// Motion has come to rest; a cycle start will resume
        const READY_TO_RESUME = 1 << 1;
        /// Outputs were de-energized and must be restored before resume
        const ENERGIZE_ON_RESUME = 1 << 2;
        /// Pending motion is discarded instead of resumed
        const MOTION_CANCEL = 1 << 3;
    }
}

/// Outcome of a cycle-start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartOutcome {
    /// Buffered motion began from rest
    Started,
    /// A hold was resumed; `energize` asks the actuation layer to
    /// restore spindle/coolant first
    Resumed { energize: bool },
    /// The request did not apply in the current state
    Ignored,
}

/// Controller mode tracking
///
/// Owned by the main loop; never touched from interrupt context.
#[derive(Debug)]
pub struct OperatingStateMachine {
    state: OperatingState,
    suspend: Suspend,
    door_ajar: bool,
}

impl Default for OperatingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatingStateMachine {
    /// Create a machine at rest
    pub fn new() -> Self {
        Self {
            state: OperatingState::Idle,
            suspend: Suspend::empty(),
            door_ajar: false,
        }
    }

    /// Current primary state
    pub fn state(&self) -> OperatingState {
        self.state
    }

    /// Current suspend sub-phases
    pub fn suspend(&self) -> Suspend {
        self.suspend
    }

    /// Whether the door interlock currently reads open
    pub fn door_ajar(&self) -> bool {
        self.door_ajar
    }

    /// Latch the door interlock input
    ///
    /// Closing the door does not resume anything by itself; an explicit
    /// cycle start is still required.
    pub fn set_door_ajar(&mut self, ajar: bool) {
        self.door_ajar = ajar;
    }

    /// Return to the rest state, dropping suspend phases
    ///
    /// The door input is a pin reading and survives the reset.
    pub fn reset(&mut self) {
        self.state = OperatingState::Idle;
        self.suspend = Suspend::empty();
    }

    /// Check if the machine is latched in alarm
    pub fn in_alarm(&self) -> bool {
        self.state == OperatingState::Alarm
    }

    /// Whether motion-issuing requests must be refused
    pub fn blocks_motion(&self) -> bool {
        matches!(
            self.state,
            OperatingState::Alarm | OperatingState::CheckMode
        )
    }

    /// Force the alarm state
    pub fn alarm_raised(&mut self) {
        self.state = OperatingState::Alarm;
        self.suspend = Suspend::empty();
    }

    /// Leave the alarm state after the operator acknowledged it
    ///
    /// The executor gates this on the critical-event alarm being clear.
    pub fn unlocked(&mut self) {
        if self.state == OperatingState::Alarm {
            self.state = OperatingState::Idle;
        }
    }

    /// Toggle g-code check mode; returns the new state of the toggle
    ///
    /// Only available from rest: a cycle cannot flip into dry-run
    /// halfway through.
    pub fn toggle_check_mode(&mut self) -> Option<bool> {
        match self.state {
            OperatingState::Idle => {
                self.state = OperatingState::CheckMode;
                Some(true)
            }
            OperatingState::CheckMode => {
                self.state = OperatingState::Idle;
                Some(false)
            }
            _ => None,
        }
    }

    /// Enter the homing cycle
    pub fn begin_homing(&mut self) -> bool {
        if self.state == OperatingState::Idle {
            self.state = OperatingState::Homing;
            true
        } else {
            false
        }
    }

    /// Leave the homing cycle
    ///
    /// Failure lands in alarm; the caller also latches
    /// [`Alarm::HOMING_FAIL`](super::Alarm::HOMING_FAIL) on the bus.
    pub fn homing_complete(&mut self, success: bool) {
        if self.state != OperatingState::Homing {
            return;
        }
        self.state = if success {
            OperatingState::Idle
        } else {
            OperatingState::Alarm
        };
    }

    /// Begin executing buffered motion
    pub fn begin_cycle(&mut self) -> bool {
        if self.state == OperatingState::Idle {
            self.state = OperatingState::Cycle;
            true
        } else {
            false
        }
    }

    /// Request a feed hold; returns whether a hold was initiated
    pub fn feed_hold(&mut self) -> bool {
        if self.state == OperatingState::Cycle {
            self.state = OperatingState::Hold;
            self.suspend.insert(Suspend::HOLD_ACTIVE);
            true
        } else {
            false
        }
    }

    /// Door interlock opened: force a hold and de-energize outputs
    pub fn safety_door_open(&mut self) -> bool {
        self.door_ajar = true;
        match self.state {
            OperatingState::Alarm | OperatingState::SafetyDoor => false,
            _ => {
                self.state = OperatingState::SafetyDoor;
                self.suspend
                    .insert(Suspend::HOLD_ACTIVE | Suspend::ENERGIZE_ON_RESUME);
                true
            }
        }
    }

    /// Request that queued motion be discarded
    ///
    /// From a running cycle this initiates a hold whose completion
    /// discards instead of resuming (the probe routine's path). During
    /// an existing hold it marks the pending motion for discard.
    pub fn motion_cancel(&mut self) -> bool {
        match self.state {
            OperatingState::Cycle => {
                self.state = OperatingState::MotionCancel;
                self.suspend
                    .insert(Suspend::HOLD_ACTIVE | Suspend::MOTION_CANCEL);
                true
            }
            OperatingState::Hold | OperatingState::SafetyDoor => {
                self.suspend.insert(Suspend::MOTION_CANCEL);
                true
            }
            _ => false,
        }
    }

    /// Step execution came to rest
    ///
    /// Ends a cycle, completes a hold (ready to resume), or finishes a
    /// motion cancel (queued motion discarded, back to rest). Returns
    /// whether the notification changed anything.
    pub fn cycle_stopped(&mut self) -> bool {
        match self.state {
            OperatingState::Cycle => {
                self.state = OperatingState::Idle;
                true
            }
            OperatingState::MotionCancel => {
                self.state = OperatingState::Idle;
                self.suspend = Suspend::empty();
                true
            }
            OperatingState::Hold | OperatingState::SafetyDoor => {
                if self.suspend.contains(Suspend::MOTION_CANCEL) {
                    // Nothing left to resume once the discard finishes
                    self.suspend.remove(Suspend::MOTION_CANCEL);
                    if self.state == OperatingState::Hold {
                        self.state = OperatingState::Idle;
                        self.suspend = Suspend::empty();
                        return true;
                    }
                }
                self.suspend.insert(Suspend::READY_TO_RESUME);
                true
            }
            _ => false,
        }
    }

    /// Request a cycle start
    pub fn cycle_start(&mut self) -> StartOutcome {
        match self.state {
            OperatingState::Idle => {
                self.state = OperatingState::Cycle;
                StartOutcome::Started
            }
            OperatingState::Hold if self.suspend.contains(Suspend::READY_TO_RESUME) => {
                let energize = self.suspend.contains(Suspend::ENERGIZE_ON_RESUME);
                self.state = OperatingState::Cycle;
                self.suspend = Suspend::empty();
                StartOutcome::Resumed { energize }
            }
            OperatingState::SafetyDoor
                if !self.door_ajar && self.suspend.contains(Suspend::READY_TO_RESUME) =>
            {
                self.state = OperatingState::Cycle;
                self.suspend = Suspend::empty();
                StartOutcome::Resumed { energize: true }
            }
            _ => StartOutcome::Ignored,
        }
    }
}
