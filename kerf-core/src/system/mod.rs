//! System-level real-time coordination
//!
//! The pieces that let interrupt handlers and the main loop agree on
//! what the controller is doing:
//!
//! - [`events`] - the shared real-time event and alarm bitsets
//! - [`machine`] - the operating state machine and suspend sub-phases
//! - [`executor`] - the main-loop dispatcher draining pending events

pub mod events;
pub mod executor;
pub mod machine;

pub use events::{Alarm, EventBus, RtEvent};
pub use executor::{RealtimeExecutor, RtAction};
pub use machine::{OperatingState, OperatingStateMachine, StartOutcome, Suspend};
