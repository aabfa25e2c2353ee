//! Board-agnostic control substrate for the Kerf motion controller
//!
//! This crate contains the interrupt-coordinated core of the controller,
//! written against the trait seams in `kerf-hal`:
//!
//! - Lock-free serial transport with real-time command interception
//! - Real-time event/alarm bus between interrupt and main contexts
//! - Operating state machine (idle/alarm/hold/safety-door/...)
//! - Probe monitor polled from the step-timer interrupt
//! - Two-wire (I2C) master protocol
//! - Checksummed EEPROM persistence
//! - Settings storage
//!
//! # Context discipline
//!
//! There is no OS and no scheduler: interrupt handlers preempt a
//! cooperative main loop, and disabled interrupts are the only
//! synchronization primitive. The [`system::EventBus`] is the one object
//! shared by reference across contexts; everything else follows a
//! single-writer ownership discipline and is documented per type.

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod eeprom;
pub mod probe;
pub mod ring;
pub mod serial;
pub mod system;
pub mod traits;
pub mod twi;

/// Number of controlled axes
pub const N_AXIS: usize = 3;
