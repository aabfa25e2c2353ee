//! Kerf Hardware Abstraction Layer
//!
//! This crate defines the hardware trait seams the controller core is
//! written against. Chip-specific crates (AVR, RP2040, simulators)
//! implement these traits; `kerf-core` never touches a register.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Controller core (kerf-core, drivers)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  kerf-hal (this crate - traits)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  chip bindings / host-test mocks        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::InputPin`] - Digital inputs (probe switch, safety door)
//! - [`uart::TxIrqControl`] - Transmit-interrupt gating for the serial link
//! - [`twi::TwiPhy`] - Phase-level two-wire (I2C) bus primitives
//! - [`eeprom::EepromCell`] - Raw EEPROM read/program primitives

#![no_std]
#![deny(unsafe_code)]

pub mod eeprom;
pub mod gpio;
pub mod twi;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use eeprom::{EepromCell, ProgramMode};
pub use gpio::InputPin;
pub use twi::{TwiPhy, TwiStatus};
pub use uart::TxIrqControl;
