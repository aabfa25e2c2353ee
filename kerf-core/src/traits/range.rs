//! Range sensor capability
//!
//! Uniform surface over the time-of-flight distance sensors. Different
//! sensor models expose very different register maps but the control
//! layer only ever needs these five operations.

use crate::twi::TwiError;

/// Raw readings at or above this value clamp to this sentinel
pub const OUT_OF_RANGE_MM: u16 = 8190;

/// Sensor bring-up failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeError {
    /// Bus transaction failed
    Bus(TwiError),
    /// Identity register did not match the expected model
    UnknownModel,
}

impl From<TwiError> for RangeError {
    fn from(err: TwiError) -> Self {
        RangeError::Bus(err)
    }
}

/// Time-of-flight range sensor
///
/// # Reading semantics
///
/// `read_distance_mm` returns millimeters with two reserved values:
/// [`OUT_OF_RANGE_MM`] for anything the sensor clamped, and `0` for
/// "no usable sample" (timeout, bus failure, or a genuine too-close /
/// no-echo reading - the hardware cannot tell them apart). Callers
/// discard zero samples.
pub trait RangeSensor {
    /// Bring the sensor up and verify it is the expected model
    fn init(&mut self) -> Result<(), RangeError>;

    /// Bound the per-reading busy-wait
    fn set_timeout(&mut self, timeout_ms: u16);

    /// Start continuous ranging
    ///
    /// Readings here are self-triggering, so this is a no-op kept for
    /// interface compatibility with hosts that expect it.
    fn start_continuous(&mut self, period_ms: u16);

    /// Take one distance reading in millimeters
    fn read_distance_mm(&mut self) -> u16;

    /// Whether the last reading hit the timeout bound
    ///
    /// Sticky until the next read attempt resets it.
    fn timeout_occurred(&self) -> bool;
}
