//! Device capability traits
//!
//! Interfaces between the control substrate and device drivers in
//! `kerf-drivers`. One trait per capability; concrete sensor models are
//! selected at configuration time, not by conditional compilation.

pub mod range;

pub use range::{RangeError, RangeSensor, OUT_OF_RANGE_MM};
