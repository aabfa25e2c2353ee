//! VL53L1 time-of-flight sensor
//!
//! Second-generation part with a 16-bit register map. No bring-up
//! handshake is needed: the sensor ranges continuously after power-up
//! and the latest distance is always available in the result register,
//! so a reading is one wide register read.

use embedded_hal::delay::DelayNs;
use kerf_core::traits::range::{RangeError, RangeSensor, OUT_OF_RANGE_MM};
use kerf_core::twi::RegisterBus;

/// Fixed 7-bit bus address
pub const VL53L1_I2C_ADDR: u8 = 0x29;

/// Register addresses (16-bit index space)
pub mod reg {
    /// Continuously updated distance result, big-endian millimeters
    pub const RESULT_DISTANCE: u16 = 0x0096;
}

/// Power-up settle time before the result register is meaningful
const BOOT_SETTLE_MS: u32 = 100;

/// VL53L1 driver over a register bus
pub struct Vl53l1<B, D> {
    bus: B,
    delay: D,
    io_timeout_ms: u16,
    timeout: bool,
}

impl<B: RegisterBus, D: DelayNs> Vl53l1<B, D> {
    /// Create a driver; call [`RangeSensor::init`] before reading
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            bus,
            delay,
            io_timeout_ms: 500,
            timeout: false,
        }
    }

    /// Configured I/O timeout bound
    pub fn io_timeout_ms(&self) -> u16 {
        self.io_timeout_ms
    }
}

impl<B: RegisterBus, D: DelayNs> RangeSensor for Vl53l1<B, D> {
    fn init(&mut self) -> Result<(), RangeError> {
        // No identity check or handshake: the part self-starts and only
        // needs its boot time
        self.delay.delay_ms(BOOT_SETTLE_MS);
        self.timeout = false;
        Ok(())
    }

    fn set_timeout(&mut self, timeout_ms: u16) {
        self.io_timeout_ms = timeout_ms;
    }

    fn start_continuous(&mut self, _period_ms: u16) {
        // Always ranging; nothing to start
    }

    fn read_distance_mm(&mut self) -> u16 {
        self.timeout = false;

        let distance = match self.bus.read_reg16_u16(VL53L1_I2C_ADDR, reg::RESULT_DISTANCE)
        {
            Ok(value) => value,
            Err(_) => return 0,
        };

        if distance >= OUT_OF_RANGE_MM {
            return OUT_OF_RANGE_MM;
        }
        // 0 passes through: too close and no-echo are indistinguishable
        distance
    }

    fn timeout_occurred(&self) -> bool {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::mock::{MockBus, MockDelay};

    fn sensor(bus: MockBus) -> Vl53l1<MockBus, MockDelay> {
        Vl53l1::new(bus, MockDelay::default())
    }

    #[test]
    fn test_init_needs_no_handshake() {
        let mut sensor = sensor(MockBus::default());
        assert_eq!(sensor.init(), Ok(()));
        assert!(sensor.bus.writes.is_empty());
        assert_eq!(sensor.bus.reads_served, 0);
        assert_eq!(sensor.delay.elapsed_ms, BOOT_SETTLE_MS);
    }

    #[test]
    fn test_read_is_direct_register_read() {
        let mut bus = MockBus::default();
        bus.wide_value = 1234;
        let mut sensor = sensor(bus);

        assert_eq!(sensor.read_distance_mm(), 1234);
        assert!(!sensor.timeout_occurred());
        assert!(sensor.bus.writes.is_empty());
    }

    #[test]
    fn test_out_of_range_clamps_to_sentinel() {
        for raw in [8190u16, 9000, u16::MAX] {
            let mut bus = MockBus::default();
            bus.wide_value = raw;
            let mut sensor = sensor(bus);
            assert_eq!(sensor.read_distance_mm(), OUT_OF_RANGE_MM, "raw {raw}");
        }
    }

    #[test]
    fn test_zero_reading_passes_through() {
        let mut sensor = sensor(MockBus::default());
        assert_eq!(sensor.read_distance_mm(), 0);
        assert!(!sensor.timeout_occurred());
    }

    #[test]
    fn test_bus_failure_returns_zero() {
        let mut bus = MockBus::default();
        bus.fail = true;
        let mut sensor = sensor(bus);
        assert_eq!(sensor.read_distance_mm(), 0);
    }

    #[test]
    fn test_set_timeout_is_recorded() {
        let mut sensor = sensor(MockBus::default());
        sensor.set_timeout(250);
        assert_eq!(sensor.io_timeout_ms(), 250);
    }
}
