//! VL53L0X time-of-flight sensor
//!
//! First-generation part: each reading is triggered by writing the
//! SYSRANGE start bit, then the status register is polled until the
//! measurement completes and the range is extracted from a 12-byte
//! result block.

use embedded_hal::delay::DelayNs;
use kerf_core::traits::range::{RangeError, RangeSensor, OUT_OF_RANGE_MM};
use kerf_core::twi::RegisterBus;

/// Fixed 7-bit bus address
pub const VL53L0X_I2C_ADDR: u8 = 0x29;

/// Register addresses
pub mod reg {
    /// Measurement trigger / busy bit
    pub const SYSRANGE_START: u8 = 0x00;
    /// Start of the 12-byte result block
    pub const RESULT_RANGE_STATUS: u8 = 0x14;
    /// Model identity, reads [`MODEL_ID`](super::MODEL_ID)
    pub const IDENTIFICATION_MODEL_ID: u8 = 0xC0;
}

/// Expected identity register value
pub const MODEL_ID: u8 = 0xEE;

/// Offset of the big-endian range word inside the result block
const RANGE_OFFSET: usize = 10;

/// Per-reading poll bound in milliseconds, regardless of the configured
/// I/O timeout
const POLL_CAP_MS: u16 = 100;

/// VL53L0X driver over a register bus
pub struct Vl53l0x<B, D> {
    bus: B,
    delay: D,
    io_timeout_ms: u16,
    timeout: bool,
}

impl<B: RegisterBus, D: DelayNs> Vl53l0x<B, D> {
    /// Create a driver; call [`RangeSensor::init`] before reading
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            bus,
            delay,
            io_timeout_ms: 500,
            timeout: false,
        }
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), RangeError> {
        self.bus.write_reg(VL53L0X_I2C_ADDR, reg, value)?;
        Ok(())
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, RangeError> {
        Ok(self.bus.read_reg(VL53L0X_I2C_ADDR, reg)?)
    }
}

impl<B: RegisterBus, D: DelayNs> RangeSensor for Vl53l0x<B, D> {
    fn init(&mut self) -> Result<(), RangeError> {
        self.delay.delay_ms(100);

        if self.read_reg(reg::IDENTIFICATION_MODEL_ID)? != MODEL_ID {
            return Err(RangeError::UnknownModel);
        }

        // Fixed bring-up handshake from the reference flow, including
        // the dummy stop-variable read at 0x91
        self.write_reg(0x88, 0x00)?;
        self.write_reg(0x80, 0x01)?;
        self.write_reg(0xFF, 0x01)?;
        self.write_reg(0x00, 0x00)?;
        self.read_reg(0x91)?;
        self.write_reg(0x00, 0x01)?;
        self.write_reg(0xFF, 0x00)?;
        self.write_reg(0x80, 0x00)?;

        self.timeout = false;
        Ok(())
    }

    fn set_timeout(&mut self, timeout_ms: u16) {
        self.io_timeout_ms = timeout_ms;
    }

    fn start_continuous(&mut self, _period_ms: u16) {
        // Single-shot flow: every read triggers its own measurement
    }

    fn read_distance_mm(&mut self) -> u16 {
        self.timeout = false;

        if self.write_reg(reg::SYSRANGE_START, 0x01).is_err() {
            return 0;
        }

        // Poll the busy bit, bounded even when the configured timeout
        // is generous
        let limit = self.io_timeout_ms.min(POLL_CAP_MS);
        let mut waited = 0u16;
        loop {
            match self.read_reg(reg::SYSRANGE_START) {
                Ok(status) if status & 0x01 == 0 => break,
                Ok(_) => {}
                Err(_) => return 0,
            }
            if waited >= limit {
                self.timeout = true;
                return 0;
            }
            self.delay.delay_ms(1);
            waited += 1;
        }

        let mut block = [0u8; 12];
        if self
            .bus
            .read_regs(VL53L0X_I2C_ADDR, reg::RESULT_RANGE_STATUS, &mut block)
            .is_err()
        {
            return 0;
        }

        let distance =
            u16::from_be_bytes([block[RANGE_OFFSET], block[RANGE_OFFSET + 1]]);
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
