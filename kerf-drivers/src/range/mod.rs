//! Time-of-flight range sensors
//!
//! Two sensor generations with the same job and very different register
//! maps: the VL53L0X needs a trigger-and-poll dance per reading, the
//! VL53L1 continuously updates a result register that can simply be
//! read. Both implement [`kerf_core::traits::RangeSensor`] and share
//! its sentinel semantics (readings at or above 8190 mm clamp to the
//! out-of-range value; 0 means "discard this sample").

pub mod vl53l0x;
pub mod vl53l1;

pub use vl53l0x::Vl53l0x;
pub use vl53l1::Vl53l1;

/// Scripted register bus + delay counter shared by the sensor tests
#[cfg(test)]
pub(crate) mod mock {
    use kerf_core::twi::{RegisterBus, TwiError};

    /// Register bus mock with scripted single-register reads
    #[derive(Debug, Default)]
    pub struct MockBus {
        /// Log of (reg, value) single-register writes
        pub writes: heapless::Vec<(u8, u8), 32>,
        /// Served in order for `read_reg`; repeats the last entry
        pub read_script: heapless::Vec<u8, 64>,
        pub reads_served: usize,
        /// Block returned by `read_regs`
        pub block: [u8; 12],
        /// Value returned by `read_reg16_u16`
        pub wide_value: u16,
        /// All operations fail when set
        pub fail: bool,
    }

    impl MockBus {
        fn next_read(&mut self) -> u8 {
            let index = self.reads_served.min(self.read_script.len().saturating_sub(1));
            self.reads_served += 1;
            self.read_script.get(index).copied().unwrap_or(0)
        }
    }

    impl RegisterBus for MockBus {
        fn write_reg(&mut self, _address: u8, reg: u8, value: u8) -> Result<(), TwiError> {
            if self.fail {
                return Err(TwiError::AddressNack);
            }
            self.writes.push((reg, value)).unwrap();
            Ok(())
        }

        fn read_reg(&mut self, _address: u8, _reg: u8) -> Result<u8, TwiError> {
            if self.fail {
                return Err(TwiError::AddressNack);
            }
            Ok(self.next_read())
        }

        fn read_regs(
            &mut self,
            _address: u8,
            _reg: u8,
            buf: &mut [u8],
        ) -> Result<(), TwiError> {
            if self.fail {
                return Err(TwiError::AddressNack);
            }
            buf.copy_from_slice(&self.block[..buf.len()]);
            Ok(())
        }

        fn read_reg16_u16(&mut self, _address: u8, _reg: u16) -> Result<u16, TwiError> {
            if self.fail {
                return Err(TwiError::AddressNack);
            }
            Ok(self.wide_value)
        }
    }

    /// Delay that only counts, so timeout loops finish instantly
    #[derive(Debug, Default)]
    pub struct MockDelay {
        pub elapsed_ms: u32,
    }

    impl embedded_hal::delay::DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.elapsed_ms += ns / 1_000_000;
        }
    }
}
