//! Two-wire (I2C) master protocol
//!
//! Layers the master transaction protocol over the phase-level
//! primitives in [`kerf_hal::twi`]: address framing, ack checking, and
//! the guarantee that every transaction - successful or not - ends in
//! exactly one stop condition. Runs synchronously from the main loop;
//! never call into the bus from interrupt context.

use kerf_hal::twi::{TwiPhy, TwiStatus};

/// Transfer direction encoded in the address byte's low bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiDir {
    /// Master transmits
    Write,
    /// Master receives
    Read,
}

/// Bus protocol failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiError {
    /// Start or repeated-start condition was not taken
    Start,
    /// No device acknowledged the address
    AddressNack,
    /// A data byte was not acknowledged
    DataNack,
}

/// I2C master over a phase-level phy
///
/// The low-level methods (`start`/`write`/`read_ack`/`read_nack`/`stop`)
/// expose the raw protocol; the composite register operations sequence
/// them and always release the bus, whichever way they exit.
pub struct I2cMaster<P: TwiPhy> {
    phy: P,
}

impl<P: TwiPhy> I2cMaster<P> {
    /// Take ownership of the bus phy
    pub fn new(phy: P) -> Self {
        Self { phy }
    }

    /// Assert a start condition and address a target
    ///
    /// Fails if the bus did not produce a start/repeated-start, or if
    /// no target acknowledged the address byte.
    pub fn start(&mut self, address: u8, dir: TwiDir) -> Result<(), TwiError> {
        match self.phy.send_start() {
            TwiStatus::Start | TwiStatus::RepeatedStart => {}
            _ => return Err(TwiError::Start),
        }
        let addr_byte = (address << 1) | if dir == TwiDir::Read { 1 } else { 0 };
        match self.phy.write_byte(addr_byte) {
            TwiStatus::Ack => Ok(()),
            _ => Err(TwiError::AddressNack),
        }
    }

    /// Re-address without releasing the bus
    ///
    /// Semantically identical to [`start`](Self::start); used to flip
    /// from the register-select write phase to the read phase.
    pub fn restart(&mut self, address: u8, dir: TwiDir) -> Result<(), TwiError> {
        self.start(address, dir)
    }

    /// Shift one data byte out
    pub fn write(&mut self, byte: u8) -> Result<(), TwiError> {
        match self.phy.write_byte(byte) {
            TwiStatus::Ack => Ok(()),
            _ => Err(TwiError::DataNack),
        }
    }

    /// Read one byte, acknowledging to request more
    pub fn read_ack(&mut self) -> u8 {
        self.phy.read_byte(true)
    }

    /// Read one byte, not-acknowledging to end the transfer
    pub fn read_nack(&mut self) -> u8 {
        self.phy.read_byte(false)
    }

    /// Release the bus
    pub fn stop(&mut self) {
        self.phy.send_stop();
    }

    /// Write one byte to a device register
    pub fn write_register(&mut self, address: u8, reg: u8, value: u8) -> Result<(), TwiError> {
        let result = self.write_register_inner(address, reg, &[value]);
        self.stop();
        result
    }

    /// Write a byte run to a device register
    pub fn write_register_multi(
        &mut self,
        address: u8,
        reg: u8,
        data: &[u8],
    ) -> Result<(), TwiError> {
        let result = self.write_register_inner(address, reg, data);
        self.stop();
        result
    }

    /// Read one byte from a device register
    pub fn read_register(&mut self, address: u8, reg: u8) -> Result<u8, TwiError> {
        let mut buf = [0u8];
        let result = self.read_register_inner(address, &[reg], &mut buf);
        self.stop();
        result.map(|()| buf[0])
    }

    /// Read a byte run from a device register
    pub fn read_register_multi(
        &mut self,
        address: u8,
        reg: u8,
        buf: &mut [u8],
    ) -> Result<(), TwiError> {
        let result = self.read_register_inner(address, &[reg], buf);
        self.stop();
        result
    }

    /// Read a big-endian `u16` from a 16-bit register index
    ///
    /// Devices with wide register maps (VL53L1 class) take the index as
    /// two bytes before the repeated start.
    pub fn read_register16_u16(&mut self, address: u8, reg: u16) -> Result<u16, TwiError> {
        let mut buf = [0u8; 2];
        let result = self.read_register_inner(address, &reg.to_be_bytes(), &mut buf);
        self.stop();
        result.map(|()| u16::from_be_bytes(buf))
    }

    fn write_register_inner(&mut self, address: u8, reg: u8, data: &[u8]) -> Result<(), TwiError> {
        self.start(address, TwiDir::Write)?;
        self.write(reg)?;
        for &byte in data {
            self.write(byte)?;
        }
        Ok(())
    }

    fn read_register_inner(
        &mut self,
        address: u8,
        reg: &[u8],
        buf: &mut [u8],
    ) -> Result<(), TwiError> {
        self.start(address, TwiDir::Write)?;
        for &byte in reg {
            self.write(byte)?;
        }
        self.restart(address, TwiDir::Read)?;
        let last = buf.len().saturating_sub(1);
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = if i == last {
                self.read_nack()
            } else {
                self.read_ack()
            };
        }
        Ok(())
    }
}

/// Register-oriented bus surface consumed by device drivers
///
/// Keeps drivers independent of the concrete bus type so they can be
/// tested against scripted bus mocks.
pub trait RegisterBus {
    /// Write one byte to a device register
    fn write_reg(&mut self, address: u8, reg: u8, value: u8) -> Result<(), TwiError>;

    /// Read one byte from a device register
    fn read_reg(&mut self, address: u8, reg: u8) -> Result<u8, TwiError>;

    /// Read a byte run starting at a device register
    fn read_regs(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), TwiError>;

    /// Read a big-endian `u16` from a 16-bit register index
    fn read_reg16_u16(&mut self, address: u8, reg: u16) -> Result<u16, TwiError>;
}

impl<P: TwiPhy> RegisterBus for I2cMaster<P> {
    fn write_reg(&mut self, address: u8, reg: u8, value: u8) -> Result<(), TwiError> {
        self.write_register(address, reg, value)
    }

    fn read_reg(&mut self, address: u8, reg: u8) -> Result<u8, TwiError> {
        self.read_register(address, reg)
    }

    fn read_regs(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), TwiError> {
        self.read_register_multi(address, reg, buf)
    }

    fn read_reg16_u16(&mut self, address: u8, reg: u16) -> Result<u16, TwiError> {
        self.read_register16_u16(address, reg)
    }
}

// embedded-hal interop so third-party drivers can share the bus.

impl embedded_hal::i2c::Error for TwiError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            TwiError::Start => ErrorKind::Bus,
            TwiError::AddressNack => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            TwiError::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
        }
    }
}

impl<P: TwiPhy> embedded_hal::i2c::ErrorType for I2cMaster<P> {
    type Error = TwiError;
}

impl<P: TwiPhy> embedded_hal::i2c::I2c for I2cMaster<P> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        if operations.is_empty() {
            return Ok(());
        }
        let result = self.run_transaction(address, operations);
        self.stop();
        result
    }
}

impl<P: TwiPhy> I2cMaster<P> {
    fn run_transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result<(), TwiError> {
        use embedded_hal::i2c::Operation;

        let mut current_dir = None;
        for i in 0..operations.len() {
            let dir = match &operations[i] {
                Operation::Read(_) => TwiDir::Read,
                Operation::Write(_) => TwiDir::Write,
            };
            if current_dir != Some(dir) {
                self.start(address, dir)?;
                current_dir = Some(dir);
            }
            let next_is_read = matches!(operations.get(i + 1), Some(Operation::Read(_)));
            match &mut operations[i] {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        self.write(byte)?;
                    }
                }
                Operation::Read(buf) => {
                    let last = buf.len().wrapping_sub(1);
                    for (j, slot) in buf.iter_mut().enumerate() {
                        // The very last byte before a direction change
                        // or the end of the transaction gets a NACK.
                        *slot = if j == last && !next_is_read {
                            self.read_nack()
                        } else {
                            self.read_ack()
                        };
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::I2c;
    use heapless::Vec;

    /// Phase recorder with scriptable NACK injection
    #[derive(Debug, Default)]
    struct MockPhy {
        /// Wire log: (phase tag, byte)
        log: Vec<(char, u8), 64>,
        /// Index (into write phases, counting the address bytes) that
        /// reports a NACK; start phases count toward `fail_start`
        nack_at: Option<usize>,
        fail_start: bool,
        writes_seen: usize,
        read_data: Vec<u8, 16>,
        reads_served: usize,
        stops: usize,
    }

    impl TwiPhy for &mut MockPhy {
        fn send_start(&mut self) -> TwiStatus {
            self.log.push(('S', 0)).unwrap();
            if self.fail_start {
                TwiStatus::Fault
            } else {
                TwiStatus::Start
            }
        }

        fn write_byte(&mut self, byte: u8) -> TwiStatus {
            self.log.push(('W', byte)).unwrap();
            let index = self.writes_seen;
            self.writes_seen += 1;
            if self.nack_at == Some(index) {
                TwiStatus::Nack
            } else {
                TwiStatus::Ack
            }
        }

        fn read_byte(&mut self, ack: bool) -> u8 {
            let byte = self.read_data.get(self.reads_served).copied().unwrap_or(0);
            self.reads_served += 1;
            self.log.push((if ack { 'a' } else { 'n' }, byte)).unwrap();
            byte
        }

        fn send_stop(&mut self) {
            self.log.push(('P', 0)).unwrap();
            self.stops += 1;
        }
    }

    #[test]
    fn test_write_register_sequence() {
        let mut phy = MockPhy::default();
        let mut bus = I2cMaster::new(&mut phy);

        bus.write_register(0x29, 0x10, 0xAB).unwrap();
        drop(bus);

        // start, addr+W, reg, data, stop
        assert_eq!(
            phy.log.as_slice(),
            &[('S', 0), ('W', 0x52), ('W', 0x10), ('W', 0xAB), ('P', 0)]
        );
        assert_eq!(phy.stops, 1);
    }

    #[test]
    fn test_read_register_sequence() {
        let mut phy = MockPhy::default();
        phy.read_data.push(0x5A).unwrap();
        let mut bus = I2cMaster::new(&mut phy);

        assert_eq!(bus.read_register(0x29, 0xC0), Ok(0x5A));
        drop(bus);

        // start, addr+W, reg, restart, addr+R, read(nack), stop
        assert_eq!(
            phy.log.as_slice(),
            &[
                ('S', 0),
                ('W', 0x52),
                ('W', 0xC0),
                ('S', 0),
                ('W', 0x53),
                ('n', 0x5A),
                ('P', 0)
            ]
        );
        assert_eq!(phy.stops, 1);
    }

    #[test]
    fn test_multi_read_acks_all_but_last() {
        let mut phy = MockPhy::default();
        for b in [1u8, 2, 3] {
            phy.read_data.push(b).unwrap();
        }
        let mut bus = I2cMaster::new(&mut phy);

        let mut buf = [0u8; 3];
        bus.read_register_multi(0x29, 0x14, &mut buf).unwrap();
        drop(bus);

        assert_eq!(buf, [1, 2, 3]);
        let reads: Vec<char, 8> = phy
            .log
            .iter()
            .filter(|(tag, _)| *tag == 'a' || *tag == 'n')
            .map(|(tag, _)| *tag)
            .collect();
        assert_eq!(reads.as_slice(), &['a', 'a', 'n']);
    }

    #[test]
    fn test_nack_at_address_still_stops_once() {
        let mut phy = MockPhy::default();
        phy.nack_at = Some(0); // the address byte
        let mut bus = I2cMaster::new(&mut phy);

        assert_eq!(bus.read_register(0x29, 0x00), Err(TwiError::AddressNack));
        drop(bus);
        assert_eq!(phy.stops, 1);
    }

    #[test]
    fn test_nack_at_register_select_still_stops_once() {
        let mut phy = MockPhy::default();
        phy.nack_at = Some(1); // the register index byte
        let mut bus = I2cMaster::new(&mut phy);

        assert_eq!(bus.read_register(0x29, 0x00), Err(TwiError::DataNack));
        drop(bus);
        assert_eq!(phy.stops, 1);
    }

    #[test]
    fn test_nack_at_data_still_stops_once() {
        let mut phy = MockPhy::default();
        phy.nack_at = Some(3); // second data byte of the write run
        let mut bus = I2cMaster::new(&mut phy);

        assert_eq!(
            bus.write_register_multi(0x29, 0x00, &[0x11, 0x22]),
            Err(TwiError::DataNack)
        );
        drop(bus);
        assert_eq!(phy.stops, 1);
    }

    #[test]
    fn test_failed_start_still_stops_once() {
        let mut phy = MockPhy::default();
        phy.fail_start = true;
        let mut bus = I2cMaster::new(&mut phy);

        assert_eq!(
            bus.write_register(0x29, 0x00, 0x00),
            Err(TwiError::Start)
        );
        drop(bus);
        assert_eq!(phy.stops, 1);
    }

    #[test]
    fn test_read_register16_big_endian() {
        let mut phy = MockPhy::default();
        phy.read_data.push(0x12).unwrap();
        phy.read_data.push(0x34).unwrap();
        let mut bus = I2cMaster::new(&mut phy);

        assert_eq!(bus.read_register16_u16(0x29, 0x0096), Ok(0x1234));
        drop(bus);

        // The 16-bit index goes out MSB first
        assert_eq!(phy.log[2], ('W', 0x00));
        assert_eq!(phy.log[3], ('W', 0x96));
        assert_eq!(phy.stops, 1);
    }

    #[test]
    fn test_embedded_hal_write_read() {
        let mut phy = MockPhy::default();
        phy.read_data.push(0xEE).unwrap();
        let mut bus = I2cMaster::new(&mut phy);

        let mut buf = [0u8; 1];
        bus.write_read(0x29, &[0xC0], &mut buf).unwrap();
        drop(bus);

        assert_eq!(buf, [0xEE]);
        // One stop for the whole transaction, NACK on the final byte
        assert_eq!(phy.stops, 1);
        assert_eq!(phy.log.last(), Some(&('P', 0)));
        assert!(phy.log.iter().any(|&(tag, b)| tag == 'n' && b == 0xEE));
    }

    #[test]
    fn test_embedded_hal_error_propagates_with_stop() {
        let mut phy = MockPhy::default();
        phy.nack_at = Some(0);
        let mut bus = I2cMaster::new(&mut phy);

        assert_eq!(
            I2c::write(&mut bus, 0x29, &[0x01]),
            Err(TwiError::AddressNack)
        );
        drop(bus);
        assert_eq!(phy.stops, 1);
    }
}
