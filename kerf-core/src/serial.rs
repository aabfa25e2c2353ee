//! Interrupt-driven serial transport
//!
//! Byte transport between the host link and the command parser. The
//! receive interrupt inspects every incoming byte for real-time command
//! values - those never reach the data buffer and instead set bits on
//! the [`EventBus`]; everything else lands in the RX ring buffer. The
//! transmit interrupt streams the TX ring buffer out, interleaving
//! XON/XOFF flow-control bytes ahead of data when enabled.
//!
//! # Context discipline
//!
//! [`SerialTransport::rx_isr`] and [`SerialTransport::tx_isr`] run in
//! interrupt context, [`SerialTransport::read`] and
//! [`SerialTransport::write`] in the main loop. Platform glue that lets
//! both contexts reach the transport must wrap it in a
//! critical-section cell.

use heapless::Vec;
use kerf_hal::uart::TxIrqControl;

use crate::ring::RingBuffer;
use crate::system::events::{EventBus, RtEvent};

/// RX ring buffer size (usable capacity is one less)
pub const RX_BUFFER_SIZE: usize = 128;
/// TX ring buffer size (usable capacity is one less)
pub const TX_BUFFER_SIZE: usize = 64;

/// Real-time command bytes intercepted by the receive interrupt
pub mod cmd {
    /// Emit a status report (`?`)
    pub const STATUS_REPORT: u8 = b'?';
    /// Begin or resume buffered motion (`~`)
    pub const CYCLE_START: u8 = b'~';
    /// Pause in-progress motion (`!`)
    pub const FEED_HOLD: u8 = b'!';
    /// Safety door interlock opened (`@`)
    pub const SAFETY_DOOR: u8 = b'@';
    /// Full controller reset (ctrl-x)
    pub const RESET: u8 = 0x18;
}

/// RX occupancy that schedules an XOFF
pub const RX_FLOW_HIGH: usize = 96;
/// RX occupancy that schedules an XON once XOFF was sent
pub const RX_FLOW_LOW: usize = 64;

const XON_BYTE: u8 = 0x11;
const XOFF_BYTE: u8 = 0x13;

/// XON/XOFF flow-control state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum FlowState {
    /// Sender is free to transmit (rest state)
    XonSent,
    /// XOFF queued, goes out on the next TX interrupt
    SendXoff,
    /// Sender has been told to pause
    XoffSent,
    /// XON queued, goes out on the next TX interrupt
    SendXon,
}

/// A blocking write was abandoned because a reset is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxAbort;

/// Serial byte transport with real-time command interception
pub struct SerialTransport<T: TxIrqControl> {
    rx: RingBuffer<u8, RX_BUFFER_SIZE>,
    tx: RingBuffer<u8, TX_BUFFER_SIZE>,
    tx_irq: T,
    flow: FlowState,
    flow_enabled: bool,
    rx_dropped: u16,
}

impl<T: TxIrqControl> SerialTransport<T> {
    /// Create a transport with empty buffers
    pub fn new(tx_irq: T, flow_enabled: bool) -> Self {
        Self {
            rx: RingBuffer::new(),
            tx: RingBuffer::new(),
            tx_irq,
            flow: FlowState::XonSent,
            flow_enabled,
            rx_dropped: 0,
        }
    }

    /// Receive-interrupt entry point
    ///
    /// Real-time command bytes never enter the data buffer: they set
    /// the matching event bit instead (the reset action fires straight
    /// from interrupt context). On a full RX buffer the byte is dropped
    /// and the drop is counted for the main loop to report.
    pub fn rx_isr(&mut self, data: u8, bus: &EventBus) {
        match data {
            cmd::STATUS_REPORT => bus.raise(RtEvent::STATUS_REPORT),
            cmd::CYCLE_START => bus.raise(RtEvent::CYCLE_START),
            cmd::FEED_HOLD => bus.raise(RtEvent::FEED_HOLD),
            cmd::SAFETY_DOOR => bus.raise(RtEvent::SAFETY_DOOR),
            cmd::RESET => bus.raise(RtEvent::RESET),
            _ => {
                if self.rx.push(data).is_err() {
                    self.rx_dropped = self.rx_dropped.saturating_add(1);
                    return;
                }
                if self.flow_enabled
                    && self.flow == FlowState::XonSent
                    && self.rx.len() >= RX_FLOW_HIGH
                {
                    self.flow = FlowState::SendXoff;
                    self.tx_irq.enable_tx_irq();
                }
            }
        }
    }

    /// Transmit-interrupt entry point
    ///
    /// Returns the next byte to load into the data register. Pending
    /// flow-control bytes cut ahead of buffered data. Disarms the TX
    /// interrupt once nothing is left to send.
    pub fn tx_isr(&mut self) -> Option<u8> {
        let out = match self.flow {
            FlowState::SendXoff => {
                self.flow = FlowState::XoffSent;
                Some(XOFF_BYTE)
            }
            FlowState::SendXon => {
                self.flow = FlowState::XonSent;
                Some(XON_BYTE)
            }
            _ => self.tx.pop(),
        };
        if self.tx.is_empty() {
            self.tx_irq.disable_tx_irq();
        }
        out
    }

    /// Non-blocking read of the next data byte
    pub fn read(&mut self) -> Option<u8> {
        let data = self.rx.pop()?;
        if self.flow_enabled
            && self.flow == FlowState::XoffSent
            && self.rx.len() < RX_FLOW_LOW
        {
            self.flow = FlowState::SendXon;
            self.tx_irq.enable_tx_irq();
        }
        Some(data)
    }

    /// Queue one byte for transmission
    ///
    /// Busy-waits while the TX buffer is full - the TX interrupt drains
    /// it concurrently - but abandons the wait when a reset event is
    /// pending so shutdown can never deadlock here.
    pub fn write(&mut self, mut data: u8, bus: &EventBus) -> Result<(), TxAbort> {
        loop {
            match self.tx.push(data) {
                Ok(()) => {
                    self.tx_irq.enable_tx_irq();
                    return Ok(());
                }
                Err(rejected) => {
                    if bus.is_pending(RtEvent::RESET) {
                        return Err(TxAbort);
                    }
                    data = rejected;
                    core::hint::spin_loop();
                }
            }
        }
    }

    /// Queue a byte slice for transmission
    pub fn write_all(&mut self, data: &[u8], bus: &EventBus) -> Result<(), TxAbort> {
        for &b in data {
            self.write(b, bus)?;
        }
        Ok(())
    }

    /// Number of data bytes waiting to be read
    pub fn rx_count(&self) -> usize {
        self.rx.len()
    }

    /// Number of bytes waiting to be transmitted
    pub fn tx_count(&self) -> usize {
        self.tx.len()
    }

    /// Bytes dropped on RX overflow since the last call; clears the count
    ///
    /// Overflow still discards bytes (the receive interrupt must stay
    /// bounded) but the condition is surfaced here instead of being
    /// silent.
    pub fn take_rx_overflow(&mut self) -> u16 {
        core::mem::take(&mut self.rx_dropped)
    }

    /// Drop all unread RX data and re-arm flow control
    ///
    /// Used by reset and e-stop handling.
    pub fn reset_read_buffer(&mut self) {
        self.rx.clear();
        self.flow = FlowState::XonSent;
    }
}

/// Maximum accepted command-line length
pub const LINE_BUFFER_SIZE: usize = 80;

/// A line exceeded [`LINE_BUFFER_SIZE`] and was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineOverflow;

/// Assembles the post-interception byte stream into bounded lines
///
/// Carriage returns are dropped, empty lines are skipped, and an
/// overlong line is reported as an error (and discarded through its
/// terminator) rather than silently truncated.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8, LINE_BUFFER_SIZE>,
    overflowed: bool,
}

impl LineAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one data byte
    ///
    /// Returns a complete line on its terminator, `Ok(None)` while
    /// accumulating, or [`LineOverflow`] once for a line that outgrew
    /// the buffer.
    pub fn push(&mut self, byte: u8) -> Result<Option<&[u8]>, LineOverflow> {
        match byte {
            b'\n' => {
                let overflowed = core::mem::take(&mut self.overflowed);
                if overflowed {
                    self.buf.clear();
                    return Ok(None);
                }
                if self.buf.is_empty() {
                    return Ok(None);
                }
                Ok(Some(self.buf.as_slice()))
            }
            b'\r' => Ok(None),
            _ => {
                if self.overflowed {
                    return Ok(None);
                }
                if self.buf.push(byte).is_err() {
                    self.overflowed = true;
                    return Err(LineOverflow);
                }
                Ok(None)
            }
        }
    }

    /// Discard the line returned by the last `push`
    ///
    /// Must be called once the caller has consumed the completed line.
    pub fn consume(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records TX interrupt arming for assertions
    #[derive(Debug, Default)]
    struct MockTxIrq {
        armed: bool,
        arm_count: u32,
    }

    impl TxIrqControl for MockTxIrq {
        fn enable_tx_irq(&mut self) {
            self.armed = true;
            self.arm_count += 1;
        }

        fn disable_tx_irq(&mut self) {
            self.armed = false;
        }
    }

    fn transport(flow: bool) -> SerialTransport<MockTxIrq> {
        SerialTransport::new(MockTxIrq::default(), flow)
    }

    #[test]
    fn test_command_interception() {
        // Reserved bytes set flags; ordinary bytes keep their order
        let bus = EventBus::new();
        let mut serial = transport(false);

        for &b in b"G1 X\x1810!\n?" {
            serial.rx_isr(b, &bus);
        }

        assert!(bus.is_pending(RtEvent::RESET));
        assert!(bus.is_pending(RtEvent::FEED_HOLD));
        assert!(bus.is_pending(RtEvent::STATUS_REPORT));

        let mut out = heapless::Vec::<u8, 16>::new();
        while let Some(b) = serial.read() {
            out.push(b).unwrap();
        }
        assert_eq!(out.as_slice(), b"G1 X10\n");
    }

    #[test]
    fn test_reset_byte_never_buffered() {
        let bus = EventBus::new();
        let mut serial = transport(false);
        serial.rx_isr(cmd::RESET, &bus);
        assert_eq!(serial.rx_count(), 0);
        assert!(bus.is_pending(RtEvent::RESET));
    }

    #[test]
    fn test_rx_overflow_drops_and_reports() {
        // 150 bytes into a 128-slot buffer: 127 kept, 23 counted dropped
        let bus = EventBus::new();
        let mut serial = transport(false);

        for i in 0..150u32 {
            serial.rx_isr(200 + (i % 50) as u8, &bus);
        }

        assert_eq!(serial.rx_count(), 127);
        assert_eq!(serial.take_rx_overflow(), 23);
        assert_eq!(serial.take_rx_overflow(), 0);

        let mut count = 0;
        while serial.read().is_some() {
            count += 1;
        }
        assert_eq!(count, 127);
    }

    #[test]
    fn test_write_arms_tx_irq_and_tx_isr_drains() {
        let bus = EventBus::new();
        let mut serial = transport(false);

        serial.write_all(b"ok\r\n", &bus).unwrap();
        assert!(serial.tx_irq.armed);
        assert_eq!(serial.tx_irq.arm_count, 4);
        assert_eq!(serial.tx_count(), 4);

        assert_eq!(serial.tx_isr(), Some(b'o'));
        assert_eq!(serial.tx_isr(), Some(b'k'));
        assert_eq!(serial.tx_isr(), Some(b'\r'));
        assert!(serial.tx_irq.armed);
        assert_eq!(serial.tx_isr(), Some(b'\n'));
        // Buffer drained: interrupt disarmed
        assert!(!serial.tx_irq.armed);
        assert_eq!(serial.tx_isr(), None);
    }

    #[test]
    fn test_blocked_write_escapes_on_reset() {
        let bus = EventBus::new();
        let mut serial = transport(false);

        // Fill the TX buffer to its usable capacity
        for i in 0..TX_BUFFER_SIZE - 1 {
            serial.write(i as u8, &bus).unwrap();
        }

        bus.raise(RtEvent::RESET);
        assert_eq!(serial.write(0xAB, &bus), Err(TxAbort));

        // With space freed the same write goes through
        bus.clear(RtEvent::RESET);
        serial.tx_isr();
        assert_eq!(serial.write(0xAB, &bus), Ok(()));
    }

    #[test]
    fn test_flow_control_schedules_xoff_then_xon() {
        let bus = EventBus::new();
        let mut serial = transport(true);

        // Crossing the high-water mark queues exactly one XOFF
        for i in 0..RX_FLOW_HIGH + 4 {
            serial.rx_isr(200 + (i % 50) as u8, &bus);
        }
        assert!(serial.tx_irq.armed);
        assert_eq!(serial.tx_isr(), Some(XOFF_BYTE));
        // XOFF cuts ahead even though the data buffer is empty
        assert_eq!(serial.tx_isr(), None);

        // Draining below the low-water mark queues an XON
        while serial.rx_count() >= RX_FLOW_LOW {
            serial.read();
        }
        assert_eq!(serial.tx_isr(), Some(XON_BYTE));
    }

    #[test]
    fn test_flow_bytes_cut_ahead_of_data() {
        let bus = EventBus::new();
        let mut serial = transport(true);

        serial.write(b'x', &bus).unwrap();
        for i in 0..RX_FLOW_HIGH {
            serial.rx_isr(200 + (i % 50) as u8, &bus);
        }
        assert_eq!(serial.tx_isr(), Some(XOFF_BYTE));
        assert_eq!(serial.tx_isr(), Some(b'x'));
    }

    #[test]
    fn test_reset_read_buffer_rearms_flow() {
        let bus = EventBus::new();
        let mut serial = transport(true);

        for i in 0..RX_FLOW_HIGH {
            serial.rx_isr(200 + (i % 50) as u8, &bus);
        }
        serial.tx_isr(); // XOFF out

        serial.reset_read_buffer();
        assert_eq!(serial.rx_count(), 0);

        // Flow state back at rest: next crossing schedules XOFF again
        for i in 0..RX_FLOW_HIGH {
            serial.rx_isr(200 + (i % 50) as u8, &bus);
        }
        assert_eq!(serial.tx_isr(), Some(XOFF_BYTE));
    }

    #[test]
    fn test_line_assembly() {
        let mut lines = LineAssembler::new();

        for &b in b"G0 X1" {
            assert_eq!(lines.push(b), Ok(None));
        }
        assert_eq!(lines.push(b'\r'), Ok(None));
        assert_eq!(lines.push(b'\n'), Ok(Some(b"G0 X1".as_slice())));
        lines.consume();

        // Empty lines are skipped
        assert_eq!(lines.push(b'\n'), Ok(None));
    }

    #[test]
    fn test_line_overflow_reported_once_and_discarded() {
        let mut lines = LineAssembler::new();

        let mut overflows = 0;
        for _ in 0..LINE_BUFFER_SIZE + 10 {
            if lines.push(b'a').is_err() {
                overflows += 1;
            }
        }
        assert_eq!(overflows, 1);

        // The overlong line's terminator yields nothing
        assert_eq!(lines.push(b'\n'), Ok(None));

        // The next line parses normally
        for &b in b"G4" {
            lines.push(b).unwrap();
        }
        assert_eq!(lines.push(b'\n'), Ok(Some(b"G4".as_slice())));
    }
}
