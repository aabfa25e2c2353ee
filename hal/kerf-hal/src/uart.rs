//! UART serial abstractions
//!
//! The serial transport in `kerf-core` owns its own ring buffers and is
//! pumped by the receive/transmit interrupts, so the only hardware hook
//! it needs is control over the transmit-data-register-empty interrupt:
//! armed whenever there is something to send, disarmed when the TX
//! buffer drains.

/// Transmit-interrupt gating
///
/// Implementations flip the chip's "data register empty" interrupt
/// enable bit. Both methods may be called from interrupt context and
/// must not block.
pub trait TxIrqControl {
    /// Arm the transmit interrupt so queued bytes start streaming
    fn enable_tx_irq(&mut self);

    /// Disarm the transmit interrupt once the queue is empty
    fn disable_tx_irq(&mut self);
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self { baudrate: 115_200 }
    }
}
