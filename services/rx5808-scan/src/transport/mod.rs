//! Bus capability consumed by the tuner and the RSSI sampler
//!
//! The core never opens or configures the SPI bus or GPIO lines itself. A
//! caller hands it something implementing [`Transport`] and keeps ownership
//! for the lifetime of the process.

pub mod sim;

pub use sim::{BusOp, Emitter, SimulatedTransport};

pub use crate::error::TransportError;

/// Chip-select framed byte transfers plus a digital input read
pub trait Transport {
    /// Pull chip-select active, opening a transaction
    fn assert_select(&mut self) -> Result<(), TransportError>;

    /// Release chip-select, closing a transaction
    fn deassert_select(&mut self) -> Result<(), TransportError>;

    /// Clock out raw bytes
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Clock in `count` raw bytes
    fn read(&mut self, count: usize) -> Result<Vec<u8>, TransportError>;

    /// Read the level of a digital input pin
    fn read_digital(&mut self, pin: u8) -> Result<bool, TransportError>;

    /// Give back the bus and pins. Called once when the receiver handle drops.
    fn release(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
