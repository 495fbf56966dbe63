//! Register interface trait and bus configuration

use crate::hardware::{BusError, BusResult};
use serde::{Deserialize, Serialize};

/// Hardware abstraction for the transceiver's register file
///
/// Every call is one synchronous request/response on the serial bus. The
/// implementation carries no protocol knowledge; the radio driver decides
/// what to read and write.
pub trait RegisterInterface {
    /// Read a single register (`address & 0x7F`, then one dummy byte)
    fn read_register(&mut self, address: u8) -> BusResult<u8>;

    /// Write a single register (`address | 0x80`, then the value)
    fn write_register(&mut self, address: u8, value: u8) -> BusResult<()>;

    /// Read `buffer.len()` consecutive bytes starting at `address` within one
    /// chip-select window. Reading the FIFO address drains the FIFO.
    fn read_burst(&mut self, address: u8, buffer: &mut [u8]) -> BusResult<()>;

    /// Read-modify-write of the bits selected by `mask`
    fn update_register(&mut self, address: u8, mask: u8, bits: u8) -> BusResult<()> {
        let current = self.read_register(address)?;
        self.write_register(address, (current & !mask) | (bits & mask))
    }
}

impl<T: RegisterInterface + ?Sized> RegisterInterface for Box<T> {
    fn read_register(&mut self, address: u8) -> BusResult<u8> {
        (**self).read_register(address)
    }

    fn write_register(&mut self, address: u8, value: u8) -> BusResult<()> {
        (**self).write_register(address, value)
    }

    fn read_burst(&mut self, address: u8, buffer: &mut [u8]) -> BusResult<()> {
        (**self).read_burst(address, buffer)
    }
}

/// Wiring of the transceiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// SPI device (e.g. "/dev/spidev0.0"); informational for the mock bus
    pub device: String,
    /// GPIO line the chip's DIO0 is wired to
    pub interrupt_pin: u8,
    /// Chip-select GPIO
    pub chip_select_pin: u8,
    /// SPI clock in Hz
    pub clock_hz: u32,
    /// Largest burst read accepted by the bus
    pub max_burst_len: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            device: "/dev/spidev0.0".to_string(),
            interrupt_pin: 2,
            chip_select_pin: 5,
            clock_hz: 8_000_000,
            max_burst_len: 64,
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> BusResult<()> {
        if self.max_burst_len == 0 || self.max_burst_len > 256 {
            return Err(BusError::BufferError {
                requested: self.max_burst_len,
                limit: 256,
            });
        }

        // SX1231 SPI runs up to 10 MHz
        if self.clock_hz == 0 || self.clock_hz > 10_000_000 {
            return Err(BusError::Transfer {
                kind: format!("unsupported SPI clock {} Hz", self.clock_hz),
            });
        }

        Ok(())
    }
}
