//! SPI register interface for RFM69-class transceivers
//!
//! Works with any `embedded_hal::spi::SpiDevice`, which owns chip-select
//! handling: each register access is one transaction with CS asserted.

use crate::hardware::registers::{SPI_READ_MASK, SPI_WRITE_FLAG};
use crate::hardware::{BusConfig, BusError, BusResult, RegisterInterface};
use embedded_hal::spi::{Error as _, SpiDevice};

/// Register interface backed by an embedded-hal SPI device
pub struct SpiRegisterInterface<SPI> {
    spi: SPI,
    max_burst_len: usize,
    scratch: Vec<u8>,
}

impl<SPI: SpiDevice> SpiRegisterInterface<SPI> {
    /// Create a new SPI register interface
    pub fn new(spi: SPI, config: &BusConfig) -> BusResult<Self> {
        config.validate()?;

        Ok(Self {
            spi,
            max_burst_len: config.max_burst_len,
            scratch: Vec::with_capacity(config.max_burst_len + 1),
        })
    }

    /// Give the SPI device back
    pub fn release(self) -> SPI {
        self.spi
    }

    fn map_error(error: SPI::Error) -> BusError {
        BusError::Transfer {
            kind: format!("{:?}", error.kind()),
        }
    }
}

impl<SPI: SpiDevice> RegisterInterface for SpiRegisterInterface<SPI> {
    fn read_register(&mut self, address: u8) -> BusResult<u8> {
        let mut frame = [address & SPI_READ_MASK, 0];
        self.spi
            .transfer_in_place(&mut frame)
            .map_err(Self::map_error)?;
        Ok(frame[1])
    }

    fn write_register(&mut self, address: u8, value: u8) -> BusResult<()> {
        self.spi
            .write(&[address | SPI_WRITE_FLAG, value])
            .map_err(Self::map_error)
    }

    fn read_burst(&mut self, address: u8, buffer: &mut [u8]) -> BusResult<()> {
        if buffer.len() > self.max_burst_len {
            return Err(BusError::BufferError {
                requested: buffer.len(),
                limit: self.max_burst_len,
            });
        }

        self.scratch.clear();
        self.scratch.push(address & SPI_READ_MASK);
        self.scratch.resize(buffer.len() + 1, 0);
        self.spi
            .transfer_in_place(&mut self.scratch)
            .map_err(Self::map_error)?;
        buffer.copy_from_slice(&self.scratch[1..]);
        Ok(())
    }
}
