//! Core data types shared by the radio driver and the control loop

use crate::core::constants::{DATA_UNAVAILABLE, PACKET_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating modes of the transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioMode {
    Sleep,
    Standby,
    /// PLL locked; never requested by this receiver
    Synth,
    Rx,
    /// Never requested by this receiver
    Tx,
}

/// The eight bytes drained from the chip FIFO, already in on-air bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PacketBuffer(pub [u8; PACKET_LEN]);

impl PacketBuffer {
    pub fn new(bytes: [u8; PACKET_LEN]) -> Self {
        Self(bytes)
    }

    /// Byte at `index`, or `DATA_UNAVAILABLE` outside the packet
    pub fn get(&self, index: usize) -> u8 {
        self.0.get(index).copied().unwrap_or(DATA_UNAVAILABLE)
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    /// High nibble of byte 0
    pub fn message_type(&self) -> u8 {
        self.0[0] >> 4
    }

    /// Checksum carried in the last two bytes (big-endian)
    pub fn wire_crc(&self) -> u16 {
        u16::from_be_bytes([self.0[6], self.0[7]])
    }
}

impl fmt::Display for PacketBuffer {
    /// Colon separated hex, e.g. `80:00:B2:30:A9:00:AA:DA`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// A packet pulled out of the driver together with its reception metadata
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturedPacket {
    pub payload: PacketBuffer,
    pub rssi: i16,
    pub channel: usize,
}

/// Outcome of one control-loop tick
#[derive(Debug, Clone, PartialEq)]
pub enum ReceptionEvent {
    None,
    Success(CapturedPacket),
    CrcError,
}
