//! Packet integrity check
//!
//! The ISS protects the first six payload bytes with CRC-16/XMODEM
//! (polynomial 0x1021, initial value 0, MSB first) and appends the result
//! big-endian in bytes 6 and 7.

use crate::core::{PacketBuffer, CRC_COVERED_LEN};
use crc::{Crc, CRC_16_XMODEM};

const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC over the leading payload bytes of `buffer` (at most six)
pub fn compute(buffer: &[u8]) -> u16 {
    let covered = buffer.len().min(CRC_COVERED_LEN);
    XMODEM.checksum(&buffer[..covered])
}

/// A packet is accepted when the computed CRC matches the wire CRC and is
/// not zero. An all-zero CRC is what a silent or unpowered receiver reads.
pub fn is_valid(packet: &PacketBuffer) -> bool {
    let computed = compute(packet.as_bytes());
    computed != 0 && computed == packet.wire_crc()
}

/// Overwrite bytes 6 and 7 with the CRC of the first six
pub fn seal(packet: &mut PacketBuffer) {
    let [high, low] = compute(packet.as_bytes()).to_be_bytes();
    packet.0[6] = high;
    packet.0[7] = low;
}
