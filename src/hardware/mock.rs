//! Simulated RFM69 and ISS transmitter for testing and development
//!
//! `MockRfm69` models the chip at register level: a register file, the
//! receive FIFO, the mode-ready and payload-ready flags, RX restart, the
//! temperature sensor and RC calibration handshakes. `SimulatedTransmitter`
//! plays the ISS side, hopping through a channel table on its burst cadence.

use crate::core::{PacketBuffer, PACKET_INTERVAL_MS};
use crate::hardware::channels::ChannelTable;
use crate::hardware::registers::*;
use crate::hardware::{BusError, BusResult, RegisterInterface};
use crate::processing::crc;
use std::collections::VecDeque;

/// Silicon revision reported by RegVersion
const MOCK_VERSION: u8 = 0x24;

/// Reads of RegTemp1 that report a measurement in progress
const TEMPERATURE_BUSY_READS: u32 = 3;

/// Reads of RegOsc1 before calibration reports done
const RC_CALIBRATION_BUSY_READS: u32 = 2;

/// Register-level simulation of an RFM69 transceiver
pub struct MockRfm69 {
    registers: [u8; 0x80],
    fifo: VecDeque<u8>,
    writes: Vec<(u8, u8)>,
    connected: bool,
    simulate_errors: bool,
    error_probability: f32,
    mode_ready_delay: u32,
    mode_ready_countdown: u32,
    mode_ready_stalled: bool,
    temperature_busy: u32,
    rc_calibration_busy: u32,
    rx_restarts: u32,
    temperature_raw: u8,
}

impl MockRfm69 {
    /// Create a powered chip in standby with reset register values
    pub fn new() -> Self {
        let mut registers = [0u8; 0x80];
        registers[REG_OPMODE as usize] = RF_OPMODE_STANDBY;
        registers[REG_VERSION as usize] = MOCK_VERSION;
        registers[REG_IRQFLAGS1 as usize] = RF_IRQFLAGS1_MODEREADY;
        registers[REG_SYNCVALUE1 as usize] = 0x01;

        Self {
            registers,
            fifo: VecDeque::with_capacity(66),
            writes: Vec::new(),
            connected: true,
            simulate_errors: false,
            error_probability: 0.0,
            mode_ready_delay: 0,
            mode_ready_countdown: 0,
            mode_ready_stalled: false,
            temperature_busy: 0,
            rc_calibration_busy: 0,
            rx_restarts: 0,
            // !0xE8 = 23 degrees
            temperature_raw: 0xE8,
        }
    }

    /// Put a packet on the air as the ISS would send it (LSB first). The chip
    /// only captures it while in RX mode; returns whether it was captured.
    pub fn deliver_payload(&mut self, payload: &PacketBuffer, rssi_dbm: i16) -> bool {
        if !self.connected || !self.is_receiving() {
            return false;
        }

        // The FIFO holds bytes in bus order; the driver reverses them back
        self.fifo.clear();
        self.fifo
            .extend(payload.as_bytes().iter().map(|byte| byte.reverse_bits()));
        self.registers[REG_RSSIVALUE as usize] = (-(rssi_dbm.clamp(-127, 0)) * 2) as u8;
        self.registers[REG_IRQFLAGS2 as usize] |= RF_IRQFLAGS2_PAYLOADREADY;
        true
    }

    /// Leave PayloadReady asserted without any pending interrupt, as the chip
    /// does when a packet lands just as the host retunes
    pub fn force_payload_ready(&mut self) {
        self.registers[REG_IRQFLAGS2 as usize] |= RF_IRQFLAGS2_PAYLOADREADY;
    }

    /// Mode bits currently programmed in RegOpMode
    pub fn mode_bits(&self) -> u8 {
        self.registers[REG_OPMODE as usize] & !RF_OPMODE_KEEP_MASK
    }

    pub fn is_receiving(&self) -> bool {
        self.mode_bits() == RF_OPMODE_RECEIVER
    }

    /// The (MSB, MID, LSB) frequency word currently programmed
    pub fn frequency_word(&self) -> [u8; 3] {
        [
            self.registers[REG_FRFMSB as usize],
            self.registers[REG_FRFMID as usize],
            self.registers[REG_FRFLSB as usize],
        ]
    }

    /// Peek at a register without read side effects
    pub fn register(&self, address: u8) -> u8 {
        self.registers[(address & SPI_READ_MASK) as usize]
    }

    /// Every register write seen so far, in order
    pub fn writes(&self) -> &[(u8, u8)] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// Number of forced receiver restarts
    pub fn rx_restart_count(&self) -> u32 {
        self.rx_restarts
    }

    /// Bytes waiting in the FIFO
    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    /// Simulate a missing or miswired chip: writes vanish, reads return 0
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn reconnect(&mut self) {
        self.connected = true;
    }

    /// Report ModeReady only after `reads` polls following a mode change
    pub fn set_mode_ready_delay(&mut self, reads: u32) {
        self.mode_ready_delay = reads;
    }

    /// Never report ModeReady
    pub fn stall_mode_ready(&mut self, stalled: bool) {
        self.mode_ready_stalled = stalled;
    }

    /// Raw RegTemp2 value returned by the next measurement
    pub fn set_temperature_raw(&mut self, raw: u8) {
        self.temperature_raw = raw;
    }

    /// Raw RegRssiValue, in -0.5 dBm steps
    pub fn set_rssi_raw(&mut self, raw: u8) {
        self.registers[REG_RSSIVALUE as usize] = raw;
    }

    /// Enable bus error simulation with given probability (0.0 to 1.0)
    pub fn simulate_errors(&mut self, enable: bool, probability: f32) {
        self.simulate_errors = enable;
        self.error_probability = probability.clamp(0.0, 1.0);
    }

    fn should_simulate_error(&self) -> bool {
        if !self.simulate_errors {
            return false;
        }

        use rand::Rng;
        let mut rng = rand::thread_rng();
        rng.gen::<f32>() < self.error_probability
    }

    fn read_side_effects(&mut self, address: u8) -> u8 {
        match address {
            REG_FIFO => {
                let byte = self.fifo.pop_front().unwrap_or(0);
                if self.fifo.is_empty() {
                    self.registers[REG_IRQFLAGS2 as usize] &= !RF_IRQFLAGS2_PAYLOADREADY;
                }
                byte
            }
            REG_IRQFLAGS1 => {
                let flags = self.registers[REG_IRQFLAGS1 as usize] & !RF_IRQFLAGS1_MODEREADY;
                if self.mode_ready_stalled {
                    flags
                } else if self.mode_ready_countdown > 0 {
                    self.mode_ready_countdown -= 1;
                    flags
                } else {
                    flags | RF_IRQFLAGS1_MODEREADY
                }
            }
            REG_TEMP1 => {
                let value = self.registers[REG_TEMP1 as usize] & !RF_TEMP1_MEAS_RUNNING;
                if self.temperature_busy > 0 {
                    self.temperature_busy -= 1;
                    value | RF_TEMP1_MEAS_RUNNING
                } else {
                    value
                }
            }
            REG_TEMP2 => self.temperature_raw,
            REG_OSC1 => {
                let value = self.registers[REG_OSC1 as usize] & !RF_OSC1_RCCAL_DONE;
                if self.rc_calibration_busy > 0 {
                    self.rc_calibration_busy -= 1;
                    value
                } else {
                    value | RF_OSC1_RCCAL_DONE
                }
            }
            other => self.registers[other as usize],
        }
    }

    fn write_side_effects(&mut self, address: u8, value: u8) {
        match address {
            REG_OPMODE => {
                self.registers[REG_OPMODE as usize] = value;
                self.mode_ready_countdown = self.mode_ready_delay;
            }
            REG_IRQFLAGS2 => {
                // Flags are read-only; writing FifoOverrun flushes the FIFO
                if value & RF_IRQFLAGS2_FIFOOVERRUN != 0 {
                    self.fifo.clear();
                    self.registers[REG_IRQFLAGS2 as usize] &= !RF_IRQFLAGS2_PAYLOADREADY;
                }
            }
            REG_PACKETCONFIG2 => {
                if value & RF_PACKET2_RXRESTART != 0 {
                    self.rx_restarts += 1;
                    self.fifo.clear();
                    self.registers[REG_IRQFLAGS2 as usize] &= !RF_IRQFLAGS2_PAYLOADREADY;
                }
                self.registers[REG_PACKETCONFIG2 as usize] = value & !RF_PACKET2_RXRESTART;
            }
            REG_TEMP1 => {
                if value & RF_TEMP1_MEAS_START != 0 {
                    self.temperature_busy = TEMPERATURE_BUSY_READS;
                }
            }
            REG_OSC1 => {
                if value & RF_OSC1_RCCAL_START != 0 {
                    self.rc_calibration_busy = RC_CALIBRATION_BUSY_READS;
                }
            }
            REG_VERSION | REG_RSSIVALUE | REG_IRQFLAGS1 | REG_TEMP2 => {}
            other => self.registers[other as usize] = value,
        }
    }
}

impl Default for MockRfm69 {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterInterface for MockRfm69 {
    fn read_register(&mut self, address: u8) -> BusResult<u8> {
        if self.should_simulate_error() {
            return Err(BusError::Transfer {
                kind: "simulated transfer failure".to_string(),
            });
        }

        if !self.connected {
            return Ok(0x00);
        }

        Ok(self.read_side_effects(address & SPI_READ_MASK))
    }

    fn write_register(&mut self, address: u8, value: u8) -> BusResult<()> {
        if self.should_simulate_error() {
            return Err(BusError::Transfer {
                kind: "simulated transfer failure".to_string(),
            });
        }

        if !self.connected {
            return Ok(());
        }

        let address = address & SPI_READ_MASK;
        self.writes.push((address, value));
        self.write_side_effects(address, value);
        Ok(())
    }

    fn read_burst(&mut self, address: u8, buffer: &mut [u8]) -> BusResult<()> {
        if self.should_simulate_error() {
            return Err(BusError::Transfer {
                kind: "simulated burst failure".to_string(),
            });
        }

        if !self.connected {
            buffer.fill(0);
            return Ok(());
        }

        let address = address & SPI_READ_MASK;
        for (offset, byte) in buffer.iter_mut().enumerate() {
            // FIFO reads stay on the FIFO address; others auto-increment
            let target = if address == REG_FIFO {
                REG_FIFO
            } else {
                address.wrapping_add(offset as u8) & SPI_READ_MASK
            };
            *byte = self.read_side_effects(target);
        }
        Ok(())
    }
}

/// Message types in the order the simulated ISS cycles through them
const MESSAGE_CYCLE: [u8; 7] = [0x8, 0xE, 0x5, 0x9, 0xA, 0x2, 0x7];

/// Simulated ISS: one burst every interval, one channel further each time
pub struct SimulatedTransmitter {
    table: &'static ChannelTable,
    channel: usize,
    interval_ms: u64,
    next_burst_ms: u64,
    cycle_position: usize,
    rain_counter: u8,
    rssi_dbm: i16,
    loss_probability: f32,
    silent_until_ms: u64,
    sent: u32,
}

impl SimulatedTransmitter {
    /// Transmitter whose first burst goes out at `first_burst_ms` on `channel`
    pub fn new(table: &'static ChannelTable, channel: usize, first_burst_ms: u64) -> Self {
        Self {
            table,
            channel: channel % table.len().max(1),
            interval_ms: PACKET_INTERVAL_MS,
            next_burst_ms: first_burst_ms,
            cycle_position: 0,
            rain_counter: 100,
            rssi_dbm: -62,
            loss_probability: 0.0,
            silent_until_ms: 0,
            sent: 0,
        }
    }

    /// Drop each burst with the given probability (fading, collisions)
    pub fn set_loss_probability(&mut self, probability: f32) {
        self.loss_probability = probability.clamp(0.0, 1.0);
    }

    /// Keep hopping but do not reach the receiver until `until_ms`
    pub fn silence_until(&mut self, until_ms: u64) {
        self.silent_until_ms = until_ms;
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn next_burst_ms(&self) -> u64 {
        self.next_burst_ms
    }

    /// Bursts transmitted so far, including lost ones
    pub fn bursts_sent(&self) -> u32 {
        self.sent
    }

    /// Build the next packet in the message cycle with a valid CRC
    pub fn next_packet(&mut self) -> PacketBuffer {
        let message_type = MESSAGE_CYCLE[self.cycle_position % MESSAGE_CYCLE.len()];
        self.cycle_position += 1;

        let (byte3, byte4) = match message_type {
            // 72.5 F -> 22.5 C
            0x8 => (0x2D, 0x50),
            0xE => {
                self.rain_counter = (self.rain_counter + 1) & 0x7F;
                (self.rain_counter, 0x00)
            }
            // no rain
            0x5 => (0xFF, 0x00),
            0x9 => (0x0C, 0x00),
            // 65.4 %
            0xA => (0x8E, 0x20),
            0x2 => (0x4D, 0x40),
            0x7 => (0x40, 0x80),
            _ => (0x00, 0x00),
        };

        let mut packet = PacketBuffer::new([message_type << 4, 0x05, 0x80, byte3, byte4, 0x00, 0, 0]);
        crc::seal(&mut packet);
        packet
    }

    /// Transmit if a burst is due at `now_ms`. Returns `Some(true)` when the
    /// chip captured the packet (the caller then raises the interrupt),
    /// `Some(false)` when the burst was missed, `None` if nothing was due.
    pub fn poll(&mut self, now_ms: u64, chip: &mut MockRfm69) -> Option<bool> {
        if now_ms < self.next_burst_ms {
            return None;
        }

        let packet = self.next_packet();
        let on_air = self.table.get(self.channel);
        self.next_burst_ms += self.interval_ms;
        self.channel = self.table.next(self.channel);
        self.sent += 1;

        if now_ms < self.silent_until_ms || self.is_lost() {
            return Some(false);
        }

        let tuned = on_air.map_or(false, |word| word == chip.frequency_word());
        Some(tuned && chip.deliver_payload(&packet, self.rssi_dbm))
    }

    fn is_lost(&self) -> bool {
        if self.loss_probability <= 0.0 {
            return false;
        }

        use rand::Rng;
        rand::thread_rng().gen::<f32>() < self.loss_probability
    }
}
