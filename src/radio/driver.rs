//! Register-level RFM69 driver for ISS reception
//!
//! All chip state that both the interrupt path and the control loop touch
//! lives behind one mutex. Holding the lock is the critical section: no bus
//! transaction from one side can interleave with the other.

use crate::core::{CapturedPacket, PacketBuffer, RadioMode, PACKET_LEN};
use crate::hardware::registers::*;
use crate::hardware::{ChannelTable, RegisterInterface};
use crate::processing::crc;
use crate::radio::{RadioError, RadioResult};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace, warn};

/// Test patterns the handshake writes to SyncValue1
const HANDSHAKE_PATTERNS: [u8; 2] = [0xAA, 0x55];

/// Upper bounds for every busy-wait on a chip flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinLimits {
    /// Write/read-back attempts per handshake pattern
    pub handshake_attempts: u32,
    /// Polls of RegIrqFlags1 waiting for ModeReady
    pub mode_ready_polls: u32,
    /// Polls of RegTemp1 while a measurement runs
    pub temperature_polls: u32,
    /// Polls of RegOsc1 waiting for RC calibration
    pub calibration_polls: u32,
}

impl Default for SpinLimits {
    fn default() -> Self {
        Self {
            handshake_attempts: 100,
            mode_ready_polls: 10_000,
            temperature_polls: 10_000,
            calibration_polls: 10_000,
        }
    }
}

/// Configuration written during initialization, in order
const CONFIG: [(u8, u8); 24] = [
    (REG_OPMODE, RF_OPMODE_SEQUENCER_ON | RF_OPMODE_LISTEN_OFF | RF_OPMODE_STANDBY),
    (
        REG_DATAMODUL,
        RF_DATAMODUL_DATAMODE_PACKET | RF_DATAMODUL_MODULATIONTYPE_FSK | RF_DATAMODUL_MODULATIONSHAPING_10,
    ),
    (REG_BITRATEMSB, RF_BITRATEMSB_19200),
    (REG_BITRATELSB, RF_BITRATELSB_19200),
    (REG_FDEVMSB, RF_FDEVMSB_4800),
    (REG_FDEVLSB, RF_FDEVLSB_4800),
    (REG_AFCCTRL, RF_AFCLOWBETA_OFF),
    (REG_LNA, RF_LNA_ZIN_50 | RF_LNA_GAINSELECT_AUTO),
    (REG_RXBW, RF_RXBW_DCCFREQ_010 | RF_RXBW_MANT_20 | RF_RXBW_EXP_4),
    (REG_AFCBW, RF_RXBW_DCCFREQ_010 | RF_RXBW_MANT_20 | RF_RXBW_EXP_3),
    (REG_AFCFEI, RF_AFCFEI_AFCAUTOCLEAR_ON | RF_AFCFEI_AFCAUTO_ON),
    (REG_DIOMAPPING1, RF_DIOMAPPING1_DIO0_01),
    // Flushes the FIFO; the first packet after reset is garbage otherwise
    (REG_IRQFLAGS2, RF_IRQFLAGS2_FIFOOVERRUN),
    (REG_RSSITHRESH, RF_RSSITHRESH_VALUE),
    (REG_PREAMBLELSB, ISS_PREAMBLE_LEN),
    (REG_SYNCCONFIG, RF_SYNC_ON | RF_SYNC_FIFOFILL_AUTO | RF_SYNC_SIZE_2 | RF_SYNC_TOL_2),
    (REG_SYNCVALUE1, ISS_SYNC_BYTE_1),
    (REG_SYNCVALUE2, ISS_SYNC_BYTE_2),
    (
        REG_PACKETCONFIG1,
        RF_PACKET1_FORMAT_FIXED
            | RF_PACKET1_DCFREE_OFF
            | RF_PACKET1_CRC_OFF
            | RF_PACKET1_CRCAUTOCLEAR_OFF
            | RF_PACKET1_ADRSFILTERING_OFF,
    ),
    (REG_PAYLOADLENGTH, PACKET_LEN as u8),
    (REG_FIFOTHRESH, RF_FIFOTHRESH_TXSTART_FIFOTHRESH | 0x07),
    (
        REG_PACKETCONFIG2,
        RF_PACKET2_RXRESTARTDELAY_2BITS | RF_PACKET2_AUTORXRESTART_ON | RF_PACKET2_AES_OFF,
    ),
    (REG_TESTDAGC, RF_DAGC_IMPROVED_LOWBETA0),
    (REG_TESTAFC, 0),
];

/// State shared between the interrupt path and the control loop
struct RadioShared<B> {
    bus: B,
    mode: RadioMode,
    channel: usize,
    packet: PacketBuffer,
    packet_received: bool,
    crc_error: bool,
    rssi: i16,
}

impl<B: RegisterInterface> RadioShared<B> {
    fn set_mode(&mut self, mode: RadioMode, limits: &SpinLimits) -> RadioResult<()> {
        if mode == self.mode {
            return Ok(());
        }

        let bits = match mode {
            RadioMode::Sleep => RF_OPMODE_SLEEP,
            RadioMode::Standby => RF_OPMODE_STANDBY,
            RadioMode::Rx => RF_OPMODE_RECEIVER,
            RadioMode::Synth | RadioMode::Tx => {
                return Err(RadioError::UnsupportedMode { mode });
            }
        };

        self.bus
            .update_register(REG_OPMODE, !RF_OPMODE_KEEP_MASK, bits)?;

        let leaving_sleep = self.mode == RadioMode::Sleep;
        self.mode = mode;
        trace!(target: "rfm", ?mode, "mode switched");

        // The FIFO is not usable until the oscillator is back up
        if leaving_sleep {
            self.wait_mode_ready(limits.mode_ready_polls)?;
        }
        Ok(())
    }

    fn wait_mode_ready(&mut self, polls: u32) -> RadioResult<()> {
        self.wait_for(REG_IRQFLAGS1, RF_IRQFLAGS1_MODEREADY, true, polls, "ModeReady")
    }

    /// Poll `address` until `(value & mask != 0) == set`
    fn wait_for(
        &mut self,
        address: u8,
        mask: u8,
        set: bool,
        polls: u32,
        what: &'static str,
    ) -> RadioResult<()> {
        for _ in 0..polls.max(1) {
            let value = self.bus.read_register(address)?;
            if (value & mask != 0) == set {
                return Ok(());
            }
        }
        Err(RadioError::Timeout { what })
    }

    fn receive_begin(&mut self, limits: &SpinLimits) -> RadioResult<()> {
        self.packet_received = false;

        // A stale PayloadReady would keep DIO0 high and block the next interrupt
        if self.bus.read_register(REG_IRQFLAGS2)? & RF_IRQFLAGS2_PAYLOADREADY != 0 {
            let current = self.bus.read_register(REG_PACKETCONFIG2)?;
            self.bus.write_register(
                REG_PACKETCONFIG2,
                (current & RF_PACKET2_RXRESTART_CLEAR_MASK) | RF_PACKET2_RXRESTART,
            )?;
            debug!(target: "rfm", "stale payload discarded, receiver restarted");
        }

        self.bus
            .write_register(REG_DIOMAPPING1, RF_DIOMAPPING1_DIO0_01)?;
        self.set_mode(RadioMode::Rx, limits)
    }

    fn read_rssi(&mut self) -> RadioResult<i16> {
        let raw = self.bus.read_register(REG_RSSIVALUE)?;
        Ok((-(raw as i16)) >> 1)
    }
}

/// Driver for an RFM69 tuned to the ISS hop table
pub struct RadioDriver<B> {
    shared: Mutex<RadioShared<B>>,
    table: &'static ChannelTable,
    limits: SpinLimits,
}

impl<B: RegisterInterface> RadioDriver<B> {
    /// Wrap a register interface. The chip is not touched until `initialize`.
    pub fn new(bus: B, table: &'static ChannelTable) -> Self {
        Self {
            shared: Mutex::new(RadioShared {
                bus,
                mode: RadioMode::Standby,
                channel: 0,
                packet: PacketBuffer::default(),
                packet_received: false,
                crc_error: false,
                rssi: 0,
            }),
            table,
            limits: SpinLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SpinLimits) -> Self {
        self.limits = limits;
        self
    }

    fn lock(&self) -> MutexGuard<'_, RadioShared<B>> {
        // Shared state stays consistent even if a holder panicked
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the bus
    pub fn critical_section<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        let mut shared = self.lock();
        f(&mut shared.bus)
    }

    /// Verify the chip answers, load the ISS configuration and settle in standby
    pub fn initialize(&self) -> RadioResult<()> {
        let mut shared = self.lock();

        for pattern in HANDSHAKE_PATTERNS {
            let mut echoed = false;
            for _ in 0..self.limits.handshake_attempts {
                shared.bus.write_register(REG_SYNCVALUE1, pattern)?;
                if shared.bus.read_register(REG_SYNCVALUE1)? == pattern {
                    echoed = true;
                    break;
                }
            }
            if !echoed {
                return Err(RadioError::HandshakeFailed {
                    pattern,
                    attempts: self.limits.handshake_attempts,
                });
            }
        }
        debug!(target: "setup", "transceiver handshake complete");

        for (address, value) in CONFIG {
            shared.bus.write_register(address, value)?;
        }

        // The table leaves OPMODE in standby
        shared.mode = RadioMode::Standby;
        shared.wait_mode_ready(self.limits.mode_ready_polls)?;

        info!(
            target: "setup",
            region = self.table.region,
            channels = self.table.len(),
            "transceiver configured for ISS reception"
        );
        Ok(())
    }

    /// Tune to `index` and start receiving. Out-of-range indices wrap to 0.
    pub fn set_channel(&self, index: usize) -> RadioResult<()> {
        let mut shared = self.lock();
        self.tune(&mut shared, index)
    }

    /// Move to the next channel in the table
    pub fn hop(&self) -> RadioResult<()> {
        let mut shared = self.lock();
        let next = shared.channel + 1;
        self.tune(&mut shared, next)
    }

    fn tune(&self, shared: &mut RadioShared<B>, index: usize) -> RadioResult<()> {
        let channel = if index < self.table.len() { index } else { 0 };
        let [msb, mid, lsb] = self.table.get(channel).unwrap_or([0, 0, 0]);

        shared.channel = channel;
        shared.bus.write_register(REG_FRFMSB, msb)?;
        shared.bus.write_register(REG_FRFMID, mid)?;
        shared.bus.write_register(REG_FRFLSB, lsb)?;
        shared.receive_begin(&self.limits)?;

        trace!(target: "rfm", channel, "tuned");
        Ok(())
    }

    /// Payload-ready interrupt service. Returns whether a packet was captured.
    pub fn handle_interrupt(&self) -> RadioResult<bool> {
        let mut shared = self.lock();

        // Read while the carrier is most likely still present
        let rssi = shared.read_rssi()?;
        shared.rssi = rssi;

        if shared.mode != RadioMode::Rx {
            return Ok(false);
        }
        if shared.bus.read_register(REG_IRQFLAGS2)? & RF_IRQFLAGS2_PAYLOADREADY == 0 {
            return Ok(false);
        }

        shared.set_mode(RadioMode::Standby, &self.limits)?;

        let mut raw = [0u8; PACKET_LEN];
        shared.bus.read_burst(REG_FIFO, &mut raw)?;
        for byte in raw.iter_mut() {
            // ISS sends LSB first
            *byte = byte.reverse_bits();
        }

        shared.packet = PacketBuffer::new(raw);
        shared.packet_received = true;
        shared.crc_error = false;

        debug!(
            target: "rfm",
            channel = shared.channel,
            rssi = shared.rssi,
            packet = %shared.packet,
            "packet captured"
        );
        Ok(true)
    }

    /// True once a packet has been captured since the last tune
    pub fn receive_done(&self) -> bool {
        self.lock().packet_received
    }

    /// The captured packet with its reception metadata, if any
    pub fn captured(&self) -> Option<CapturedPacket> {
        let shared = self.lock();
        shared.packet_received.then(|| CapturedPacket {
            payload: shared.packet,
            rssi: shared.rssi,
            channel: shared.channel,
        })
    }

    pub fn crc_error(&self) -> bool {
        self.lock().crc_error
    }

    pub fn mark_crc_error(&self) {
        self.lock().crc_error = true;
    }

    /// Byte `index` of the last packet, or 0xFF outside it
    pub fn data(&self, index: usize) -> u8 {
        self.lock().packet.get(index)
    }

    pub fn packet(&self) -> PacketBuffer {
        self.lock().packet
    }

    /// Checksum of the last packet as computed locally
    pub fn crc16(&self) -> u16 {
        crc::compute(self.lock().packet.as_bytes())
    }

    /// RSSI in dBm sampled at the last interrupt
    pub fn rssi(&self) -> i16 {
        self.lock().rssi
    }

    pub fn channel(&self) -> usize {
        self.lock().channel
    }

    pub fn mode(&self) -> RadioMode {
        self.lock().mode
    }

    pub fn channel_table(&self) -> &'static ChannelTable {
        self.table
    }

    /// Request an operating mode
    pub fn set_mode(&self, mode: RadioMode) -> RadioResult<()> {
        self.lock().set_mode(mode, &self.limits)
    }

    /// Stop receiving and drop any captured packet
    pub fn standby(&self) -> RadioResult<()> {
        let mut shared = self.lock();
        shared.set_mode(RadioMode::Standby, &self.limits)?;
        shared.packet_received = false;
        Ok(())
    }

    pub fn sleep(&self) -> RadioResult<()> {
        self.lock().set_mode(RadioMode::Sleep, &self.limits)
    }

    /// Read the on-chip temperature sensor. Leaves the chip in standby.
    ///
    /// `calibration` is added to the inverted raw reading; a rising value
    /// means rising temperature.
    pub fn read_temperature(&self, calibration: u8) -> RadioResult<u8> {
        let mut shared = self.lock();
        shared.set_mode(RadioMode::Standby, &self.limits)?;
        shared.bus.write_register(REG_TEMP1, RF_TEMP1_MEAS_START)?;
        shared.wait_for(
            REG_TEMP1,
            RF_TEMP1_MEAS_RUNNING,
            false,
            self.limits.temperature_polls,
            "temperature measurement",
        )?;

        let raw = shared.bus.read_register(REG_TEMP2)?;
        Ok((!raw).wrapping_add(calibration))
    }

    /// Calibrate the internal RC oscillator
    pub fn rc_calibration(&self) -> RadioResult<()> {
        let mut shared = self.lock();
        shared.bus.write_register(REG_OSC1, RF_OSC1_RCCAL_START)?;
        shared.wait_for(
            REG_OSC1,
            RF_OSC1_RCCAL_DONE,
            true,
            self.limits.calibration_polls,
            "RC calibration",
        )?;
        debug!(target: "setup", "RC oscillator calibrated");
        Ok(())
    }

    /// Dump registers 0x01..=0x4F for diagnostics
    pub fn read_all_registers(&self) -> RadioResult<Vec<(u8, u8)>> {
        let mut shared = self.lock();
        let mut dump = Vec::with_capacity(REG_LAST_DUMPED as usize);

        for address in 0x01..=REG_LAST_DUMPED {
            let value = shared.bus.read_register(address)?;
            trace!(target: "rfm", "{:02X} - {:02X} - {:08b}", address, value, value);
            dump.push((address, value));
        }

        if dump.iter().all(|&(_, value)| value == 0x00) {
            warn!(target: "rfm", "register dump is all zeros, is the chip connected?");
        }
        Ok(dump)
    }
}
