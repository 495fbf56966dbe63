//! RFM69 / SX1231 register map
//!
//! Only the registers and bit fields the ISS receiver touches are listed.
//! Values follow the SX1231 datasheet.

// =============================================================================
// Register addresses
// =============================================================================

pub const REG_FIFO: u8 = 0x00;
pub const REG_OPMODE: u8 = 0x01;
pub const REG_DATAMODUL: u8 = 0x02;
pub const REG_BITRATEMSB: u8 = 0x03;
pub const REG_BITRATELSB: u8 = 0x04;
pub const REG_FDEVMSB: u8 = 0x05;
pub const REG_FDEVLSB: u8 = 0x06;
pub const REG_FRFMSB: u8 = 0x07;
pub const REG_FRFMID: u8 = 0x08;
pub const REG_FRFLSB: u8 = 0x09;
pub const REG_OSC1: u8 = 0x0A;
pub const REG_AFCCTRL: u8 = 0x0B;
pub const REG_VERSION: u8 = 0x10;
pub const REG_LNA: u8 = 0x18;
pub const REG_RXBW: u8 = 0x19;
pub const REG_AFCBW: u8 = 0x1A;
pub const REG_AFCFEI: u8 = 0x1E;
pub const REG_RSSIVALUE: u8 = 0x24;
pub const REG_DIOMAPPING1: u8 = 0x25;
pub const REG_IRQFLAGS1: u8 = 0x27;
pub const REG_IRQFLAGS2: u8 = 0x28;
pub const REG_RSSITHRESH: u8 = 0x29;
pub const REG_PREAMBLELSB: u8 = 0x2D;
pub const REG_SYNCCONFIG: u8 = 0x2E;
pub const REG_SYNCVALUE1: u8 = 0x2F;
pub const REG_SYNCVALUE2: u8 = 0x30;
pub const REG_PACKETCONFIG1: u8 = 0x37;
pub const REG_PAYLOADLENGTH: u8 = 0x38;
pub const REG_FIFOTHRESH: u8 = 0x3C;
pub const REG_PACKETCONFIG2: u8 = 0x3D;
pub const REG_TEMP1: u8 = 0x4E;
pub const REG_TEMP2: u8 = 0x4F;
pub const REG_TESTDAGC: u8 = 0x6F;
pub const REG_TESTAFC: u8 = 0x71;

/// Last register included in a diagnostic dump
pub const REG_LAST_DUMPED: u8 = 0x4F;

// =============================================================================
// Serial protocol
// =============================================================================

/// Address bit set for a write access
pub const SPI_WRITE_FLAG: u8 = 0x80;

/// Mask applied to the address for a read access
pub const SPI_READ_MASK: u8 = 0x7F;

// =============================================================================
// RegOpMode
// =============================================================================

pub const RF_OPMODE_SEQUENCER_ON: u8 = 0x00;
pub const RF_OPMODE_LISTEN_OFF: u8 = 0x00;
pub const RF_OPMODE_SLEEP: u8 = 0x00;
pub const RF_OPMODE_STANDBY: u8 = 0x04;
pub const RF_OPMODE_SYNTHESIZER: u8 = 0x08;
pub const RF_OPMODE_TRANSMITTER: u8 = 0x0C;
pub const RF_OPMODE_RECEIVER: u8 = 0x10;

/// Bits of RegOpMode that are preserved when switching mode
pub const RF_OPMODE_KEEP_MASK: u8 = 0xE3;

// =============================================================================
// Modulation
// =============================================================================

pub const RF_DATAMODUL_DATAMODE_PACKET: u8 = 0x00;
pub const RF_DATAMODUL_MODULATIONTYPE_FSK: u8 = 0x00;
/// Gaussian filter, BT = 0.5
pub const RF_DATAMODUL_MODULATIONSHAPING_10: u8 = 0x02;

pub const RF_BITRATEMSB_19200: u8 = 0x06;
pub const RF_BITRATELSB_19200: u8 = 0x83;

pub const RF_FDEVMSB_4800: u8 = 0x00;
pub const RF_FDEVLSB_4800: u8 = 0x4E;

pub const RF_AFCLOWBETA_OFF: u8 = 0x00;

pub const RF_LNA_ZIN_50: u8 = 0x00;
pub const RF_LNA_GAINSELECT_AUTO: u8 = 0x00;

pub const RF_RXBW_DCCFREQ_010: u8 = 0x40;
pub const RF_RXBW_MANT_20: u8 = 0x08;
pub const RF_RXBW_EXP_3: u8 = 0x03;
pub const RF_RXBW_EXP_4: u8 = 0x04;

pub const RF_AFCFEI_AFCAUTOCLEAR_ON: u8 = 0x08;
pub const RF_AFCFEI_AFCAUTO_ON: u8 = 0x04;

// =============================================================================
// Interrupts and DIO mapping
// =============================================================================

/// DIO0 signals PayloadReady while in RX
pub const RF_DIOMAPPING1_DIO0_01: u8 = 0x40;

pub const RF_IRQFLAGS1_MODEREADY: u8 = 0x80;

pub const RF_IRQFLAGS2_FIFOOVERRUN: u8 = 0x10;
pub const RF_IRQFLAGS2_PAYLOADREADY: u8 = 0x04;

// =============================================================================
// Packet engine
// =============================================================================

pub const RF_RSSITHRESH_VALUE: u8 = 0xA0;

pub const RF_SYNC_ON: u8 = 0x80;
pub const RF_SYNC_FIFOFILL_AUTO: u8 = 0x00;
pub const RF_SYNC_SIZE_2: u8 = 0x08;
pub const RF_SYNC_TOL_2: u8 = 0x02;

/// First sync byte sent by the ISS after its 0xAA preamble
pub const ISS_SYNC_BYTE_1: u8 = 0xCB;
/// Second sync byte sent by the ISS
pub const ISS_SYNC_BYTE_2: u8 = 0x89;

/// ISS preamble length in bytes
pub const ISS_PREAMBLE_LEN: u8 = 4;

pub const RF_PACKET1_FORMAT_FIXED: u8 = 0x00;
pub const RF_PACKET1_DCFREE_OFF: u8 = 0x00;
pub const RF_PACKET1_CRC_OFF: u8 = 0x00;
pub const RF_PACKET1_CRCAUTOCLEAR_OFF: u8 = 0x08;
pub const RF_PACKET1_ADRSFILTERING_OFF: u8 = 0x00;

pub const RF_FIFOTHRESH_TXSTART_FIFOTHRESH: u8 = 0x00;

pub const RF_PACKET2_RXRESTARTDELAY_2BITS: u8 = 0x10;
pub const RF_PACKET2_AUTORXRESTART_ON: u8 = 0x02;
pub const RF_PACKET2_AES_OFF: u8 = 0x00;
pub const RF_PACKET2_RXRESTART: u8 = 0x04;

/// Clears the RxRestart bit before setting it again
pub const RF_PACKET2_RXRESTART_CLEAR_MASK: u8 = 0xFB;

pub const RF_DAGC_IMPROVED_LOWBETA0: u8 = 0x30;

// =============================================================================
// Temperature sensor and RC oscillator
// =============================================================================

pub const RF_TEMP1_MEAS_START: u8 = 0x08;
pub const RF_TEMP1_MEAS_RUNNING: u8 = 0x04;

pub const RF_OSC1_RCCAL_START: u8 = 0x80;
pub const RF_OSC1_RCCAL_DONE: u8 = 0x40;
