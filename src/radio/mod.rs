//! RFM69 radio driver
//!
//! Configures the chip for the ISS modulation, runs the operating-mode state
//! machine and captures packets from the payload-ready interrupt.

pub mod driver;
pub mod interrupt;

pub use driver::{RadioDriver, SpinLimits};
pub use interrupt::{spawn_interrupt_handler, Edge, InterruptHandle};

use crate::core::RadioMode;
use crate::hardware::{BusError, RecoveryStrategy};
use std::fmt;

/// Errors raised by the radio driver
#[derive(Debug, Clone, PartialEq)]
pub enum RadioError {
    /// The chip did not echo a test pattern written to SyncValue1
    HandshakeFailed { pattern: u8, attempts: u32 },
    /// A status flag never came up within its spin limit
    Timeout { what: &'static str },
    /// The receiver never transmits or parks the synthesizer
    UnsupportedMode { mode: RadioMode },
    /// Register access failed
    Bus(BusError),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioError::HandshakeFailed { pattern, attempts } => {
                write!(
                    f,
                    "Transceiver handshake failed: pattern 0x{:02X} not read back after {} attempts",
                    pattern, attempts
                )
            }
            RadioError::Timeout { what } => {
                write!(f, "Timed out waiting for {}", what)
            }
            RadioError::UnsupportedMode { mode } => {
                write!(f, "Mode {:?} is not supported by the receiver", mode)
            }
            RadioError::Bus(err) => write!(f, "Bus error: {}", err),
        }
    }
}

impl std::error::Error for RadioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RadioError::Bus(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BusError> for RadioError {
    fn from(err: BusError) -> Self {
        RadioError::Bus(err)
    }
}

impl RadioError {
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            RadioError::HandshakeFailed { .. } => RecoveryStrategy::Fail,
            RadioError::Timeout { .. } => RecoveryStrategy::Reinitialize,
            RadioError::UnsupportedMode { .. } => RecoveryStrategy::Fail,
            RadioError::Bus(err) => err.recovery_strategy(),
        }
    }

    /// Handshake failure means no chip; nothing else can proceed
    pub fn is_fatal(&self) -> bool {
        matches!(self, RadioError::HandshakeFailed { .. })
    }
}

/// Result type for radio operations
pub type RadioResult<T> = Result<T, RadioError>;
