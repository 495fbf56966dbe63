//! Common API types and data structures

use crate::core::PacketBuffer;
use crate::processing::{DecodedPacket, MessageType};
use crate::radio::RadioError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for receiver operations
pub type ReceiverResult<T> = Result<T, ReceiverError>;

/// Receiver error types
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverError {
    /// `initialize` has not completed
    NotInitialized,
    /// Radio driver failure
    Radio { error: RadioError },
    /// Invalid configuration
    ConfigurationError { parameter: String, value: String },
}

impl fmt::Display for ReceiverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverError::NotInitialized => write!(f, "Receiver not initialized"),
            ReceiverError::Radio { error } => write!(f, "Radio error: {}", error),
            ReceiverError::ConfigurationError { parameter, value } => {
                write!(f, "Invalid configuration {} = {}", parameter, value)
            }
        }
    }
}

impl std::error::Error for ReceiverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReceiverError::Radio { error } => Some(error),
            _ => None,
        }
    }
}

impl From<RadioError> for ReceiverError {
    fn from(error: RadioError) -> Self {
        ReceiverError::Radio { error }
    }
}

impl ReceiverError {
    /// Errors after which the receiver cannot continue
    pub fn is_fatal(&self) -> bool {
        match self {
            ReceiverError::Radio { error } => error.is_fatal(),
            ReceiverError::ConfigurationError { .. } => true,
            ReceiverError::NotInitialized => false,
        }
    }
}

/// One received packet as handed to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketReport {
    pub timestamp_ms: u64,
    pub channel: usize,
    /// dBm
    pub rssi: i16,
    pub payload: PacketBuffer,
    pub message_type: MessageType,
    pub decoded: DecodedPacket,
}

impl fmt::Display for PacketReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ch:{} Data:{} RSSI:{} Type:{}",
            self.channel, self.payload, self.rssi, self.message_type
        )
    }
}

/// Commands accepted from the outside world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Zero the reception statistics
    ResetStatistics,
    /// Start a new rain day
    NewDay,
    /// Overwrite the lifetime rain click counter
    SetRainTotal(u64),
}
