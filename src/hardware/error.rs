//! Bus error types and handling

use std::fmt;

/// Errors raised by a register interface
#[derive(Debug, Clone, PartialEq)]
pub enum BusError {
    /// The underlying SPI transfer failed
    Transfer { kind: String },
    /// Nothing answers on the bus (chip missing, unpowered or miswired)
    Disconnected,
    /// Burst length does not fit the transfer buffer
    BufferError { requested: usize, limit: usize },
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Transfer { kind } => {
                write!(f, "SPI transfer failed: {}", kind)
            }
            BusError::Disconnected => {
                write!(f, "Transceiver not responding on the bus")
            }
            BusError::BufferError { requested, limit } => {
                write!(f, "Burst of {} bytes exceeds limit of {}", requested, limit)
            }
        }
    }
}

impl std::error::Error for BusError {}

/// Result type for register operations
pub type BusResult<T> = Result<T, BusError>;

/// Recovery strategy for bus failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryStrategy {
    /// Retry the transaction on the next loop iteration
    Retry,
    /// Re-run the initialization sequence
    Reinitialize,
    /// Give up; the hardware needs attention
    Fail,
}

impl BusError {
    /// Get the recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            BusError::Transfer { .. } => RecoveryStrategy::Retry,
            BusError::Disconnected => RecoveryStrategy::Reinitialize,
            BusError::BufferError { .. } => RecoveryStrategy::Fail,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_strategy(), RecoveryStrategy::Fail)
    }
}
