//! Hardware abstraction layer for the RFM69 transceiver
//!
//! This module provides the register-level bus abstraction, the SX1231
//! register map, the ISS hop tables and a simulated chip for development.

pub mod transceiver;
pub mod registers;
pub mod channels;
pub mod spi;
pub mod mock;
pub mod error;

pub use transceiver::{RegisterInterface, BusConfig};
pub use channels::ChannelTable;
#[cfg(any(test, not(feature = "freqs-us")))]
pub use channels::EU_CHANNELS;
#[cfg(any(test, feature = "freqs-us"))]
pub use channels::US_CHANNELS;
pub use spi::SpiRegisterInterface;
pub use mock::{MockRfm69, SimulatedTransmitter};
pub use error::{BusError, BusResult, RecoveryStrategy};
