//! Davis ISS Weather Receiver
//!
//! Receives the frequency-hopped telemetry of a Davis Integrated Sensor Suite
//! with an RFM69 transceiver and decodes it into weather measurements.

pub mod core;
pub mod hardware;
pub mod radio;
pub mod processing;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use crate::core::{CapturedPacket, PacketBuffer, RadioMode, ReceptionEvent, PACKET_LEN};
pub use crate::hardware::{
    BusConfig, BusError, BusResult, ChannelTable, MockRfm69, RegisterInterface,
    SimulatedTransmitter, SpiRegisterInterface,
};
pub use crate::radio::{spawn_interrupt_handler, InterruptHandle, RadioDriver, RadioError, RadioResult};
pub use crate::processing::{
    DecodedPacket, HopScheduler, HopTiming, Measurements, MessageType, PayloadDecoder, Reading,
    ReceiverStatus, StatisticsSnapshot,
};
pub use crate::utils::{ConfigError, ConfigurationManager, ReceiverConfig};
pub use crate::api::{Command, IssReceiver, PacketReport, ReceiverError, ReceiverResult};
