//! Packet processing: integrity check, decoding and hop scheduling

pub mod crc;
pub mod decoder;
pub mod scheduler;

pub use decoder::{DecodedPacket, Measurements, MessageType, PayloadDecoder, Reading};
pub use scheduler::{
    ChannelHopper, HopKind, HopScheduler, HopTiming, ReceiverStatus, StatisticsSnapshot,
};
