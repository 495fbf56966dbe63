//! Receiver control loop and the types it hands to consumers

pub mod receiver;
pub mod types;

pub use receiver::IssReceiver;
pub use types::{Command, PacketReport, ReceiverError, ReceiverResult};
