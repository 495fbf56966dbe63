//! Protocol constants and transmitter timing

/// The ISS always sends eight bytes, the trailing two being the CRC
pub const PACKET_LEN: usize = 8;

/// Number of leading payload bytes covered by the CRC
pub const CRC_COVERED_LEN: usize = 6;

/// Returned by data accessors for an index outside the packet
pub const DATA_UNAVAILABLE: u8 = 0xFF;

/// Transmitter burst period (ms)
pub const PACKET_INTERVAL_MS: u64 = 2500;

/// Slack added to each retry deadline for clock drift (ms)
pub const PACKET_OFFSET_MS: u64 = 500;

/// Hop cadence once the tiered retry window is exhausted (ms)
pub const PACKET_LONGHOP_MS: u64 = 20_000;

/// Missed bursts tolerated before falling back to the long-hop cadence
pub const MAX_MISSED_PACKETS: u8 = 25;

/// Raw wind/gust units to km/h
pub const MPH_TO_KMH: f32 = 1.60934;

/// Rain collector cup size (mm per click)
pub const RAIN_CUP_MM: f32 = 0.2;
