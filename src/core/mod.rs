//! Core types and constants for the ISS receiver

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
