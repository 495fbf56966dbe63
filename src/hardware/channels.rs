//! Frequency hop tables used by the ISS
//!
//! Each entry is the (MSB, MID, LSB) triple written to RegFrf. The ISS walks
//! through its regional table in order, one channel per burst.

/// A regional hop table
#[derive(Debug, PartialEq, Eq)]
pub struct ChannelTable {
    pub region: &'static str,
    pub frequencies: &'static [[u8; 3]],
}

impl ChannelTable {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Frequency word of `index`, if it exists
    pub fn get(&self, index: usize) -> Option<[u8; 3]> {
        self.frequencies.get(index).copied()
    }

    /// Index following `index`, wrapping at the end of the table
    pub fn next(&self, index: usize) -> usize {
        if index + 1 >= self.len() {
            0
        } else {
            index + 1
        }
    }

    /// Carrier frequency of `index` in Hz (FSTEP = 32 MHz / 2^19)
    pub fn frequency_hz(&self, index: usize) -> Option<f64> {
        self.get(index).map(|[msb, mid, lsb]| {
            let frf = ((msb as u32) << 16) | ((mid as u32) << 8) | lsb as u32;
            frf as f64 * (32_000_000.0 / 524_288.0)
        })
    }

    /// The table selected at build time
    pub fn compiled() -> &'static ChannelTable {
        #[cfg(feature = "freqs-us")]
        {
            &US_CHANNELS
        }
        #[cfg(not(feature = "freqs-us"))]
        {
            &EU_CHANNELS
        }
    }
}

/// Europe, 868 MHz band
#[cfg(any(test, not(feature = "freqs-us")))]
pub static EU_CHANNELS: ChannelTable = ChannelTable {
    region: "EU",
    frequencies: &[
        [0xD9, 0x04, 0x45],
        [0xD9, 0x13, 0x04],
        [0xD9, 0x21, 0xC2],
        [0xD9, 0x0B, 0xA4],
        [0xD9, 0x1A, 0x63],
    ],
};

/// North America, 915 MHz band
#[cfg(any(test, feature = "freqs-us"))]
pub static US_CHANNELS: ChannelTable = ChannelTable {
    region: "US",
    frequencies: &[
        [0xE3, 0xDA, 0x7C],
        [0xE1, 0x98, 0x71],
        [0xE3, 0xFA, 0x92],
        [0xE6, 0xBD, 0x01],
        [0xE4, 0xBB, 0x4D],
        [0xE2, 0x99, 0x56],
        [0xE7, 0x7D, 0xBC],
        [0xE5, 0x9C, 0x0E],
        [0xE3, 0x39, 0xE6],
        [0xE6, 0x1C, 0x81],
        [0xE4, 0x5A, 0xE8],
        [0xE1, 0xF8, 0xD6],
        [0xE5, 0x3B, 0xBF],
        [0xE7, 0x1D, 0x5F],
        [0xE3, 0x9A, 0x3C],
        [0xE2, 0x39, 0x00],
        [0xE4, 0xFB, 0x77],
        [0xE6, 0x5C, 0xB2],
        [0xE2, 0xD9, 0x90],
        [0xE7, 0xBD, 0xEE],
        [0xE4, 0x3A, 0xD2],
        [0xE1, 0xD8, 0xAA],
        [0xE5, 0x5B, 0xCD],
        [0xE6, 0xDD, 0x34],
        [0xE3, 0x5A, 0x0A],
        [0xE7, 0x9D, 0xD9],
        [0xE2, 0x79, 0x41],
        [0xE4, 0x9B, 0x28],
        [0xE5, 0xDC, 0x40],
        [0xE7, 0x3D, 0x74],
        [0xE1, 0xB8, 0x9C],
        [0xE3, 0xBA, 0x60],
        [0xE6, 0x7C, 0xC8],
        [0xE4, 0xDB, 0x62],
        [0xE2, 0xB9, 0x7A],
        [0xE5, 0x7B, 0xE2],
        [0xE7, 0xDE, 0x12],
        [0xE6, 0x3C, 0x9D],
        [0xE3, 0x19, 0xC9],
        [0xE4, 0x1A, 0xB6],
        [0xE5, 0xBC, 0x2B],
        [0xE2, 0x18, 0xEB],
        [0xE6, 0xFD, 0x42],
        [0xE5, 0x1B, 0xA3],
        [0xE3, 0x7A, 0x2E],
        [0xE5, 0xFC, 0x64],
        [0xE2, 0x59, 0x16],
        [0xE6, 0x9C, 0xEC],
        [0xE2, 0xF9, 0xAC],
        [0xE4, 0x7B, 0x0C],
        [0xE7, 0x5D, 0x98],
    ],
};
