//! ISS payload decoding
//!
//! Every packet carries wind speed, wind direction and the battery flag in
//! bytes 0-2. Bytes 3-4 hold one sensor reading whose meaning depends on the
//! message type in the high nibble of byte 0.

use crate::core::{PacketBuffer, DATA_UNAVAILABLE, MPH_TO_KMH, RAIN_CUP_MM};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Rain counter in type 0xE packets is 7 bits wide
const RAIN_COUNTER_MODULO: u16 = 128;

/// ISS message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    GoldcapVoltage,
    /// Sent by the ISS but carries nothing known
    Reserved,
    RainRate,
    SolarRadiation,
    OutsideTemperature,
    GustSpeed,
    OutsideHumidity,
    RainClicks,
    Unknown(u8),
}

impl MessageType {
    pub fn from_id(id: u8) -> Self {
        match id {
            0x2 => MessageType::GoldcapVoltage,
            0x3 => MessageType::Reserved,
            0x5 => MessageType::RainRate,
            0x7 => MessageType::SolarRadiation,
            0x8 => MessageType::OutsideTemperature,
            0x9 => MessageType::GustSpeed,
            0xA => MessageType::OutsideHumidity,
            0xE => MessageType::RainClicks,
            other => MessageType::Unknown(other),
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            MessageType::GoldcapVoltage => 0x2,
            MessageType::Reserved => 0x3,
            MessageType::RainRate => 0x5,
            MessageType::SolarRadiation => 0x7,
            MessageType::OutsideTemperature => 0x8,
            MessageType::GustSpeed => 0x9,
            MessageType::OutsideHumidity => 0xA,
            MessageType::RainClicks => 0xE,
            MessageType::Unknown(id) => *id,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:X})", self, self.id())
    }
}

/// The type-specific value of a packet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reading {
    /// Volts
    GoldcapVoltage(f32),
    /// mm/h
    RainRate(f32),
    SolarRadiation(f32),
    /// Degrees Celsius
    OutsideTemperature(f32),
    /// km/h
    GustSpeed(f32),
    /// %RH
    OutsideHumidity(f32),
    /// Raw 7-bit counter and the clicks added since the previous packet
    RainClicks { count: u8, diff: u16 },
}

/// Everything extracted from one packet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodedPacket {
    pub message_type: MessageType,
    /// km/h
    pub wind_speed: f32,
    /// Degrees, 180 = south
    pub wind_direction: u16,
    pub battery_low: bool,
    pub reading: Option<Reading>,
}

/// Last known value of every measurement. `None` until first received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub wind_speed: Option<f32>,
    pub wind_direction: Option<u16>,
    pub battery_low: Option<bool>,
    pub goldcap_voltage: Option<f32>,
    pub rain_rate: Option<f32>,
    pub solar_radiation: Option<f32>,
    pub outside_temperature: Option<f32>,
    pub gust_speed: Option<f32>,
    pub outside_humidity: Option<f32>,
    pub rain_clicks: Option<u8>,
    /// Clicks since the last `new_day`
    pub rain_clicks_day: u64,
    /// Clicks since start-up or the last `set_rain_total`
    pub rain_clicks_total: u64,
}

impl Measurements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the fields carried by `packet`
    pub fn apply(&mut self, packet: &DecodedPacket) {
        self.wind_speed = Some(packet.wind_speed);
        self.wind_direction = Some(packet.wind_direction);
        self.battery_low = Some(packet.battery_low);

        match packet.reading {
            Some(Reading::GoldcapVoltage(v)) => self.goldcap_voltage = Some(v),
            Some(Reading::RainRate(v)) => self.rain_rate = Some(v),
            Some(Reading::SolarRadiation(v)) => self.solar_radiation = Some(v),
            Some(Reading::OutsideTemperature(v)) => self.outside_temperature = Some(v),
            Some(Reading::GustSpeed(v)) => self.gust_speed = Some(v),
            Some(Reading::OutsideHumidity(v)) => self.outside_humidity = Some(v),
            Some(Reading::RainClicks { count, diff }) => {
                self.rain_clicks = Some(count);
                self.rain_clicks_day += u64::from(diff);
                self.rain_clicks_total += u64::from(diff);
            }
            None => {}
        }
    }

    /// Reset the daily rain counter
    pub fn new_day(&mut self) {
        self.rain_clicks_day = 0;
    }

    /// Overwrite the lifetime rain counter
    pub fn set_rain_total(&mut self, clicks: u64) {
        self.rain_clicks_total = clicks;
    }

    pub fn rain_day_mm(&self) -> f32 {
        self.rain_clicks_day as f32 * RAIN_CUP_MM
    }

    pub fn rain_total_mm(&self) -> f32 {
        self.rain_clicks_total as f32 * RAIN_CUP_MM
    }
}

/// Stateful decoder; remembers the last rain counter across packets
#[derive(Debug, Default)]
pub struct PayloadDecoder {
    rain_clicks_last: Option<u8>,
}

impl PayloadDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a packet that already passed the CRC check
    pub fn decode(&mut self, packet: &PacketBuffer) -> DecodedPacket {
        let wind_speed = packet.get(1) as f32 * MPH_TO_KMH;
        let wind_direction = wind_direction(packet.get(2));
        let battery_low = packet.get(0) & 0x08 != 0;
        let message_type = MessageType::from_id(packet.message_type());

        let (d3, d4) = (packet.get(3), packet.get(4));
        let reading = match message_type {
            MessageType::GoldcapVoltage => Some(Reading::GoldcapVoltage(goldcap_voltage(d3, d4))),
            MessageType::RainRate => rain_rate(d3, d4).map(Reading::RainRate),
            MessageType::SolarRadiation => Some(Reading::SolarRadiation(solar_radiation(d3, d4))),
            MessageType::OutsideTemperature => {
                Some(Reading::OutsideTemperature(outside_temperature(d3, d4)))
            }
            MessageType::GustSpeed => Some(Reading::GustSpeed(d3 as f32 * MPH_TO_KMH)),
            MessageType::OutsideHumidity => Some(Reading::OutsideHumidity(outside_humidity(d3, d4))),
            MessageType::RainClicks => Some(self.rain_clicks(d3)),
            MessageType::Reserved | MessageType::Unknown(_) => None,
        };

        debug!(
            target: "iss",
            %message_type,
            wind_speed,
            wind_direction,
            battery_low,
            ?reading,
            "decoded"
        );

        DecodedPacket {
            message_type,
            wind_speed,
            wind_direction,
            battery_low,
            reading,
        }
    }

    /// Forget the previous rain counter; the next type 0xE packet reseeds it
    pub fn reset(&mut self) {
        self.rain_clicks_last = None;
    }

    fn rain_clicks(&mut self, d3: u8) -> Reading {
        let count = d3 & 0x7F;
        let last = self.rain_clicks_last.unwrap_or(count);
        let diff = if count >= last {
            u16::from(count - last)
        } else {
            u16::from(count) + RAIN_COUNTER_MODULO - u16::from(last)
        };
        self.rain_clicks_last = Some(count);
        Reading::RainClicks { count, diff }
    }
}

/// Vane reading rotated so that 180 degrees is south
fn wind_direction(raw: u8) -> u16 {
    let degrees = (raw as f32 * 360.0 / 255.0) as u16;
    if degrees >= 180 {
        degrees - 180
    } else {
        degrees + 180
    }
}

fn goldcap_voltage(d3: u8, d4: u8) -> f32 {
    (((d3 as u16) << 2) + ((d4 as u16 & 0xC0) >> 6)) as f32 / 100.0
}

/// Rain rate in mm/h; `None` when the raw interval is zero
fn rain_rate(d3: u8, d4: u8) -> Option<f32> {
    if d3 == DATA_UNAVAILABLE {
        // no rain
        return Some(0.0);
    }

    let raw = d3 as u16 + (d4 as u16 & 0x30) * 16;
    if raw == 0 {
        return None;
    }

    // Interval in 1/16 s when bit 6 is clear, whole seconds when set
    let clicks_per_hour = if d4 & 0x40 == 0 {
        57_600.0 / raw as f32
    } else {
        3_600.0 / raw as f32
    };
    Some(clicks_per_hour * RAIN_CUP_MM)
}

fn solar_radiation(d3: u8, d4: u8) -> f32 {
    (d3 as u16 * 4 + ((d4 as u16 & 0xC0) >> 6)) as f32
}

/// Degrees Celsius; the Fahrenheit value is truncated to whole degrees first
fn outside_temperature(d3: u8, d4: u8) -> f32 {
    let fahrenheit = (d3 as i32 * 256 + d4 as i32) / 160;
    (fahrenheit - 32) as f32 * 5.0 / 9.0
}

fn outside_humidity(d3: u8, d4: u8) -> f32 {
    ((((d4 >> 4) as u16) << 8) | d3 as u16) as f32 / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(bytes: [u8; 5]) -> PacketBuffer {
        PacketBuffer::new([bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], 0, 0, 0])
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_common_fields() {
        let mut decoder = PayloadDecoder::new();
        let decoded = decoder.decode(&packet([0x88, 10, 0, 40, 2]));

        assert!(approx(decoded.wind_speed, 16.0934));
        assert_eq!(decoded.wind_direction, 180);
        assert!(decoded.battery_low);
        assert_eq!(decoded.message_type, MessageType::OutsideTemperature);
    }

    #[test]
    fn test_wind_direction_rotation() {
        assert_eq!(wind_direction(0), 180);
        // 127 * 360 / 255 = 179.29 -> 179
        assert_eq!(wind_direction(127), 359);
        // 128 * 360 / 255 = 180.7 -> 180
        assert_eq!(wind_direction(128), 0);
        assert_eq!(wind_direction(255), 180);
    }

    #[test]
    fn test_outside_temperature() {
        let mut decoder = PayloadDecoder::new();
        let decoded = decoder.decode(&packet([0x80, 0, 0, 40, 2]));
        match decoded.reading {
            Some(Reading::OutsideTemperature(t)) => assert!(approx(t, 17.777_779)),
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_sub_zero_temperature() {
        // 0x0A00 / 160 = 16 F
        assert!(approx(outside_temperature(0x0A, 0x00), -8.888_889));
    }

    #[test]
    fn test_goldcap_voltage() {
        // (0x4D << 2) + 1 = 309
        assert!(approx(goldcap_voltage(0x4D, 0x40), 3.09));
    }

    #[test]
    fn test_rain_rate() {
        assert_eq!(rain_rate(0xFF, 0x00), Some(0.0));
        // high rate: 57600 / 64 * 0.2
        assert!(approx(rain_rate(64, 0x00).unwrap(), 180.0));
        // low rate: 3600 / 100 * 0.2
        assert!(approx(rain_rate(100, 0x40).unwrap(), 7.2));
        // bits 4-5 of d4 extend the interval: 10 + 0x30 * 16 = 778
        assert!(approx(rain_rate(10, 0x70).unwrap(), 3600.0 / 778.0 * 0.2));
        assert_eq!(rain_rate(0, 0x00), None);
    }

    #[test]
    fn test_solar_radiation_and_gust() {
        assert_eq!(solar_radiation(0x40, 0x80), 258.0);

        let mut decoder = PayloadDecoder::new();
        let decoded = decoder.decode(&packet([0x90, 0, 0, 12, 0]));
        assert_eq!(decoded.reading, Some(Reading::GustSpeed(12.0 * MPH_TO_KMH)));
    }

    #[test]
    fn test_outside_humidity() {
        // ((0x2 << 8) | 0x8E) / 10 = 65.4
        assert!(approx(outside_humidity(0x8E, 0x20), 65.4));
    }

    #[test]
    fn test_rain_counter_first_packet_seeds() {
        let mut decoder = PayloadDecoder::new();
        let decoded = decoder.decode(&packet([0xE0, 0, 0, 0x80 | 42, 0]));
        assert_eq!(decoded.reading, Some(Reading::RainClicks { count: 42, diff: 0 }));
    }

    #[test]
    fn test_rain_counter_wraps() {
        let mut decoder = PayloadDecoder::new();
        decoder.decode(&packet([0xE0, 0, 0, 120, 0]));
        let decoded = decoder.decode(&packet([0xE0, 0, 0, 10, 0]));
        assert_eq!(decoded.reading, Some(Reading::RainClicks { count: 10, diff: 18 }));

        let decoded = decoder.decode(&packet([0xE0, 0, 0, 120, 0]));
        assert_eq!(decoded.reading, Some(Reading::RainClicks { count: 120, diff: 110 }));
    }

    #[test]
    fn test_reserved_and_unknown_types() {
        let mut decoder = PayloadDecoder::new();
        let decoded = decoder.decode(&packet([0x30, 5, 0, 1, 2]));
        assert_eq!(decoded.message_type, MessageType::Reserved);
        assert_eq!(decoded.reading, None);

        let decoded = decoder.decode(&packet([0x40, 5, 0, 1, 2]));
        assert_eq!(decoded.message_type, MessageType::Unknown(0x4));
        assert_eq!(decoded.reading, None);
    }

    #[test]
    fn test_measurements_apply_only_touches_carried_field() {
        let mut decoder = PayloadDecoder::new();
        let mut measurements = Measurements::new();
        measurements.apply(&decoder.decode(&packet([0x80, 0, 0, 40, 2])));

        assert!(measurements.outside_temperature.is_some());
        assert_eq!(measurements.rain_rate, None);
        assert_eq!(measurements.outside_humidity, None);
        assert_eq!(measurements.battery_low, Some(false));
    }

    #[test]
    fn test_rain_totals_and_commands() {
        let mut decoder = PayloadDecoder::new();
        let mut measurements = Measurements::new();
        for count in [10u8, 12, 15] {
            measurements.apply(&decoder.decode(&packet([0xE0, 0, 0, count, 0])));
        }
        assert_eq!(measurements.rain_clicks, Some(15));
        assert_eq!(measurements.rain_clicks_day, 5);
        assert_eq!(measurements.rain_clicks_total, 5);
        assert!(approx(measurements.rain_day_mm(), 1.0));

        measurements.new_day();
        measurements.set_rain_total(1000);
        measurements.apply(&decoder.decode(&packet([0xE0, 0, 0, 16, 0])));
        assert_eq!(measurements.rain_clicks_day, 1);
        assert_eq!(measurements.rain_clicks_total, 1001);
    }

    #[test]
    fn test_decoder_reset_reseeds_rain_counter() {
        let mut decoder = PayloadDecoder::new();
        decoder.decode(&packet([0xE0, 0, 0, 10, 0]));
        decoder.reset();
        let decoded = decoder.decode(&packet([0xE0, 0, 0, 50, 0]));
        assert_eq!(decoded.reading, Some(Reading::RainClicks { count: 50, diff: 0 }));
    }
}
