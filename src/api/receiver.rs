//! Control loop tying the radio, scheduler and decoder together
//!
//! `poll` is called as often as the host likes; it never blocks waiting for
//! a packet. Timestamps are supplied by the caller so the loop runs equally
//! well on a wall clock or in simulated time.

use crate::api::types::{Command, PacketReport, ReceiverError, ReceiverResult};
use crate::core::{CapturedPacket, ReceptionEvent};
use crate::hardware::RegisterInterface;
use crate::processing::{crc, HopScheduler, HopTiming, Measurements, PayloadDecoder, StatisticsSnapshot};
use crate::radio::RadioDriver;
use crate::utils::config::ReceiverConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// ISS receiver: owns the scheduler, decoder and last known measurements
pub struct IssReceiver<B> {
    radio: Arc<RadioDriver<B>>,
    scheduler: HopScheduler,
    decoder: PayloadDecoder,
    measurements: Measurements,
    last_report: Option<PacketReport>,
    initial_channel: usize,
    temperature_calibration: u8,
    initialized: bool,
}

impl<B: RegisterInterface> IssReceiver<B> {
    pub fn new(radio: Arc<RadioDriver<B>>, timing: HopTiming) -> Self {
        Self {
            radio,
            scheduler: HopScheduler::new(timing),
            decoder: PayloadDecoder::new(),
            measurements: Measurements::new(),
            last_report: None,
            initial_channel: 0,
            temperature_calibration: 0,
            initialized: false,
        }
    }

    /// Build from configuration, rejecting settings the radio cannot honor
    pub fn from_config(radio: Arc<RadioDriver<B>>, config: &ReceiverConfig) -> ReceiverResult<Self> {
        let channels = radio.channel_table().len();
        if config.initial_channel >= channels {
            return Err(ReceiverError::ConfigurationError {
                parameter: "initial_channel".to_string(),
                value: config.initial_channel.to_string(),
            });
        }
        if config.timing.packet_interval_ms == 0 || config.timing.max_missed_packets == 0 {
            return Err(ReceiverError::ConfigurationError {
                parameter: "timing".to_string(),
                value: format!("{:?}", config.timing),
            });
        }

        let mut receiver = Self::new(radio, config.timing);
        receiver.initial_channel = config.initial_channel;
        receiver.temperature_calibration = config.temperature_calibration;
        Ok(receiver)
    }

    /// Bring up the chip and start listening on the initial channel
    pub fn initialize(&mut self) -> ReceiverResult<()> {
        self.radio.initialize()?;
        self.radio.set_channel(self.initial_channel)?;
        self.initialized = true;

        info!(
            target: "setup",
            channel = self.radio.channel(),
            "receiver listening"
        );
        Ok(())
    }

    /// One control-loop iteration at `now_ms`
    pub fn poll(&mut self, now_ms: u64) -> ReceiverResult<ReceptionEvent> {
        if !self.initialized {
            return Err(ReceiverError::NotInitialized);
        }

        let mut event = ReceptionEvent::None;

        if !self.radio.crc_error() {
            if let Some(captured) = self.radio.captured() {
                event = self.process(now_ms, captured)?;
            }
        }

        self.scheduler.tick(now_ms, self.radio.as_ref())?;
        Ok(event)
    }

    fn process(&mut self, now_ms: u64, captured: CapturedPacket) -> ReceiverResult<ReceptionEvent> {
        let computed = crc::compute(captured.payload.as_bytes());
        debug!(
            target: "rfm",
            channel = captured.channel,
            rssi = captured.rssi,
            data = %captured.payload,
            crc = computed,
            "packet received"
        );

        if !crc::is_valid(&captured.payload) {
            self.scheduler.on_crc_error(self.radio.as_ref());
            return Ok(ReceptionEvent::CrcError);
        }

        self.scheduler.on_success(now_ms, self.radio.as_ref())?;

        let decoded = self.decoder.decode(&captured.payload);
        self.measurements.apply(&decoded);
        self.last_report = Some(PacketReport {
            timestamp_ms: now_ms,
            channel: captured.channel,
            rssi: captured.rssi,
            payload: captured.payload,
            message_type: decoded.message_type,
            decoded,
        });

        Ok(ReceptionEvent::Success(captured))
    }

    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::ResetStatistics => self.scheduler.reset_statistics(),
            Command::NewDay => {
                self.measurements.new_day();
                info!(target: "iss", "daily rain counter reset");
            }
            Command::SetRainTotal(clicks) => {
                self.measurements.set_rain_total(clicks);
                info!(target: "iss", clicks, "rain counter set");
            }
        }
    }

    /// Read the chip's temperature sensor and resume listening
    pub fn chip_temperature(&mut self) -> ReceiverResult<u8> {
        if !self.initialized {
            return Err(ReceiverError::NotInitialized);
        }

        let temperature = self.radio.read_temperature(self.temperature_calibration)?;
        self.radio.set_channel(self.radio.channel())?;
        Ok(temperature)
    }

    /// Stop receiving. `initialize` must run again before polling.
    pub fn shutdown(&mut self) -> ReceiverResult<()> {
        self.initialized = false;
        if let Err(err) = self.radio.standby() {
            warn!(target: "rfm", error = %err, "standby failed during shutdown");
            return Err(err.into());
        }
        info!(target: "setup", "receiver stopped");
        Ok(())
    }

    pub fn snapshot(&self, now_ms: u64) -> StatisticsSnapshot {
        self.scheduler.snapshot(now_ms, self.radio.channel())
    }

    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    pub fn last_report(&self) -> Option<&PacketReport> {
        self.last_report.as_ref()
    }

    pub fn scheduler(&self) -> &HopScheduler {
        &self.scheduler
    }

    pub fn radio(&self) -> &Arc<RadioDriver<B>> {
        &self.radio
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PacketBuffer;
    use crate::hardware::{MockRfm69, SimulatedTransmitter, EU_CHANNELS};
    use crate::processing::{MessageType, ReceiverStatus};

    const TEMPERATURE_PACKET: [u8; 8] = [0x80, 0x00, 0xB2, 0x30, 0xA9, 0x00, 0xAA, 0xDA];

    fn receiver() -> IssReceiver<MockRfm69> {
        let radio = Arc::new(RadioDriver::new(MockRfm69::new(), &EU_CHANNELS));
        let mut receiver = IssReceiver::new(radio, HopTiming::default());
        receiver.initialize().unwrap();
        receiver
    }

    fn capture(receiver: &IssReceiver<MockRfm69>, bytes: [u8; 8]) {
        let radio = receiver.radio();
        assert!(radio.critical_section(|chip| chip.deliver_payload(&PacketBuffer::new(bytes), -65)));
        assert!(radio.handle_interrupt().unwrap());
    }

    /// Step simulated time, servicing the interrupt whenever a burst lands
    fn run(
        receiver: &mut IssReceiver<MockRfm69>,
        transmitter: &mut SimulatedTransmitter,
        from_ms: u64,
        to_ms: u64,
    ) {
        let mut now = from_ms;
        while now < to_ms {
            let radio = Arc::clone(receiver.radio());
            if radio.critical_section(|chip| transmitter.poll(now, chip)) == Some(true) {
                radio.handle_interrupt().unwrap();
            }
            receiver.poll(now).unwrap();
            now += 50;
        }
    }

    #[test]
    fn test_poll_requires_initialize() {
        let radio = Arc::new(RadioDriver::new(MockRfm69::new(), &EU_CHANNELS));
        let mut receiver = IssReceiver::new(radio, HopTiming::default());
        assert_eq!(receiver.poll(0), Err(ReceiverError::NotInitialized));
    }

    #[test]
    fn test_from_config_applies_settings() {
        let radio = Arc::new(RadioDriver::new(MockRfm69::new(), &EU_CHANNELS));
        let config = ReceiverConfig {
            initial_channel: 3,
            ..Default::default()
        };
        let mut receiver = IssReceiver::from_config(radio, &config).unwrap();
        receiver.initialize().unwrap();
        assert_eq!(receiver.radio().channel(), 3);
    }

    #[test]
    fn test_from_config_rejects_channel_outside_table() {
        let radio = Arc::new(RadioDriver::new(MockRfm69::new(), &EU_CHANNELS));
        let config = ReceiverConfig {
            initial_channel: EU_CHANNELS.len(),
            ..Default::default()
        };
        let err = IssReceiver::from_config(radio, &config).err().unwrap();
        assert!(matches!(err, ReceiverError::ConfigurationError { ref parameter, .. } if parameter == "initial_channel"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_from_config_rejects_zero_interval() {
        let radio = Arc::new(RadioDriver::new(MockRfm69::new(), &EU_CHANNELS));
        let mut config = ReceiverConfig::default();
        config.timing.packet_interval_ms = 0;
        assert!(IssReceiver::from_config(radio, &config).is_err());
    }

    #[test]
    fn test_handshake_failure_surfaces() {
        let mut chip = MockRfm69::new();
        chip.disconnect();
        let radio = Arc::new(RadioDriver::new(chip, &EU_CHANNELS));
        let mut receiver = IssReceiver::new(radio, HopTiming::default());

        let err = receiver.initialize().unwrap_err();
        assert!(err.is_fatal());
        assert!(!receiver.is_initialized());
    }

    #[test]
    fn test_valid_temperature_packet() {
        let mut receiver = receiver();
        capture(&receiver, TEMPERATURE_PACKET);

        let event = receiver.poll(1000).unwrap();
        assert!(matches!(event, ReceptionEvent::Success(CapturedPacket { channel: 0, .. })));

        let measurements = receiver.measurements();
        assert!(measurements.outside_temperature.is_some());
        assert_eq!(measurements.rain_rate, None);
        assert_eq!(measurements.goldcap_voltage, None);
        assert_eq!(measurements.solar_radiation, None);
        assert_eq!(measurements.gust_speed, None);
        assert_eq!(measurements.outside_humidity, None);
        assert_eq!(measurements.rain_clicks, None);

        assert_eq!(receiver.scheduler().packets_received(), 1);
        assert_eq!(receiver.scheduler().miss_count(), 1);
        assert_eq!(receiver.radio().channel(), 1);
        assert!(!receiver.radio().receive_done());

        let report = receiver.last_report().unwrap();
        assert_eq!(report.channel, 0);
        assert_eq!(report.rssi, -65);
        assert_eq!(report.message_type, MessageType::OutsideTemperature);
        assert_eq!(report.payload, PacketBuffer::new(TEMPERATURE_PACKET));
    }

    #[test]
    fn test_crc_error_is_counted_once() {
        let mut receiver = receiver();
        let mut corrupted = TEMPERATURE_PACKET;
        corrupted[3] ^= 0x01;
        capture(&receiver, corrupted);

        assert_eq!(receiver.poll(1000).unwrap(), ReceptionEvent::CrcError);
        assert_eq!(receiver.poll(1050).unwrap(), ReceptionEvent::None);

        assert_eq!(receiver.scheduler().crc_errors(), 1);
        assert_eq!(receiver.scheduler().packets_received(), 0);
        assert_eq!(receiver.radio().channel(), 0);
        assert!(receiver.radio().crc_error());
        assert!(receiver.last_report().is_none());
    }

    #[test]
    fn test_all_zero_packet_rejected() {
        let mut receiver = receiver();
        capture(&receiver, [0; 8]);
        assert_eq!(receiver.poll(1000).unwrap(), ReceptionEvent::CrcError);
    }

    #[test]
    fn test_commands() {
        let mut receiver = receiver();
        let mut transmitter = SimulatedTransmitter::new(&EU_CHANNELS, 0, 1000);
        // Bursts at 1000 (temperature) and 3500 (rain counter seeds), 6000 ...
        run(&mut receiver, &mut transmitter, 0, 20_000);
        assert!(receiver.scheduler().packets_received() > 0);

        receiver.handle_command(Command::SetRainTotal(500));
        receiver.handle_command(Command::NewDay);
        assert_eq!(receiver.measurements().rain_clicks_total, 500);
        assert_eq!(receiver.measurements().rain_clicks_day, 0);

        receiver.handle_command(Command::ResetStatistics);
        assert_eq!(receiver.snapshot(20_000).packets_received, 0);
    }

    #[test]
    fn test_follows_transmitter() {
        let mut receiver = receiver();
        let mut transmitter = SimulatedTransmitter::new(&EU_CHANNELS, 0, 1000);
        run(&mut receiver, &mut transmitter, 0, 60_000);

        let snapshot = receiver.snapshot(60_000);
        assert_eq!(snapshot.packets_received, transmitter.bursts_sent() as u64);
        assert_eq!(snapshot.crc_errors, 0);
        assert_eq!(snapshot.auto_hops, 0);
        assert_eq!(snapshot.receive_streak, snapshot.packets_received);
        assert_eq!(snapshot.status, ReceiverStatus::Ok);
        assert_eq!(receiver.radio().channel(), transmitter.channel());

        let measurements = receiver.measurements();
        assert!(measurements.outside_temperature.is_some());
        assert!(measurements.outside_humidity.is_some());
        assert_eq!(measurements.rain_rate, Some(0.0));
    }

    #[test]
    fn test_finds_transmitter_from_cold_start() {
        let mut receiver = receiver();
        let mut transmitter = SimulatedTransmitter::new(&EU_CHANNELS, 2, 1000);
        run(&mut receiver, &mut transmitter, 0, 60_000);

        assert!(receiver.scheduler().packets_received() > 0);
        assert_eq!(receiver.scheduler().blackouts(), 0);
        assert_eq!(receiver.radio().channel(), transmitter.channel());
    }

    #[test]
    fn test_blackout_and_recovery() {
        let mut receiver = receiver();
        let mut transmitter = SimulatedTransmitter::new(&EU_CHANNELS, 0, 1000);
        run(&mut receiver, &mut transmitter, 0, 10_000);
        let before = receiver.scheduler().packets_received();
        assert!(before > 0);

        transmitter.silence_until(150_000);
        run(&mut receiver, &mut transmitter, 10_000, 150_000);
        assert_eq!(receiver.scheduler().miss_count(), 0);
        assert_eq!(receiver.scheduler().blackouts(), 1);
        assert_eq!(receiver.snapshot(150_000).status, ReceiverStatus::Error);

        run(&mut receiver, &mut transmitter, 150_000, 200_000);
        assert!(receiver.scheduler().packets_received() > before);
        assert_eq!(receiver.scheduler().blackouts(), 1);
        assert!(receiver.scheduler().longest_blackout_ms() >= 140_000);
        assert_eq!(receiver.snapshot(200_000).status, ReceiverStatus::Ok);
    }

    #[test]
    fn test_chip_temperature_resumes_listening() {
        let mut receiver = receiver();
        receiver.radio().set_channel(3).unwrap();

        assert_eq!(receiver.chip_temperature().unwrap(), 23);
        assert_eq!(receiver.radio().channel(), 3);
        assert!(receiver.radio().critical_section(|chip| chip.is_receiving()));
    }

    #[test]
    fn test_shutdown() {
        let mut receiver = receiver();
        receiver.shutdown().unwrap();
        assert_eq!(receiver.poll(0), Err(ReceiverError::NotInitialized));
        assert!(!receiver.radio().critical_section(|chip| chip.is_receiving()));
    }
}
