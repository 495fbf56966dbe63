//! Channel hop scheduling and reception statistics
//!
//! The ISS transmits every 2.5 s and moves one channel forward each time.
//! After a good packet the receiver hops with it and expects the next burst
//! one interval later. Missed bursts are chased with tiered timeouts; after
//! too many misses the receiver falls back to slow resync hops and waits for
//! the transmitter to come around.

use crate::core::{
    MAX_MISSED_PACKETS, PACKET_INTERVAL_MS, PACKET_LONGHOP_MS, PACKET_OFFSET_MS,
};
use crate::hardware::RegisterInterface;
use crate::radio::{RadioDriver, RadioResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Silence after which the receiver reports a warning
const STATUS_WARNING_MS: u64 = 10_000;
/// Silence after which the receiver reports an error
const STATUS_ERROR_MS: u64 = 60_000;

/// What the scheduler needs from the radio
pub trait ChannelHopper {
    fn hop(&self) -> RadioResult<()>;
    fn mark_crc_error(&self);
    fn channel(&self) -> usize;
}

impl<B: RegisterInterface> ChannelHopper for RadioDriver<B> {
    fn hop(&self) -> RadioResult<()> {
        RadioDriver::hop(self)
    }

    fn mark_crc_error(&self) {
        RadioDriver::mark_crc_error(self)
    }

    fn channel(&self) -> usize {
        RadioDriver::channel(self)
    }
}

/// Transmitter timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopTiming {
    /// Time between two ISS bursts
    pub packet_interval_ms: u64,
    /// Slack added to each tiered deadline
    pub packet_offset_ms: u64,
    /// Hop interval once tiered retry has given up
    pub long_hop_ms: u64,
    /// Tiered hops before falling back to long hops
    pub max_missed_packets: u8,
}

impl Default for HopTiming {
    fn default() -> Self {
        Self {
            packet_interval_ms: PACKET_INTERVAL_MS,
            packet_offset_ms: PACKET_OFFSET_MS,
            long_hop_ms: PACKET_LONGHOP_MS,
            max_missed_packets: MAX_MISSED_PACKETS,
        }
    }
}

impl HopTiming {
    /// Silence tolerated before the tiered hop for `miss_count`
    pub fn tiered_deadline_ms(&self, miss_count: u8) -> u64 {
        (miss_count as u64)
            .saturating_mul(self.packet_interval_ms)
            .saturating_add(self.packet_offset_ms)
    }
}

/// Why a hop happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopKind {
    /// Followed the transmitter after a good packet
    Received,
    /// Expected packet did not arrive; `missed` bursts so far
    Missed { missed: u8 },
    /// Slow resync while in blackout
    Resync,
}

/// Health classification by time since the last good packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiverStatus {
    /// Fewer than about three packets missed
    Ok,
    /// Up to about twenty packets missed
    Warning,
    /// A minute or more without data, or nothing received yet
    Error,
}

/// Point-in-time copy of the scheduler statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub timestamp_ms: u64,
    pub channel: usize,
    pub miss_count: u8,
    pub last_rx_ms: Option<u64>,
    /// Silence before the latest good packet
    pub since_last_rx_ms: u64,
    pub packets_received: u64,
    pub crc_errors: u64,
    pub auto_hops: u64,
    pub resync_hops: u64,
    pub blackouts: u64,
    pub longest_blackout_ms: u64,
    pub receive_streak: u64,
    pub longest_receive_streak: u64,
    pub status: ReceiverStatus,
}

/// Decides when to hop and keeps reception statistics
#[derive(Debug, Clone)]
pub struct HopScheduler {
    timing: HopTiming,
    /// 0 = blackout (long hops), 1..=max = tiered retry
    miss_count: u8,
    last_rx_ms: Option<u64>,
    last_long_hop_ms: u64,
    since_last_rx_ms: u64,
    /// Set by a good packet, consumed by the first resync hop after it
    receiving: bool,
    packets_received: u64,
    crc_errors: u64,
    auto_hops: u64,
    resync_hops: u64,
    blackouts: u64,
    longest_blackout_ms: u64,
    receive_streak: u64,
    longest_receive_streak: u64,
}

impl Default for HopScheduler {
    fn default() -> Self {
        Self::new(HopTiming::default())
    }
}

impl HopScheduler {
    pub fn new(timing: HopTiming) -> Self {
        Self {
            timing,
            miss_count: 0,
            last_rx_ms: None,
            last_long_hop_ms: 0,
            since_last_rx_ms: 0,
            receiving: false,
            packets_received: 0,
            crc_errors: 0,
            auto_hops: 0,
            resync_hops: 0,
            blackouts: 0,
            longest_blackout_ms: 0,
            receive_streak: 0,
            longest_receive_streak: 0,
        }
    }

    pub fn timing(&self) -> &HopTiming {
        &self.timing
    }

    /// A packet with a valid CRC arrived at `now_ms`; follow the transmitter
    pub fn on_success<H: ChannelHopper + ?Sized>(&mut self, now_ms: u64, radio: &H) -> RadioResult<()> {
        let silence = self.last_rx_ms.map_or(0, |last| now_ms.saturating_sub(last));
        self.longest_blackout_ms = self.longest_blackout_ms.max(silence);
        self.since_last_rx_ms = silence;
        self.last_rx_ms = Some(now_ms);

        self.packets_received += 1;
        self.receive_streak += 1;
        self.longest_receive_streak = self.longest_receive_streak.max(self.receive_streak);
        self.miss_count = 1;
        self.receiving = true;

        radio.hop()?;
        debug!(target: "rfm", channel = radio.channel(), kind = ?HopKind::Received, "hop");
        Ok(())
    }

    /// A packet failed its CRC; stay on the channel for the retransmission
    pub fn on_crc_error<H: ChannelHopper + ?Sized>(&mut self, radio: &H) {
        radio.mark_crc_error();
        self.crc_errors += 1;
        self.receive_streak = 0;
        warn!(target: "rfm", channel = radio.channel(), crc_errors = self.crc_errors, "CRC error");
    }

    /// Hop if the expected packet is overdue. Called on every loop iteration.
    ///
    /// Returns the last hop performed, if any. When tiered retry gives up
    /// the first resync hop happens on the same tick.
    pub fn tick<H: ChannelHopper + ?Sized>(&mut self, now_ms: u64, radio: &H) -> RadioResult<Option<HopKind>> {
        let mut performed = None;

        if self.miss_count > 0 {
            let silence = self.last_rx_ms.map_or(now_ms, |last| now_ms.saturating_sub(last));
            if silence > self.timing.tiered_deadline_ms(self.miss_count) {
                let missed = self.miss_count;
                self.receive_streak = 0;
                self.auto_hops += 1;
                self.miss_count = if missed >= self.timing.max_missed_packets {
                    0
                } else {
                    missed + 1
                };

                radio.hop()?;
                debug!(target: "rfm", channel = radio.channel(), missed, "hop: packet(s) missed");
                performed = Some(HopKind::Missed { missed });
            }
        }

        if self.miss_count == 0
            && now_ms.saturating_sub(self.last_long_hop_ms) > self.timing.long_hop_ms
        {
            if self.receiving {
                self.receiving = false;
                self.blackouts += 1;
                let silence = self.last_rx_ms.map_or(0, |last| now_ms.saturating_sub(last));
                self.longest_blackout_ms = self.longest_blackout_ms.max(silence);
                warn!(target: "rfm", blackouts = self.blackouts, silence_ms = silence, "blackout");
            }

            self.last_long_hop_ms = now_ms;
            self.resync_hops += 1;
            radio.hop()?;
            info!(target: "rfm", channel = radio.channel(), "hop: resync");
            performed = Some(HopKind::Resync);
        }

        Ok(performed)
    }

    /// Zero the counters; hop timing state is kept
    pub fn reset_statistics(&mut self) {
        self.longest_blackout_ms = 0;
        self.packets_received = 0;
        self.auto_hops = 0;
        self.resync_hops = 0;
        self.blackouts = 0;
        self.receive_streak = 0;
        self.longest_receive_streak = 0;
        self.crc_errors = 0;
        info!(target: "rfm", "statistics reset");
    }

    pub fn status(&self, now_ms: u64) -> ReceiverStatus {
        match self.last_rx_ms {
            Some(last) => {
                let silence = now_ms.saturating_sub(last);
                if silence < STATUS_WARNING_MS {
                    ReceiverStatus::Ok
                } else if silence < STATUS_ERROR_MS {
                    ReceiverStatus::Warning
                } else {
                    ReceiverStatus::Error
                }
            }
            None => ReceiverStatus::Error,
        }
    }

    pub fn miss_count(&self) -> u8 {
        self.miss_count
    }

    pub fn last_rx_ms(&self) -> Option<u64> {
        self.last_rx_ms
    }

    pub fn since_last_rx_ms(&self) -> u64 {
        self.since_last_rx_ms
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn crc_errors(&self) -> u64 {
        self.crc_errors
    }

    pub fn auto_hops(&self) -> u64 {
        self.auto_hops
    }

    pub fn blackouts(&self) -> u64 {
        self.blackouts
    }

    pub fn longest_blackout_ms(&self) -> u64 {
        self.longest_blackout_ms
    }

    pub fn receive_streak(&self) -> u64 {
        self.receive_streak
    }

    pub fn longest_receive_streak(&self) -> u64 {
        self.longest_receive_streak
    }

    pub fn snapshot(&self, now_ms: u64, channel: usize) -> StatisticsSnapshot {
        StatisticsSnapshot {
            timestamp_ms: now_ms,
            channel,
            miss_count: self.miss_count,
            last_rx_ms: self.last_rx_ms,
            since_last_rx_ms: self.since_last_rx_ms,
            packets_received: self.packets_received,
            crc_errors: self.crc_errors,
            auto_hops: self.auto_hops,
            resync_hops: self.resync_hops,
            blackouts: self.blackouts,
            longest_blackout_ms: self.longest_blackout_ms,
            receive_streak: self.receive_streak,
            longest_receive_streak: self.longest_receive_streak,
            status: self.status(now_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Counts hops instead of tuning a chip
    #[derive(Default)]
    struct FakeRadio {
        hops: Cell<u32>,
        crc_marks: Cell<u32>,
    }

    impl ChannelHopper for FakeRadio {
        fn hop(&self) -> RadioResult<()> {
            self.hops.set(self.hops.get() + 1);
            Ok(())
        }

        fn mark_crc_error(&self) {
            self.crc_marks.set(self.crc_marks.get() + 1);
        }

        fn channel(&self) -> usize {
            self.hops.get() as usize % 5
        }
    }

    fn after_success(at_ms: u64) -> (HopScheduler, FakeRadio) {
        let mut scheduler = HopScheduler::default();
        let radio = FakeRadio::default();
        scheduler.on_success(at_ms, &radio).unwrap();
        (scheduler, radio)
    }

    #[test]
    fn test_success_hops_and_counts() {
        let (scheduler, radio) = after_success(1000);
        assert_eq!(radio.hops.get(), 1);
        assert_eq!(scheduler.packets_received(), 1);
        assert_eq!(scheduler.receive_streak(), 1);
        assert_eq!(scheduler.miss_count(), 1);
        assert_eq!(scheduler.last_rx_ms(), Some(1000));
    }

    #[test]
    fn test_first_tiered_deadline() {
        let (mut scheduler, radio) = after_success(0);

        assert_eq!(scheduler.tick(2999, &radio).unwrap(), None);
        assert_eq!(scheduler.tick(3000, &radio).unwrap(), None);
        assert_eq!(radio.hops.get(), 1);

        assert_eq!(
            scheduler.tick(3001, &radio).unwrap(),
            Some(HopKind::Missed { missed: 1 })
        );
        assert_eq!(radio.hops.get(), 2);
        assert_eq!(scheduler.miss_count(), 2);
        assert_eq!(scheduler.auto_hops(), 1);
    }

    #[test]
    fn test_second_tiered_deadline() {
        let (mut scheduler, radio) = after_success(0);
        scheduler.tick(3001, &radio).unwrap();

        assert_eq!(scheduler.tick(5500, &radio).unwrap(), None);
        assert_eq!(
            scheduler.tick(5501, &radio).unwrap(),
            Some(HopKind::Missed { missed: 2 })
        );
        assert_eq!(scheduler.miss_count(), 3);
    }

    #[test]
    fn test_tiered_hop_breaks_streak() {
        let (mut scheduler, radio) = after_success(0);
        scheduler.on_success(2500, &radio).unwrap();
        assert_eq!(scheduler.receive_streak(), 2);

        scheduler.tick(6000, &radio).unwrap();
        assert_eq!(scheduler.receive_streak(), 0);
        assert_eq!(scheduler.longest_receive_streak(), 2);
    }

    #[test]
    fn test_crc_error_does_not_hop() {
        let (mut scheduler, radio) = after_success(0);
        scheduler.on_crc_error(&radio);

        assert_eq!(radio.hops.get(), 1);
        assert_eq!(radio.crc_marks.get(), 1);
        assert_eq!(scheduler.crc_errors(), 1);
        assert_eq!(scheduler.receive_streak(), 0);
        assert_eq!(scheduler.miss_count(), 1);
    }

    #[test]
    fn test_tiered_retry_gives_up_after_max_misses() {
        let timing = HopTiming::default();
        let (mut scheduler, radio) = after_success(0);

        for miss in 1..MAX_MISSED_PACKETS {
            let at = timing.tiered_deadline_ms(miss) + 1;
            assert_eq!(scheduler.tick(at, &radio).unwrap(), Some(HopKind::Missed { missed: miss }));
            assert_eq!(scheduler.miss_count(), miss + 1);
        }

        // The 25th miss drops into blackout; the first resync hop follows at once
        let at = timing.tiered_deadline_ms(MAX_MISSED_PACKETS) + 1;
        assert_eq!(scheduler.tick(at, &radio).unwrap(), Some(HopKind::Resync));
        assert_eq!(scheduler.miss_count(), 0);
        assert_eq!(scheduler.auto_hops(), MAX_MISSED_PACKETS as u64);
        assert_eq!(scheduler.blackouts(), 1);
        assert_eq!(scheduler.longest_blackout_ms(), at);
    }

    #[test]
    fn test_tiered_retry_with_full_u8_budget() {
        let timing = HopTiming {
            max_missed_packets: u8::MAX,
            ..Default::default()
        };
        let mut scheduler = HopScheduler::new(timing);
        let radio = FakeRadio::default();
        scheduler.on_success(0, &radio).unwrap();

        for miss in 1..u8::MAX {
            let at = timing.tiered_deadline_ms(miss) + 1;
            assert_eq!(scheduler.tick(at, &radio).unwrap(), Some(HopKind::Missed { missed: miss }));
        }
        assert_eq!(scheduler.miss_count(), u8::MAX);

        let at = timing.tiered_deadline_ms(u8::MAX) + 1;
        assert_eq!(scheduler.tick(at, &radio).unwrap(), Some(HopKind::Resync));
        assert_eq!(scheduler.miss_count(), 0);
        assert_eq!(scheduler.auto_hops(), u8::MAX as u64);
    }

    #[test]
    fn test_tiered_deadline_saturates() {
        let timing = HopTiming {
            packet_interval_ms: u64::MAX,
            packet_offset_ms: 1,
            ..Default::default()
        };
        assert_eq!(timing.tiered_deadline_ms(3), u64::MAX);

        let mut scheduler = HopScheduler::new(timing);
        let radio = FakeRadio::default();
        scheduler.on_success(0, &radio).unwrap();
        assert_eq!(scheduler.tick(u64::MAX, &radio).unwrap(), None);
    }

    #[test]
    fn test_blackout_counted_once_per_transition() {
        let timing = HopTiming::default();
        let (mut scheduler, radio) = after_success(0);
        let give_up = timing.tiered_deadline_ms(MAX_MISSED_PACKETS) + 1;
        for miss in 1..=MAX_MISSED_PACKETS {
            scheduler.tick(timing.tiered_deadline_ms(miss) + 1, &radio).unwrap();
        }
        assert_eq!(scheduler.blackouts(), 1);

        // Further resync hops stay in the same blackout
        assert_eq!(scheduler.tick(give_up + 20_000, &radio).unwrap(), None);
        assert_eq!(
            scheduler.tick(give_up + 20_001, &radio).unwrap(),
            Some(HopKind::Resync)
        );
        assert_eq!(scheduler.tick(give_up + 40_002, &radio).unwrap(), Some(HopKind::Resync));
        assert_eq!(scheduler.blackouts(), 1);

        // Recovery, then another long silence
        let back = give_up + 50_000;
        scheduler.on_success(back, &radio).unwrap();
        assert_eq!(scheduler.since_last_rx_ms(), back);
        assert_eq!(scheduler.longest_blackout_ms(), back);
        for miss in 1..=MAX_MISSED_PACKETS {
            scheduler.tick(back + timing.tiered_deadline_ms(miss) + 1, &radio).unwrap();
        }
        assert_eq!(scheduler.blackouts(), 2);
    }

    #[test]
    fn test_startup_scan_is_not_a_blackout() {
        let mut scheduler = HopScheduler::default();
        let radio = FakeRadio::default();

        assert_eq!(scheduler.tick(20_000, &radio).unwrap(), None);
        assert_eq!(scheduler.tick(20_001, &radio).unwrap(), Some(HopKind::Resync));
        assert_eq!(scheduler.tick(40_002, &radio).unwrap(), Some(HopKind::Resync));
        assert_eq!(scheduler.blackouts(), 0);
        assert_eq!(scheduler.auto_hops(), 0);
        assert_eq!(radio.hops.get(), 2);
    }

    #[test]
    fn test_receiver_status() {
        let mut scheduler = HopScheduler::default();
        assert_eq!(scheduler.status(0), ReceiverStatus::Error);

        let radio = FakeRadio::default();
        scheduler.on_success(1000, &radio).unwrap();
        assert_eq!(scheduler.status(10_999), ReceiverStatus::Ok);
        assert_eq!(scheduler.status(11_000), ReceiverStatus::Warning);
        assert_eq!(scheduler.status(60_999), ReceiverStatus::Warning);
        assert_eq!(scheduler.status(61_000), ReceiverStatus::Error);
    }

    #[test]
    fn test_reset_statistics_keeps_timing() {
        let (mut scheduler, radio) = after_success(1000);
        scheduler.on_crc_error(&radio);
        scheduler.reset_statistics();

        let snapshot = scheduler.snapshot(2000, 3);
        assert_eq!(snapshot.packets_received, 0);
        assert_eq!(snapshot.crc_errors, 0);
        assert_eq!(snapshot.miss_count, 1);
        assert_eq!(snapshot.last_rx_ms, Some(1000));
        assert_eq!(snapshot.status, ReceiverStatus::Ok);
        assert_eq!(snapshot.channel, 3);
    }

    #[test]
    fn test_snapshot_serializes() {
        let (scheduler, _radio) = after_success(1000);
        let json = serde_json::to_string(&scheduler.snapshot(1500, 1)).unwrap();
        assert!(json.contains("\"packets_received\":1"));
        assert!(json.contains("\"status\":\"Ok\""));
    }
}
