// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Radio side of the gateway
//!
//! [`RadioDriver`] is the packet send/receive API a transceiver driver
//! exposes. [`RadioLink`] owns one driver and turns raw packets into
//! [`Frame`]s, drives the status indicator and keeps link statistics.
//!
//! Drivers:
//! - [`UdpRadio`] - datagrams over a local UDP socket (host runs, simulation)
//! - [`MemoryRadio`] - in-process queues (tests)

mod indicator;
mod memory;
mod udp;

pub use indicator::{LogIndicator, NoIndicator, StatusIndicator};
pub use memory::{MemoryRadio, MemoryRadioHandle};
pub use udp::UdpRadio;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RadioConfig;
use crate::error::LinkError;
use crate::frame::{Frame, MAX_FRAME_LEN};
use crate::stats::GatewayStats;

use indicator::IndicatorTimer;

/// Physical-layer settings applied once at initialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioSettings {
    /// Carrier frequency (MHz)
    pub frequency_mhz: f32,
    /// Transmit power (dBm)
    pub tx_power_dbm: i8,
    /// Receive frames addressed to any node
    pub promiscuous: bool,
}

impl RadioSettings {
    /// Take the physical-layer part of the `[radio]` section.
    pub fn from_config(config: &RadioConfig) -> Self {
        Self {
            frequency_mhz: config.frequency_mhz,
            tx_power_dbm: config.tx_power_dbm,
            promiscuous: config.promiscuous,
        }
    }
}

/// Packet API of a radio transceiver.
///
/// Calls never block: `available` is a cheap check and `recv` is only
/// called after it returned `true`.
pub trait RadioDriver: Send {
    /// Configure and start the transceiver.
    fn init(&mut self, settings: &RadioSettings) -> Result<(), LinkError>;

    /// Whether a received packet is waiting.
    fn available(&mut self) -> Result<bool, LinkError>;

    /// Copy the waiting packet into `buf`, returning its length.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Transmit one raw packet.
    fn send(&mut self, data: &[u8]) -> Result<(), LinkError>;

    /// Signal strength of the last received packet (dBm).
    fn last_rssi(&self) -> i16 {
        0
    }

    /// Put the transceiver to sleep.
    fn shutdown(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

/// Link-level settings.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Physical-layer settings
    pub radio: RadioSettings,
    /// Sleep between availability checks
    pub poll_interval: Duration,
    /// How long the indicator stays lit after a frame
    pub indicator_hold: Duration,
}

impl LinkConfig {
    /// Derive link settings from the `[radio]` section.
    pub fn from_config(config: &RadioConfig) -> Self {
        Self {
            radio: RadioSettings::from_config(config),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            indicator_hold: Duration::from_millis(config.indicator_hold_ms),
        }
    }
}

/// An initialized radio link.
pub struct RadioLink<D: RadioDriver> {
    driver: D,
    poll_interval: Duration,
    indicator: IndicatorTimer,
    stats: Arc<GatewayStats>,
    buf: Box<[u8]>,
}

impl<D: RadioDriver> RadioLink<D> {
    /// Initialize the driver. A failure here is fatal for the gateway.
    pub fn open(
        mut driver: D,
        config: &LinkConfig,
        stats: Arc<GatewayStats>,
    ) -> Result<Self, LinkError> {
        driver.init(&config.radio)?;

        tracing::info!(
            frequency_mhz = config.radio.frequency_mhz,
            tx_power_dbm = config.radio.tx_power_dbm,
            promiscuous = config.radio.promiscuous,
            "Radio initialized"
        );

        Ok(Self {
            driver,
            poll_interval: config.poll_interval.max(Duration::from_millis(1)),
            indicator: IndicatorTimer::new(Box::new(NoIndicator), config.indicator_hold),
            stats,
            // One spare byte so oversized packets are detected instead of truncated
            buf: vec![0u8; MAX_FRAME_LEN + 1].into_boxed_slice(),
        })
    }

    /// Replace the status indicator.
    pub fn set_indicator(&mut self, indicator: Box<dyn StatusIndicator>) {
        self.indicator.replace(indicator);
    }

    /// Sleep used between availability checks.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Check if a frame is queued.
    pub fn poll(&mut self) -> Result<bool, LinkError> {
        self.driver.available().inspect_err(|_| {
            self.stats.record_link_error();
        })
    }

    /// Wait up to `timeout` for a frame to become available.
    ///
    /// Returns `Ok(false)` once the timeout elapsed with nothing queued.
    /// Cancel-safe.
    pub async fn poll_or_wait(&mut self, timeout: Duration) -> Result<bool, LinkError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.poll()? {
                return Ok(true);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }

    /// Receive and decode the queued frame.
    pub fn receive(&mut self) -> Result<Frame, LinkError> {
        if !self.poll()? {
            return Err(LinkError::NoFrame);
        }

        let result = self
            .driver
            .recv(&mut self.buf)
            .and_then(|len| {
                let len = len.min(self.buf.len());
                Frame::decode(&self.buf[..len], self.driver.last_rssi())
            });

        match result {
            Ok(frame) => {
                self.indicator.light();
                self.stats.record_rx(frame.payload().len());
                tracing::trace!(
                    from = %frame.from(),
                    to = %frame.to(),
                    id = frame.id(),
                    flags = frame.flags().bits(),
                    rssi = frame.rssi(),
                    len = frame.payload().len(),
                    "Frame received"
                );
                Ok(frame)
            }
            Err(err) => {
                self.stats.record_link_error();
                Err(err)
            }
        }
    }

    /// Transmit a frame.
    pub fn send(&mut self, frame: &Frame) -> Result<(), LinkError> {
        match self.driver.send(&frame.encode()) {
            Ok(()) => {
                self.stats.record_tx();
                tracing::trace!(
                    to = %frame.to(),
                    id = frame.id(),
                    ack = frame.is_ack(),
                    len = frame.payload().len(),
                    "Frame sent"
                );
                Ok(())
            }
            Err(err) => {
                self.stats.record_link_error();
                Err(err)
            }
        }
    }

    /// Switch the indicator off once its hold time has passed.
    pub fn refresh_indicator(&mut self) {
        self.indicator.refresh();
    }

    /// Whether the indicator is currently lit.
    pub fn indicator_lit(&self) -> bool {
        self.indicator.is_lit()
    }

    /// Switch the indicator off and stop the driver.
    pub fn close(&mut self) {
        self.indicator.force_off();
        if let Err(err) = self.driver.shutdown() {
            tracing::warn!(error = %err, "Radio shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameFlags, NodeAddress};

    fn link_config() -> LinkConfig {
        LinkConfig {
            radio: RadioSettings {
                frequency_mhz: 868.0,
                tx_power_dbm: 14,
                promiscuous: false,
            },
            poll_interval: Duration::from_millis(5),
            indicator_hold: Duration::from_millis(200),
        }
    }

    fn open_link() -> (RadioLink<MemoryRadio>, MemoryRadioHandle, Arc<GatewayStats>) {
        let radio = MemoryRadio::new();
        let handle = radio.handle();
        let stats = Arc::new(GatewayStats::new());
        let link = RadioLink::open(radio, &link_config(), stats.clone()).expect("open");
        (link, handle, stats)
    }

    #[test]
    fn test_open_applies_settings() {
        let (_link, handle, _) = open_link();
        let settings = handle.settings().expect("initialized");
        assert_eq!(settings.frequency_mhz, 868.0);
        assert_eq!(settings.tx_power_dbm, 14);
        assert!(!settings.promiscuous);
    }

    #[test]
    fn test_open_failure() {
        let radio = MemoryRadio::new();
        radio.handle().fail_init(true);
        let result = RadioLink::open(radio, &link_config(), Arc::new(GatewayStats::new()));
        assert!(matches!(result, Err(LinkError::Init(_))));
    }

    #[test]
    fn test_receive_decodes_and_counts() {
        let (mut link, handle, stats) = open_link();

        assert!(matches!(link.receive(), Err(LinkError::NoFrame)));

        handle.inject_raw(&[5, 3, 7, 0, 0xAA, 0xBB], -60);
        assert!(link.poll().unwrap());

        let frame = link.receive().unwrap();
        assert_eq!(frame.from(), NodeAddress(3));
        assert_eq!(frame.payload(), &[0xAA, 0xBB]);
        assert_eq!(frame.rssi(), -60);
        assert!(!link.poll().unwrap());

        let snap = stats.snapshot();
        assert_eq!(snap.frames_received, 1);
        assert_eq!(snap.bytes_received, 2);
    }

    #[test]
    fn test_short_packet_is_link_error() {
        let (mut link, handle, stats) = open_link();

        handle.inject_raw(&[5, 3], 0);
        assert!(matches!(
            link.receive(),
            Err(LinkError::Malformed { len: 2, .. })
        ));
        assert_eq!(stats.snapshot().link_errors, 1);
        assert_eq!(stats.snapshot().frames_received, 0);
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let (mut link, handle, _) = open_link();

        handle.inject_raw(&vec![0u8; MAX_FRAME_LEN + 10], 0);
        assert!(matches!(
            link.receive(),
            Err(LinkError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_send_encodes_frame() {
        let (mut link, handle, stats) = open_link();
        let frame = Frame::new(
            NodeAddress(5),
            NodeAddress(3),
            1,
            FrameFlags::empty(),
            vec![9],
        )
        .unwrap();

        link.send(&frame).unwrap();
        assert_eq!(handle.sent_raw(), vec![vec![3, 5, 1, 0, 9]]);
        assert_eq!(stats.snapshot().radio_tx, 1);

        handle.fail_sends(true);
        assert!(matches!(link.send(&frame), Err(LinkError::Transmit(_))));
        assert_eq!(stats.snapshot().link_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_or_wait() {
        let (mut link, handle, _) = open_link();

        let start = Instant::now();
        assert!(!link.poll_or_wait(Duration::from_millis(50)).await.unwrap());
        assert!(start.elapsed() >= Duration::from_millis(50));

        handle.inject_raw(&[5, 3, 7, 0], 0);
        let start = Instant::now();
        assert!(link.poll_or_wait(Duration::from_secs(1)).await.unwrap());
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_indicator_hold_and_close() {
        let (mut link, handle, _) = open_link();
        assert!(!link.indicator_lit());

        handle.inject_raw(&[5, 3, 7, 0], 0);
        link.receive().unwrap();
        assert!(link.indicator_lit());

        tokio::time::advance(Duration::from_millis(100)).await;
        link.refresh_indicator();
        assert!(link.indicator_lit());

        tokio::time::advance(Duration::from_millis(100)).await;
        link.refresh_indicator();
        assert!(!link.indicator_lit());

        handle.inject_raw(&[5, 3, 8, 0], 0);
        link.receive().unwrap();
        link.close();
        assert!(!link.indicator_lit());
        assert!(handle.is_shut_down());
    }
}
