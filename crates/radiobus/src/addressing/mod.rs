// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Addressing and reliable delivery
//!
//! [`AddressingLayer`] decides what happens to every received frame:
//!
//! - ack frames are consumed here and never published
//! - frames for other nodes are rejected unless the radio is promiscuous
//! - in reliable mode, data frames addressed to this node are acked
//!   (every copy, including retransmissions)
//! - retransmitted copies are dropped by `(from, id)`
//!
//! Outbound frames in reliable mode go through [`AddressingLayer::send_with_ack`],
//! which retransmits with the same id until the peer acks or the retry
//! budget runs out. Data frames heard while waiting for an ack are parked
//! and handed back through [`AddressingLayer::take_backlog`].

mod seen;

pub use seen::{DedupeCache, DEFAULT_CAPACITY};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RadioConfig;
use crate::error::{AckError, LinkError};
use crate::frame::{Frame, FrameFlags, NodeAddress};
use crate::radio::{RadioDriver, RadioLink};
use crate::shutdown::ShutdownListener;
use crate::stats::GatewayStats;

/// Frames parked during an ack wait before the oldest is dropped.
pub const BACKLOG_CAPACITY: usize = 64;

/// Retry policy for reliable mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliableSettings {
    /// Retransmissions after the first attempt
    pub max_retries: u8,
    /// Wait for an ack before retransmitting
    pub retry_timeout: Duration,
}

impl Default for ReliableSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_timeout: Duration::from_millis(200),
        }
    }
}

/// Addressing settings.
#[derive(Debug, Clone)]
pub struct AddressingConfig {
    /// This gateway's node address
    pub local: NodeAddress,
    /// Accept frames for any destination
    pub promiscuous: bool,
    /// Ack/retry protocol, `None` when disabled
    pub reliable: Option<ReliableSettings>,
    /// Retention window for duplicate detection
    pub dedupe_window: Duration,
}

impl AddressingConfig {
    /// Derive addressing settings from the `[radio]` section.
    pub fn from_config(config: &RadioConfig) -> Self {
        let reliable = config.reliable.enabled.then(|| ReliableSettings {
            max_retries: config.reliable.max_retries,
            retry_timeout: Duration::from_millis(config.reliable.retry_timeout_ms),
        });

        Self {
            local: config.local_address(),
            promiscuous: config.promiscuous,
            reliable,
            dedupe_window: Duration::from_millis(config.dedupe_window_ms),
        }
    }
}

/// What became of a received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Acknowledgement, consumed
    Ack,
    /// Not addressed to this node
    Rejected,
    /// Copy of a frame already delivered
    Duplicate,
    /// Route to the bus
    Deliver(Frame),
}

/// Outcome of an outbound transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Id the frame was sent with
    pub id: u8,
    /// Destination
    pub to: NodeAddress,
    /// Transmissions made (1 = no retransmission)
    pub attempts: u32,
    /// Whether the peer confirmed receipt. Broadcasts and plain sends are
    /// never confirmed.
    pub acknowledged: bool,
}

/// Outbound exchange waiting for an ack.
#[derive(Debug, Clone, Copy)]
struct PendingAck {
    id: u8,
    to: NodeAddress,
    retries: u8,
    deadline: Instant,
}

/// Frame filter, deduplication and ack/retry protocol.
pub struct AddressingLayer {
    config: AddressingConfig,
    seen: DedupeCache,
    last_id: u8,
    pending: Option<PendingAck>,
    backlog: VecDeque<Frame>,
    stats: Arc<GatewayStats>,
}

impl AddressingLayer {
    /// Create the layer.
    pub fn new(config: AddressingConfig, stats: Arc<GatewayStats>) -> Self {
        let seen = DedupeCache::new(config.dedupe_window, DEFAULT_CAPACITY);
        Self {
            config,
            seen,
            last_id: 0,
            pending: None,
            backlog: VecDeque::new(),
            stats,
        }
    }

    /// Local node address.
    pub fn local(&self) -> NodeAddress {
        self.config.local
    }

    /// Whether the ack/retry protocol is on.
    pub fn is_reliable(&self) -> bool {
        self.config.reliable.is_some()
    }

    /// Whether a frame is for this gateway.
    pub fn accept(&self, frame: &Frame) -> bool {
        frame.to() == self.config.local || self.config.promiscuous
    }

    /// Record `(from, id)`; false if it was delivered within the window.
    pub fn dedupe(&mut self, frame: &Frame) -> bool {
        !self.seen.check_and_mark(frame.from(), frame.id())
    }

    /// Id of the exchange currently waiting for an ack.
    pub fn pending_id(&self) -> Option<u8> {
        self.pending.map(|p| p.id)
    }

    /// Data frames parked during the last ack wait, oldest first.
    pub fn take_backlog(&mut self) -> Vec<Frame> {
        self.backlog.drain(..).collect()
    }

    /// Classify a received frame, acking it when reliable mode requires.
    pub fn ingest<D: RadioDriver>(&mut self, link: &mut RadioLink<D>, frame: Frame) -> Inbound {
        if frame.is_ack() {
            tracing::debug!(from = %frame.from(), id = frame.id(), "Unsolicited ack ignored");
            return Inbound::Ack;
        }

        if !self.accept(&frame) {
            self.stats.record_rejected();
            tracing::debug!(from = %frame.from(), to = %frame.to(), id = frame.id(), "Frame not for us");
            return Inbound::Rejected;
        }

        // Overheard and broadcast frames are never acked
        if self.is_reliable() && frame.to() == self.config.local {
            self.send_ack(link, &frame);
        }

        if !self.dedupe(&frame) {
            self.stats.record_duplicate();
            tracing::debug!(from = %frame.from(), id = frame.id(), "Duplicate frame dropped");
            return Inbound::Duplicate;
        }

        Inbound::Deliver(frame)
    }

    fn send_ack<D: RadioDriver>(&mut self, link: &mut RadioLink<D>, frame: &Frame) {
        let ack = Frame::ack_for(frame, self.config.local);
        match link.send(&ack) {
            Ok(()) => {
                self.stats.record_ack_sent();
                tracing::trace!(to = %frame.from(), id = frame.id(), "Ack sent");
            }
            Err(err) => {
                tracing::warn!(to = %frame.from(), id = frame.id(), error = %err, "Failed to send ack");
            }
        }
    }

    fn allocate_id(&mut self) -> u8 {
        loop {
            self.last_id = self.last_id.wrapping_add(1);
            if self.pending_id() != Some(self.last_id) {
                return self.last_id;
            }
        }
    }

    /// Transmit once without waiting for an ack.
    pub fn send<D: RadioDriver>(
        &mut self,
        link: &mut RadioLink<D>,
        to: NodeAddress,
        payload: Vec<u8>,
    ) -> Result<Ack, LinkError> {
        let id = self.allocate_id();
        let frame = Frame::new(self.config.local, to, id, FrameFlags::empty(), payload)?;
        link.send(&frame)?;
        Ok(Ack {
            id,
            to,
            attempts: 1,
            acknowledged: false,
        })
    }

    /// Transmit and wait for the peer's ack, retransmitting on timeout.
    ///
    /// With `max_retries = N` the frame goes out at most N+1 times. Frames
    /// to the broadcast address go out once and are not acked. Uses the
    /// default retry policy when reliable mode is disabled.
    pub async fn send_with_ack<D: RadioDriver>(
        &mut self,
        link: &mut RadioLink<D>,
        to: NodeAddress,
        payload: Vec<u8>,
        shutdown: &mut ShutdownListener,
    ) -> Result<Ack, AckError> {
        if shutdown.is_triggered() {
            return Err(AckError::Cancelled);
        }
        if to.is_broadcast() {
            return Ok(self.send(link, to, payload)?);
        }

        let settings = self.config.reliable.unwrap_or_default();
        let id = self.allocate_id();
        let frame = Frame::new(self.config.local, to, id, FrameFlags::empty(), payload)?;

        let result = self.exchange(link, &frame, settings, shutdown).await;
        self.pending = None;

        match &result {
            Ok(ack) => {
                self.stats.record_ack_received();
                tracing::debug!(to = %to, id, attempts = ack.attempts, "Frame acknowledged");
            }
            Err(AckError::Timeout { attempts, .. }) => {
                self.stats.record_ack_timeout();
                tracing::warn!(to = %to, id, attempts, "No ack, giving up");
            }
            Err(AckError::Cancelled) => {
                tracing::debug!(to = %to, id, "Exchange abandoned on shutdown");
            }
            Err(err) => {
                tracing::warn!(to = %to, id, error = %err, "Exchange failed");
            }
        }
        result
    }

    async fn exchange<D: RadioDriver>(
        &mut self,
        link: &mut RadioLink<D>,
        frame: &Frame,
        settings: ReliableSettings,
        shutdown: &mut ShutdownListener,
    ) -> Result<Ack, AckError> {
        let total = u32::from(settings.max_retries) + 1;

        for attempt in 1..=total {
            link.send(frame)?;

            let pending = PendingAck {
                id: frame.id(),
                to: frame.to(),
                retries: (attempt - 1) as u8,
                deadline: Instant::now() + settings.retry_timeout,
            };
            self.pending = Some(pending);
            tracing::trace!(to = %pending.to, id = pending.id, retries = pending.retries, "Waiting for ack");

            if self.await_ack(link, frame, pending.deadline, shutdown).await? {
                return Ok(Ack {
                    id: frame.id(),
                    to: frame.to(),
                    attempts: attempt,
                    acknowledged: true,
                });
            }
        }

        Err(AckError::Timeout {
            id: frame.id(),
            to: frame.to().get(),
            attempts: total,
        })
    }

    /// Receive until the matching ack arrives (true) or `deadline` passes
    /// (false).
    async fn await_ack<D: RadioDriver>(
        &mut self,
        link: &mut RadioLink<D>,
        sent: &Frame,
        deadline: Instant,
        shutdown: &mut ShutdownListener,
    ) -> Result<bool, AckError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            let ready = tokio::select! {
                biased;
                _ = shutdown.triggered() => return Err(AckError::Cancelled),
                ready = link.poll_or_wait(remaining) => ready,
            };
            match ready {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(err) => {
                    // Only the deadline or an ack ends the wait
                    tracing::warn!(error = %err, "Radio poll failed while waiting for ack");
                    let pause = link.poll_interval().min(remaining);
                    tokio::select! {
                        biased;
                        _ = shutdown.triggered() => return Err(AckError::Cancelled),
                        _ = tokio::time::sleep(pause) => {}
                    }
                    continue;
                }
            }

            let received = match link.receive() {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!(error = %err, "Receive failed while waiting for ack");
                    continue;
                }
            };

            if received.is_ack() {
                if received.from() == sent.to()
                    && received.to() == self.config.local
                    && received.id() == sent.id()
                {
                    return Ok(true);
                }
                tracing::debug!(from = %received.from(), id = received.id(), "Stray ack ignored");
                continue;
            }

            // Acks take priority; data is acked now and routed afterwards
            if let Inbound::Deliver(frame) = self.ingest(link, received) {
                if self.backlog.len() == BACKLOG_CAPACITY {
                    self.backlog.pop_front();
                    self.stats.record_queue_drop();
                }
                self.backlog.push_back(frame);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::{LinkConfig, MemoryRadio, MemoryRadioHandle, RadioSettings};
    use crate::shutdown::Shutdown;

    const LOCAL: NodeAddress = NodeAddress(5);

    fn setup(
        promiscuous: bool,
        reliable: Option<ReliableSettings>,
    ) -> (
        AddressingLayer,
        RadioLink<MemoryRadio>,
        MemoryRadioHandle,
        Arc<GatewayStats>,
    ) {
        let stats = Arc::new(GatewayStats::new());
        let radio = MemoryRadio::new();
        let handle = radio.handle();
        let link_config = LinkConfig {
            radio: RadioSettings {
                frequency_mhz: 868.0,
                tx_power_dbm: 14,
                promiscuous,
            },
            poll_interval: Duration::from_millis(5),
            indicator_hold: Duration::from_millis(200),
        };
        let link = RadioLink::open(radio, &link_config, stats.clone()).unwrap();
        let layer = AddressingLayer::new(
            AddressingConfig {
                local: LOCAL,
                promiscuous,
                reliable,
                dedupe_window: Duration::from_secs(10),
            },
            stats.clone(),
        );
        (layer, link, handle, stats)
    }

    fn data(from: u8, to: u8, id: u8, payload: &[u8]) -> Frame {
        Frame::new(
            NodeAddress(from),
            NodeAddress(to),
            id,
            FrameFlags::empty(),
            payload.to_vec(),
        )
        .unwrap()
    }

    fn reliable(max_retries: u8, timeout_ms: u64) -> Option<ReliableSettings> {
        Some(ReliableSettings {
            max_retries,
            retry_timeout: Duration::from_millis(timeout_ms),
        })
    }

    #[test]
    fn test_accept() {
        let (layer, ..) = setup(false, None);
        assert!(layer.accept(&data(3, 5, 1, &[])));
        assert!(!layer.accept(&data(3, 9, 1, &[])));
        assert!(!layer.accept(&data(3, 255, 1, &[])));

        let (layer, ..) = setup(true, None);
        assert!(layer.accept(&data(3, 9, 1, &[])));
        assert!(layer.accept(&data(3, 255, 1, &[])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_filters_and_dedupes() {
        let (mut layer, mut link, handle, stats) = setup(false, None);

        let frame = data(3, 5, 7, &[1, 2]);
        assert_eq!(layer.ingest(&mut link, frame.clone()), Inbound::Deliver(frame.clone()));
        assert_eq!(layer.ingest(&mut link, frame.clone()), Inbound::Duplicate);
        assert_eq!(layer.ingest(&mut link, data(3, 9, 7, &[])), Inbound::Rejected);

        // No acks outside reliable mode
        assert!(handle.sent().is_empty());
        let snap = stats.snapshot();
        assert_eq!(snap.frames_rejected, 1);
        assert_eq!(snap.frames_duplicate, 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(layer.ingest(&mut link, frame.clone()), Inbound::Deliver(frame));
    }

    #[tokio::test]
    async fn test_ack_frames_consumed() {
        let (mut layer, mut link, ..) = setup(true, None);
        let ack = Frame::ack_for(&data(5, 3, 1, &[]), NodeAddress(3));
        assert_eq!(layer.ingest(&mut link, ack), Inbound::Ack);
    }

    #[tokio::test]
    async fn test_reliable_inbound_acked_every_copy() {
        let (mut layer, mut link, handle, stats) = setup(false, reliable(3, 200));

        let frame = data(3, 5, 7, &[1]);
        assert!(matches!(layer.ingest(&mut link, frame.clone()), Inbound::Deliver(_)));
        assert_eq!(layer.ingest(&mut link, frame), Inbound::Duplicate);

        let sent = handle.sent();
        assert_eq!(sent.len(), 2);
        for ack in &sent {
            assert!(ack.is_ack());
            assert_eq!(ack.to(), NodeAddress(3));
            assert_eq!(ack.from(), LOCAL);
            assert_eq!(ack.id(), 7);
            assert_eq!(ack.payload(), b"!");
        }
        assert_eq!(stats.snapshot().acks_sent, 2);
    }

    #[tokio::test]
    async fn test_overheard_and_broadcast_not_acked() {
        let (mut layer, mut link, handle, _) = setup(true, reliable(3, 200));

        assert!(matches!(
            layer.ingest(&mut link, data(3, 9, 1, &[1])),
            Inbound::Deliver(_)
        ));
        assert!(matches!(
            layer.ingest(&mut link, data(3, 255, 2, &[1])),
            Inbound::Deliver(_)
        ));
        assert!(handle.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_with_ack_timeout_transmissions() {
        let (mut layer, mut link, handle, stats) = setup(false, reliable(2, 3000));
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        let start = Instant::now();
        let err = layer
            .send_with_ack(&mut link, NodeAddress(3), vec![0xAB], &mut listener)
            .await
            .unwrap_err();

        assert!(matches!(err, AckError::Timeout { to: 3, attempts: 3, .. }));
        let sent = handle.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|f| f.id() == sent[0].id() && f.to() == NodeAddress(3)));
        assert!(start.elapsed() >= Duration::from_millis(9000));
        assert_eq!(layer.pending_id(), None);
        assert_eq!(stats.snapshot().ack_timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_fault_keeps_retrying() {
        let (mut layer, mut link, handle, stats) = setup(false, reliable(2, 3000));
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        handle.fail_polls(1);

        let err = layer
            .send_with_ack(&mut link, NodeAddress(3), vec![0xAB], &mut listener)
            .await
            .unwrap_err();

        assert!(matches!(err, AckError::Timeout { to: 3, attempts: 3, .. }));
        assert_eq!(handle.sent().len(), 3);
        let snap = stats.snapshot();
        assert_eq!(snap.link_errors, 1);
        assert_eq!(snap.ack_timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_fault_then_ack() {
        let (mut layer, mut link, handle, _) = setup(false, reliable(2, 3000));
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        handle.fail_polls(1);
        handle.respond_with(|frame| vec![Frame::ack_for(frame, frame.to())]);

        let ack = layer
            .send_with_ack(&mut link, NodeAddress(3), vec![1], &mut listener)
            .await
            .unwrap();

        assert!(ack.acknowledged);
        assert_eq!(ack.attempts, 1);
        assert_eq!(handle.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_with_ack_zero_retries() {
        let (mut layer, mut link, handle, _) = setup(false, reliable(0, 100));
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        let err = layer
            .send_with_ack(&mut link, NodeAddress(3), vec![1], &mut listener)
            .await
            .unwrap_err();
        assert!(matches!(err, AckError::Timeout { attempts: 1, .. }));
        assert_eq!(handle.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_with_ack_acked_on_second_attempt() {
        let (mut layer, mut link, handle, stats) = setup(false, reliable(3, 200));
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        let mut transmissions = 0;
        handle.respond_with(move |frame| {
            transmissions += 1;
            if transmissions == 2 {
                vec![Frame::ack_for(frame, frame.to())]
            } else {
                Vec::new()
            }
        });

        let ack = layer
            .send_with_ack(&mut link, NodeAddress(3), vec![1], &mut listener)
            .await
            .unwrap();
        assert!(ack.acknowledged);
        assert_eq!(ack.attempts, 2);
        assert_eq!(ack.to, NodeAddress(3));
        assert_eq!(handle.sent().len(), 2);
        assert_eq!(stats.snapshot().acks_received, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_ack_does_not_match() {
        let (mut layer, mut link, handle, _) = setup(false, reliable(1, 200));
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        // Ack from the wrong node, then an ack with the wrong id
        handle.respond_with(|frame| {
            let wrong_node = Frame::ack_for(frame, NodeAddress(4));
            let wrong_id = Frame::new(
                frame.to(),
                frame.from(),
                frame.id().wrapping_add(1),
                FrameFlags::ACK,
                b"!".to_vec(),
            )
            .unwrap();
            vec![wrong_node, wrong_id]
        });

        let err = layer
            .send_with_ack(&mut link, NodeAddress(3), vec![1], &mut listener)
            .await
            .unwrap_err();
        assert!(matches!(err, AckError::Timeout { attempts: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_during_wait_goes_to_backlog() {
        let (mut layer, mut link, handle, _) = setup(false, reliable(3, 200));
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        let mut first = true;
        handle.respond_with(move |frame| {
            if !frame.is_ack() && first {
                first = false;
                // A sensor reading arrives before the ack
                vec![
                    data(7, 5, 40, &[0x10]),
                    Frame::ack_for(frame, frame.to()),
                ]
            } else {
                Vec::new()
            }
        });

        let ack = layer
            .send_with_ack(&mut link, NodeAddress(3), vec![1], &mut listener)
            .await
            .unwrap();
        assert_eq!(ack.attempts, 1);

        let backlog = layer.take_backlog();
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].from(), NodeAddress(7));
        assert!(layer.take_backlog().is_empty());

        // The parked frame was acked right away
        let acks: Vec<_> = handle.sent().into_iter().filter(|f| f.is_ack()).collect();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].to(), NodeAddress(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_sent_once() {
        let (mut layer, mut link, handle, _) = setup(false, reliable(3, 200));
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        let ack = layer
            .send_with_ack(&mut link, NodeAddress::BROADCAST, vec![1], &mut listener)
            .await
            .unwrap();
        assert!(!ack.acknowledged);
        assert_eq!(ack.attempts, 1);
        assert_eq!(handle.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_exchange() {
        let (mut layer, mut link, handle, _) = setup(false, reliable(5, 1000));
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            shutdown.trigger();
        };
        let (result, ()) = tokio::join!(
            layer.send_with_ack(&mut link, NodeAddress(3), vec![1], &mut listener),
            stopper
        );

        assert!(matches!(result, Err(AckError::Cancelled)));
        assert_eq!(handle.sent().len(), 2);
        assert_eq!(layer.pending_id(), None);
    }

    #[tokio::test]
    async fn test_ids_advance_and_wrap() {
        let (mut layer, mut link, handle, _) = setup(false, None);
        layer.last_id = 254;

        let first = layer.send(&mut link, NodeAddress(3), vec![]).unwrap();
        let second = layer.send(&mut link, NodeAddress(3), vec![]).unwrap();
        let third = layer.send(&mut link, NodeAddress(3), vec![]).unwrap();
        assert_eq!((first.id, second.id, third.id), (255, 0, 1));
        assert_eq!(handle.sent().len(), 3);
    }

    #[test]
    fn test_id_allocation_skips_pending() {
        let (mut layer, ..) = setup(false, None);
        layer.pending = Some(PendingAck {
            id: 1,
            to: NodeAddress(3),
            retries: 0,
            deadline: Instant::now(),
        });
        assert_eq!(layer.allocate_id(), 2);
    }

    #[test]
    fn test_from_config() {
        let mut radio = crate::config::GatewayConfig::example().radio;
        radio.node_id = 5;
        radio.reliable.enabled = true;
        radio.reliable.max_retries = 2;
        radio.reliable.retry_timeout_ms = 3000;

        let config = AddressingConfig::from_config(&radio);
        assert_eq!(config.local, NodeAddress(5));
        assert_eq!(
            config.reliable,
            Some(ReliableSettings {
                max_retries: 2,
                retry_timeout: Duration::from_millis(3000),
            })
        );

        radio.reliable.enabled = false;
        assert!(AddressingConfig::from_config(&radio).reliable.is_none());
    }
}
