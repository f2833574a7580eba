// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway control loop
//!
//! Two futures joined on one task:
//!
//! ```text
//! radio task:  Idle -> Polling -> FrameReady -> Routed -> Idle
//!                 \______ transmit request ______/
//!                        |
//!                  bounded queue (frames)
//!                        v
//! publish task:  recv -> topic -> BusPublisher::publish
//! ```
//!
//! The radio task never waits on the bus: a full queue drops the frame
//! after `enqueue_timeout`. Both tasks stop on the shared shutdown signal;
//! frames still queued at that point are counted as dropped and the bus
//! connection is always closed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::addressing::{Ack, AddressingConfig, AddressingLayer, Inbound};
use crate::bus::{topic_for, BusClient, BusPublisher, BusQos, PublisherConfig};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::frame::{Frame, NodeAddress};
use crate::radio::{LinkConfig, RadioDriver, RadioLink, StatusIndicator};
use crate::shutdown::{Shutdown, ShutdownListener};
use crate::stats::{GatewayStats, StatsSnapshot};

/// Longest a single poll waits before the loop goes back to Idle.
const POLL_SLICE: Duration = Duration::from_millis(50);

/// Outstanding transmit requests.
const REQUEST_QUEUE: usize = 8;

/// Loop settings.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Topic prefix for published messages
    pub topic_prefix: String,
    /// Delivery guarantee for published messages
    pub qos: BusQos,
    /// Frames buffered between radio and publisher
    pub queue_capacity: usize,
    /// Wait for queue space before dropping a frame
    pub enqueue_timeout: Duration,
    /// Periodic statistics summary, `None` to disable
    pub stats_interval: Option<Duration>,
}

impl GatewaySettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let stats_interval = (config.gateway.enable_stats && config.gateway.stats_interval_secs > 0)
            .then(|| Duration::from_secs(config.gateway.stats_interval_secs));

        Self {
            topic_prefix: config.mqtt.topic.clone(),
            qos: config.mqtt.qos,
            queue_capacity: config.gateway.queue_capacity.max(1),
            enqueue_timeout: Duration::from_millis(config.gateway.enqueue_timeout_ms),
            stats_interval,
        }
    }
}

struct TransmitRequest {
    to: NodeAddress,
    payload: Vec<u8>,
    reply: oneshot::Sender<Result<Ack>>,
}

/// Handle to a gateway, usable from other tasks.
#[derive(Clone)]
pub struct GatewayHandle {
    requests: mpsc::Sender<TransmitRequest>,
    stats: Arc<GatewayStats>,
    shutdown: Arc<Shutdown>,
}

impl GatewayHandle {
    /// Send a payload over the radio.
    ///
    /// In reliable mode this waits for the peer's ack (or the retry budget);
    /// otherwise the frame is sent once.
    pub async fn transmit(&self, to: NodeAddress, payload: Vec<u8>) -> Result<Ack> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(TransmitRequest { to, payload, reply })
            .await
            .map_err(|_| GatewayError::Stopped)?;
        response.await.map_err(|_| GatewayError::Stopped)?
    }

    /// Current statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Ask the gateway to stop.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Whether shutdown has not been requested yet.
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_triggered()
    }
}

/// Radio to bus gateway.
pub struct Gateway<D: RadioDriver, C: BusClient> {
    link: RadioLink<D>,
    addressing: AddressingLayer,
    publisher: BusPublisher<C>,
    settings: GatewaySettings,
    stats: Arc<GatewayStats>,
    shutdown: Arc<Shutdown>,
    requests_tx: mpsc::Sender<TransmitRequest>,
    requests_rx: mpsc::Receiver<TransmitRequest>,
}

impl<D: RadioDriver, C: BusClient> Gateway<D, C> {
    /// Validate the configuration and open the radio.
    ///
    /// The bus is not contacted until the first message is published.
    pub fn new(config: &GatewayConfig, driver: D, client: C) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(GatewayStats::new());
        let shutdown = Arc::new(Shutdown::new());

        let link = RadioLink::open(
            driver,
            &LinkConfig::from_config(&config.radio),
            stats.clone(),
        )?;
        let addressing =
            AddressingLayer::new(AddressingConfig::from_config(&config.radio), stats.clone());
        let publisher = BusPublisher::new(
            client,
            PublisherConfig::from_mqtt(&config.mqtt),
            stats.clone(),
            shutdown.listener(),
        );
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE);

        Ok(Self {
            link,
            addressing,
            publisher,
            settings: GatewaySettings::from_config(config),
            stats,
            shutdown,
            requests_tx,
            requests_rx,
        })
    }

    /// Use `indicator` to show radio activity.
    pub fn with_indicator(mut self, indicator: impl StatusIndicator + 'static) -> Self {
        self.link.set_indicator(Box::new(indicator));
        self
    }

    /// Get a handle for transmit requests, statistics and shutdown.
    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            requests: self.requests_tx.clone(),
            stats: self.stats.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Shared statistics.
    pub fn stats(&self) -> Arc<GatewayStats> {
        self.stats.clone()
    }

    /// Run until shutdown. Returns the final statistics.
    pub async fn run(self) -> StatsSnapshot {
        let Self {
            link,
            addressing,
            publisher,
            settings,
            stats,
            shutdown,
            requests_tx,
            requests_rx,
        } = self;
        // Only handles keep the request channel open from here on
        drop(requests_tx);

        tracing::info!(
            node = %addressing.local(),
            reliable = addressing.is_reliable(),
            topic = %settings.topic_prefix,
            qos = %settings.qos,
            "Gateway started"
        );

        let (frames_tx, frames_rx) = mpsc::channel(settings.queue_capacity);

        let radio = RadioTask {
            link,
            addressing,
            frames: frames_tx,
            requests: requests_rx,
            shutdown: shutdown.listener(),
            stats: stats.clone(),
            enqueue_timeout: settings.enqueue_timeout,
            stats_interval: settings.stats_interval,
        };
        let bus = PublishTask {
            publisher,
            frames: frames_rx,
            shutdown: shutdown.listener(),
            stats: stats.clone(),
            topic_prefix: settings.topic_prefix,
            qos: settings.qos,
        };

        tokio::join!(radio.run(), bus.run());

        tracing::info!("Gateway stopped\n{}", stats.format_summary());
        stats.snapshot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Idle,
    Polling,
    FrameReady,
    Routed,
    Shutdown,
}

struct RadioTask<D: RadioDriver> {
    link: RadioLink<D>,
    addressing: AddressingLayer,
    frames: mpsc::Sender<Frame>,
    requests: mpsc::Receiver<TransmitRequest>,
    shutdown: ShutdownListener,
    stats: Arc<GatewayStats>,
    enqueue_timeout: Duration,
    stats_interval: Option<Duration>,
}

impl<D: RadioDriver> RadioTask<D> {
    async fn run(mut self) {
        let mut state = LoopState::Idle;
        let mut last_report = Instant::now();

        while state != LoopState::Shutdown {
            state = match state {
                LoopState::Idle => self.idle(&mut last_report).await,
                LoopState::Polling => self.poll().await,
                LoopState::FrameReady => self.route().await,
                LoopState::Routed | LoopState::Shutdown => LoopState::Idle,
            };
        }

        // Parked frames were already acked, so the sender will not repeat them
        let parked = self.addressing.take_backlog();
        if !parked.is_empty() {
            for _ in &parked {
                self.stats.record_queue_drop();
            }
            tracing::warn!(dropped = parked.len(), "Parked frames dropped on shutdown");
        }

        // Pending requests see GatewayError::Stopped
        self.requests.close();
        self.link.close();
        tracing::debug!("Radio task stopped");
    }

    async fn idle(&mut self, last_report: &mut Instant) -> LoopState {
        if self.shutdown.is_triggered() {
            return LoopState::Shutdown;
        }

        self.link.refresh_indicator();

        for frame in self.addressing.take_backlog() {
            self.enqueue(frame).await;
        }

        if let Some(interval) = self.stats_interval {
            if last_report.elapsed() >= interval {
                tracing::info!("{}", self.stats.format_summary());
                *last_report = Instant::now();
            }
        }

        LoopState::Polling
    }

    async fn poll(&mut self) -> LoopState {
        tokio::select! {
            biased;
            _ = self.shutdown.triggered() => LoopState::Shutdown,
            Some(request) = self.requests.recv() => {
                self.serve(request).await;
                LoopState::Idle
            }
            ready = self.link.poll_or_wait(POLL_SLICE) => match ready {
                Ok(true) => LoopState::FrameReady,
                Ok(false) => LoopState::Idle,
                Err(err) => {
                    tracing::warn!(error = %err, "Radio poll failed");
                    tokio::select! {
                        biased;
                        _ = self.shutdown.triggered() => LoopState::Shutdown,
                        _ = tokio::time::sleep(self.link.poll_interval()) => LoopState::Idle,
                    }
                }
            },
        }
    }

    async fn route(&mut self) -> LoopState {
        let frame = match self.link.receive() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "Receive failed");
                return LoopState::Idle;
            }
        };

        if let Inbound::Deliver(frame) = self.addressing.ingest(&mut self.link, frame) {
            tracing::debug!(
                from = %frame.from(),
                to = %frame.to(),
                id = frame.id(),
                rssi = frame.rssi(),
                "Frame accepted"
            );
            self.enqueue(frame).await;
        }
        LoopState::Routed
    }

    async fn enqueue(&mut self, frame: Frame) {
        match self.frames.send_timeout(frame, self.enqueue_timeout).await {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(frame) | SendTimeoutError::Closed(frame)) => {
                self.stats.record_queue_drop();
                tracing::warn!(
                    from = %frame.from(),
                    id = frame.id(),
                    "Publish queue full, frame dropped"
                );
            }
        }
    }

    async fn serve(&mut self, request: TransmitRequest) {
        let TransmitRequest { to, payload, reply } = request;

        let result = if self.addressing.is_reliable() {
            self.addressing
                .send_with_ack(&mut self.link, to, payload, &mut self.shutdown)
                .await
                .map_err(GatewayError::from)
        } else {
            self.addressing
                .send(&mut self.link, to, payload)
                .map_err(GatewayError::from)
        };

        match &result {
            Ok(ack) => tracing::debug!(to = %to, id = ack.id, attempts = ack.attempts, "Transmitted"),
            Err(err) => tracing::debug!(to = %to, error = %err, "Transmit failed"),
        }
        // The requester may have given up waiting
        let _ = reply.send(result);
    }
}

struct PublishTask<C: BusClient> {
    publisher: BusPublisher<C>,
    frames: mpsc::Receiver<Frame>,
    shutdown: ShutdownListener,
    stats: Arc<GatewayStats>,
    topic_prefix: String,
    qos: BusQos,
}

impl<C: BusClient> PublishTask<C> {
    async fn run(mut self) {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => break,
                frame = self.frames.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            self.publish(frame).await;
        }

        self.frames.close();
        let mut dropped = 0u64;
        while self.frames.try_recv().is_ok() {
            self.stats.record_queue_drop();
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!(dropped, "Queued frames dropped on shutdown");
        }

        self.publisher.disconnect().await;
        tracing::debug!("Publish task stopped");
    }

    async fn publish(&mut self, frame: Frame) {
        let topic = topic_for(&self.topic_prefix, frame.from());

        match self.publisher.publish(&topic, frame.payload(), self.qos).await {
            Ok(()) => tracing::info!(
                topic = %topic,
                from = %frame.from(),
                id = frame.id(),
                rssi = frame.rssi(),
                bytes = frame.payload().len(),
                "Message published"
            ),
            Err(err) => {
                self.stats.record_publish_failure();
                tracing::warn!(
                    topic = %topic,
                    from = %frame.from(),
                    id = frame.id(),
                    error = %err,
                    "Message dropped"
                );
            }
        }
    }
}
