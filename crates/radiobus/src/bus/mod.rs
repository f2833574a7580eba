// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message bus side of the gateway.
//!
//! [`BusPublisher`] owns the single bus connection. It connects lazily,
//! reconnects with bounded exponential backoff, and waits for the broker's
//! delivery confirmation where the qos level requires one. The wire client
//! behind it is a [`BusClient`]: [`MqttBusClient`] for a real broker,
//! [`MemoryBus`] for tests.

mod memory;
mod mqtt;

pub use memory::{MemoryBus, MemoryBusHandle, PublishedMessage};
pub use mqtt::MqttBusClient;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::MqttConfig;
use crate::error::BusError;
use crate::frame::NodeAddress;
use crate::shutdown::ShutdownListener;
use crate::stats::GatewayStats;

/// Derive the bus topic for a sender: `<prefix>/<from>`.
///
/// A trailing `/` on the prefix is not doubled.
pub fn topic_for(prefix: &str, from: NodeAddress) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), from)
}

/// Bus delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BusQos {
    /// Fire and forget
    AtMostOnce,
    /// Confirmed by PUBACK
    AtLeastOnce,
    /// Confirmed by PUBCOMP
    ExactlyOnce,
}

impl BusQos {
    /// Whether the broker confirms delivery at this level.
    pub fn is_confirmed(self) -> bool {
        !matches!(self, Self::AtMostOnce)
    }
}

impl TryFrom<u8> for BusQos {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(format!("invalid qos level {} (expected 0, 1 or 2)", other)),
        }
    }
}

impl From<BusQos> for u8 {
    fn from(qos: BusQos) -> Self {
        match qos {
            BusQos::AtMostOnce => 0,
            BusQos::AtLeastOnce => 1,
            BusQos::ExactlyOnce => 2,
        }
    }
}

impl fmt::Display for BusQos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Wire client for the message bus.
///
/// Implementations only perform single operations; retry policy lives in
/// [`BusPublisher`].
pub trait BusClient: Send {
    /// Open a fresh session with the broker (one attempt).
    fn connect(&mut self) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Publish one non-retained message and wait for the confirmation the
    /// qos level requires.
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: BusQos,
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Close the session.
    fn disconnect(&mut self) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Whether the session is believed to be alive.
    fn is_connected(&self) -> bool;
}

/// Bus connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Exponential reconnect delay: `base * 2^(attempt - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub base: Duration,
    /// Delay ceiling.
    pub max: Duration,
}

impl Backoff {
    /// Create a backoff policy.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max)
    }
}

/// Publisher settings.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Connect attempts per `ensure_connected` call.
    pub connect_attempts: u32,
    /// Delay between attempts.
    pub backoff: Backoff,
    /// Wait for broker confirmation.
    pub delivery_timeout: Duration,
}

impl PublisherConfig {
    /// Derive publisher settings from the `[mqtt]` section.
    pub fn from_mqtt(config: &MqttConfig) -> Self {
        Self {
            connect_attempts: config.connect_attempts,
            backoff: Backoff::new(
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_max_ms),
            ),
            delivery_timeout: Duration::from_millis(config.delivery_timeout_ms),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 5,
            backoff: Backoff::new(Duration::from_millis(500), Duration::from_secs(30)),
            delivery_timeout: Duration::from_secs(10),
        }
    }
}

/// Owner of the bus connection.
pub struct BusPublisher<C: BusClient> {
    client: C,
    config: PublisherConfig,
    state: ConnectionState,
    stats: Arc<GatewayStats>,
    shutdown: ShutdownListener,
}

impl<C: BusClient> BusPublisher<C> {
    /// Create a disconnected publisher.
    pub fn new(
        client: C,
        config: PublisherConfig,
        stats: Arc<GatewayStats>,
        shutdown: ShutdownListener,
    ) -> Self {
        Self {
            client,
            config,
            state: ConnectionState::Disconnected,
            stats,
            shutdown,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Make sure a session is open, connecting with backoff if needed.
    ///
    /// No-op when already connected.
    pub async fn ensure_connected(&mut self) -> Result<(), BusError> {
        if self.state == ConnectionState::Connected {
            if self.client.is_connected() {
                return Ok(());
            }
            tracing::warn!("Bus connection lost, reconnecting");
        }

        self.state = ConnectionState::Connecting;
        let attempts = self.config.connect_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if self.shutdown.is_triggered() {
                self.state = ConnectionState::Disconnected;
                return Err(BusError::Cancelled);
            }

            tracing::info!(attempt, max_attempts = attempts, "Connecting to broker");
            self.stats.record_connect_attempt();

            match self.client.connect().await {
                Ok(()) => {
                    self.state = ConnectionState::Connected;
                    self.stats.record_connected();
                    tracing::info!(attempt, "Connected to broker");
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(attempt, max_attempts = attempts, error = %err, "Connect failed");
                    last_error = err.to_string();
                }
            }

            if attempt < attempts {
                let delay = self.config.backoff.delay(attempt);
                tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.shutdown.triggered() => {
                        self.state = ConnectionState::Disconnected;
                        return Err(BusError::Cancelled);
                    }
                }
            }
        }

        self.state = ConnectionState::Disconnected;
        Err(BusError::Connect {
            attempts,
            reason: last_error,
        })
    }

    /// Publish one message (retain = false).
    ///
    /// Connects first if needed. Does not retry the message on failure.
    pub async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: BusQos,
    ) -> Result<(), BusError> {
        self.ensure_connected().await?;

        let timeout = self.config.delivery_timeout;
        let result = tokio::select! {
            biased;
            _ = self.shutdown.triggered() => Err(BusError::Cancelled),
            res = tokio::time::timeout(timeout, self.client.publish(topic, payload, qos)) => {
                match res {
                    Ok(res) => res,
                    Err(_) => Err(BusError::DeliveryTimeout {
                        topic: topic.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            }
        };

        match result {
            Ok(()) => {
                self.stats.record_published(payload.len());
                tracing::debug!(topic, qos = %qos, bytes = payload.len(), "Published");
                Ok(())
            }
            Err(err) => {
                // A missing confirmation usually means a dead session
                if matches!(err, BusError::DeliveryTimeout { .. }) || !self.client.is_connected() {
                    self.state = ConnectionState::Disconnected;
                }
                Err(err)
            }
        }
    }

    /// Close the connection. Safe to call in any state.
    pub async fn disconnect(&mut self) {
        if self.state != ConnectionState::Disconnected || self.client.is_connected() {
            match self.client.disconnect().await {
                Ok(()) => tracing::info!("Disconnected from broker"),
                Err(err) => tracing::warn!(error = %err, "Disconnect failed"),
            }
        }
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Shutdown;

    fn publisher(bus: MemoryBus, shutdown: &Shutdown) -> (BusPublisher<MemoryBus>, Arc<GatewayStats>) {
        let stats = Arc::new(GatewayStats::new());
        let config = PublisherConfig {
            connect_attempts: 3,
            backoff: Backoff::new(Duration::from_millis(500), Duration::from_secs(5)),
            delivery_timeout: Duration::from_secs(1),
        };
        (
            BusPublisher::new(bus, config, stats.clone(), shutdown.listener()),
            stats,
        )
    }

    #[test]
    fn test_topic_for() {
        assert_eq!(topic_for("gw", NodeAddress(3)), "gw/3");
        assert_eq!(topic_for("gw/", NodeAddress(3)), "gw/3");
        assert_eq!(topic_for("site/lora", NodeAddress(200)), "site/lora/200");
        assert_eq!(
            topic_for("gw", NodeAddress(3)),
            topic_for("gw", NodeAddress(3))
        );
    }

    #[test]
    fn test_qos_conversion() {
        assert_eq!(BusQos::try_from(0).unwrap(), BusQos::AtMostOnce);
        assert_eq!(BusQos::try_from(2).unwrap(), BusQos::ExactlyOnce);
        assert!(BusQos::try_from(3).is_err());
        assert_eq!(u8::from(BusQos::AtLeastOnce), 1);
        assert!(!BusQos::AtMostOnce.is_confirmed());
        assert!(BusQos::ExactlyOnce.is_confirmed());
    }

    #[test]
    fn test_backoff_delay() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1000));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
        assert_eq!(backoff.delay(5), Duration::from_millis(1000));
        assert_eq!(backoff.delay(100), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_connects_first_and_once() {
        let shutdown = Shutdown::new();
        let bus = MemoryBus::new();
        let handle = bus.handle();
        let (mut publisher, _) = publisher(bus, &shutdown);

        assert_eq!(publisher.state(), ConnectionState::Disconnected);
        publisher
            .publish("gw/3", &[1, 2], BusQos::AtLeastOnce)
            .await
            .expect("publish");
        assert_eq!(publisher.state(), ConnectionState::Connected);
        assert_eq!(handle.connect_calls(), 1);

        publisher
            .publish("gw/4", &[3], BusQos::AtLeastOnce)
            .await
            .expect("publish");
        assert_eq!(handle.connect_calls(), 1);
        assert_eq!(handle.published().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_backoff_then_success() {
        let shutdown = Shutdown::new();
        let bus = MemoryBus::new();
        let handle = bus.handle();
        handle.fail_next_connects(2);
        let (mut publisher, stats) = publisher(bus, &shutdown);

        let start = tokio::time::Instant::now();
        publisher.ensure_connected().await.expect("third attempt");

        assert_eq!(handle.connect_calls(), 3);
        // 500 ms after the first failure, 1000 ms after the second
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1600), "elapsed {:?}", elapsed);
        assert_eq!(stats.snapshot().connect_attempts, 3);
        assert_eq!(stats.snapshot().connections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_exhausted() {
        let shutdown = Shutdown::new();
        let bus = MemoryBus::new();
        let handle = bus.handle();
        handle.set_reachable(false);
        let (mut publisher, _) = publisher(bus, &shutdown);

        let err = publisher
            .publish("gw/1", &[0], BusQos::AtMostOnce)
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Connect { attempts: 3, .. }));
        assert_eq!(publisher.state(), ConnectionState::Disconnected);
        assert!(handle.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_connection_is_repaired_lazily() {
        let shutdown = Shutdown::new();
        let bus = MemoryBus::new();
        let handle = bus.handle();
        let (mut publisher, _) = publisher(bus, &shutdown);

        publisher.ensure_connected().await.unwrap();
        handle.drop_connection();
        assert_eq!(handle.connect_calls(), 1);

        publisher
            .publish("gw/1", &[9], BusQos::AtLeastOnce)
            .await
            .unwrap();
        assert_eq!(handle.connect_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_timeout_marks_disconnected() {
        let shutdown = Shutdown::new();
        let bus = MemoryBus::new();
        let handle = bus.handle();
        handle.set_ack_delay(Some(Duration::from_secs(5)));
        let (mut publisher, stats) = publisher(bus, &shutdown);

        let err = publisher
            .publish("gw/1", &[1], BusQos::AtLeastOnce)
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::DeliveryTimeout { timeout_ms: 1000, .. }));
        assert_eq!(publisher.state(), ConnectionState::Disconnected);
        assert_eq!(stats.snapshot().messages_published, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_publish_keeps_session() {
        let shutdown = Shutdown::new();
        let bus = MemoryBus::new();
        let handle = bus.handle();
        let (mut publisher, _) = publisher(bus, &shutdown);

        handle.reject_publishes(true);
        assert!(matches!(
            publisher.publish("gw/1", &[1], BusQos::AtLeastOnce).await,
            Err(BusError::Publish { .. })
        ));
        assert_eq!(publisher.state(), ConnectionState::Connected);

        handle.reject_publishes(false);
        publisher
            .publish("gw/1", &[1], BusQos::AtLeastOnce)
            .await
            .unwrap();
        assert_eq!(handle.connect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_backoff() {
        let shutdown = Shutdown::new();
        let bus = MemoryBus::new();
        bus.handle().set_reachable(false);
        let (mut publisher, _) = publisher(bus, &shutdown);

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.trigger();
        };
        let (result, ()) = tokio::join!(publisher.ensure_connected(), stopper);

        assert!(matches!(result, Err(BusError::Cancelled)));
        assert_eq!(publisher.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_closes_session() {
        let shutdown = Shutdown::new();
        let bus = MemoryBus::new();
        let handle = bus.handle();
        let (mut publisher, _) = publisher(bus, &shutdown);

        publisher.ensure_connected().await.unwrap();
        assert!(handle.is_connected());

        publisher.disconnect().await;
        assert!(!handle.is_connected());
        assert_eq!(publisher.state(), ConnectionState::Disconnected);

        // Idempotent
        publisher.disconnect().await;
        assert_eq!(handle.disconnect_calls(), 1);
    }
}
