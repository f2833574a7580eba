// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process bus client
//!
//! Records published messages instead of sending them. The paired
//! [`MemoryBusHandle`] injects failures (unreachable broker, dropped
//! session, rejected or slow publishes) and inspects what was sent.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{BusClient, BusQos};
use crate::error::BusError;

/// A message accepted by the in-process bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: BusQos,
    pub retain: bool,
}

#[derive(Debug)]
struct BusState {
    reachable: bool,
    failing_connects: u32,
    connected: bool,
    reject_publishes: bool,
    ack_delay: Option<Duration>,
    connect_calls: u32,
    disconnect_calls: u32,
    published: Vec<PublishedMessage>,
}

impl Default for BusState {
    fn default() -> Self {
        Self {
            reachable: true,
            failing_connects: 0,
            connected: false,
            reject_publishes: false,
            ack_delay: None,
            connect_calls: 0,
            disconnect_calls: 0,
            published: Vec::new(),
        }
    }
}

/// In-process [`BusClient`].
#[derive(Debug, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl MemoryBus {
    /// Create a reachable bus with no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for injecting failures and reading results.
    pub fn handle(&self) -> MemoryBusHandle {
        MemoryBusHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<BusState>) -> MutexGuard<'_, BusState> {
    // A panicking test thread must not hide the recorded state
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BusClient for MemoryBus {
    async fn connect(&mut self) -> Result<(), BusError> {
        let mut state = self.lock();
        state.connect_calls += 1;

        if !state.reachable {
            return Err(BusError::Connect {
                attempts: 1,
                reason: "connection refused".into(),
            });
        }
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(BusError::Connect {
                attempts: 1,
                reason: "connection refused".into(),
            });
        }

        state.connected = true;
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], qos: BusQos) -> Result<(), BusError> {
        let ack_delay = {
            let mut state = self.lock();
            if !state.connected {
                return Err(BusError::NotConnected);
            }
            if state.reject_publishes {
                return Err(BusError::Publish {
                    topic: topic.to_string(),
                    reason: "rejected by broker".into(),
                });
            }
            state.published.push(PublishedMessage {
                topic: topic.to_string(),
                payload: payload.to_vec(),
                qos,
                retain: false,
            });
            state.ack_delay
        };

        if let (Some(delay), true) = (ack_delay, qos.is_confirmed()) {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BusError> {
        let mut state = self.lock();
        state.disconnect_calls += 1;
        state.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

/// Control and inspection handle for a [`MemoryBus`].
#[derive(Debug, Clone)]
pub struct MemoryBusHandle {
    state: Arc<Mutex<BusState>>,
}

impl MemoryBusHandle {
    /// Make the broker reachable or unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        lock(&self.state).reachable = reachable;
    }

    /// Refuse the next `count` connect attempts.
    pub fn fail_next_connects(&self, count: u32) {
        lock(&self.state).failing_connects = count;
    }

    /// Drop the current session as a broker or network failure would.
    pub fn drop_connection(&self) {
        lock(&self.state).connected = false;
    }

    /// Reject publishes while the session stays up.
    pub fn reject_publishes(&self, reject: bool) {
        lock(&self.state).reject_publishes = reject;
    }

    /// Delay delivery confirmations for confirmed qos levels.
    pub fn set_ack_delay(&self, delay: Option<Duration>) {
        lock(&self.state).ack_delay = delay;
    }

    /// Connect attempts seen so far.
    pub fn connect_calls(&self) -> u32 {
        lock(&self.state).connect_calls
    }

    /// Disconnects seen so far.
    pub fn disconnect_calls(&self) -> u32 {
        lock(&self.state).disconnect_calls
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// Messages accepted so far.
    pub fn published(&self) -> Vec<PublishedMessage> {
        lock(&self.state).published.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_requires_session() {
        let mut bus = MemoryBus::new();
        let handle = bus.handle();

        assert!(matches!(
            bus.publish("t", &[1], BusQos::AtMostOnce).await,
            Err(BusError::NotConnected)
        ));

        bus.connect().await.unwrap();
        bus.publish("t", &[1], BusQos::AtMostOnce).await.unwrap();

        let published = handle.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "t");
        assert!(!published[0].retain);
    }

    #[tokio::test]
    async fn test_failing_connects_recover() {
        let mut bus = MemoryBus::new();
        bus.handle().fail_next_connects(1);

        assert!(bus.connect().await.is_err());
        assert!(bus.connect().await.is_ok());
        assert!(bus.is_connected());
        assert_eq!(bus.handle().connect_calls(), 2);
    }
}
