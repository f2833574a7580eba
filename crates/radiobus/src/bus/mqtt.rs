// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT bus client on top of `rumqttc`.
//!
//! The event loop is only driven while an operation is in progress; there
//! is no background task. A session that has been idle longer than the
//! keep-alive interval is reported as disconnected so the publisher opens a
//! fresh one instead of losing a message on a half-dead socket.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::time::Instant;

use super::{BusClient, BusQos};
use crate::config::{ConfigError, MqttConfig};
use crate::error::BusError;

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 16;

/// Upper bound for the DISCONNECT flush.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

impl From<BusQos> for QoS {
    fn from(qos: BusQos) -> Self {
        match qos {
            BusQos::AtMostOnce => QoS::AtMostOnce,
            BusQos::AtLeastOnce => QoS::AtLeastOnce,
            BusQos::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

struct Session {
    client: AsyncClient,
    eventloop: EventLoop,
    last_activity: Instant,
}

/// MQTT implementation of [`BusClient`].
pub struct MqttBusClient {
    options: MqttOptions,
    keep_alive: Duration,
    connect_timeout: Duration,
    session: Option<Session>,
}

impl MqttBusClient {
    /// Build a client from the `[mqtt]` section. Does not connect.
    pub fn new(config: &MqttConfig) -> Result<Self, ConfigError> {
        let (host, port) = config.broker_host_port()?;

        let mut options = MqttOptions::new(config.client_id.clone(), host, port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);

        Ok(Self {
            options,
            keep_alive: config.keep_alive(),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            session: None,
        })
    }

    fn session_is_stale(&self, session: &Session) -> bool {
        !self.keep_alive.is_zero() && session.last_activity.elapsed() >= self.keep_alive
    }
}

impl BusClient for MqttBusClient {
    async fn connect(&mut self) -> Result<(), BusError> {
        // Any previous session is abandoned
        self.session = None;

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        let handshake = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        return if ack.code == ConnectReturnCode::Success {
                            Ok(())
                        } else {
                            Err(format!("broker refused connection: {:?}", ack.code))
                        };
                    }
                    Ok(_) => {}
                    Err(err) => return Err(err.to_string()),
                }
            }
        };

        match tokio::time::timeout(self.connect_timeout, handshake).await {
            Ok(Ok(())) => {
                self.session = Some(Session {
                    client,
                    eventloop,
                    last_activity: Instant::now(),
                });
                Ok(())
            }
            Ok(Err(reason)) => Err(BusError::Connect {
                attempts: 1,
                reason,
            }),
            Err(_) => Err(BusError::Connect {
                attempts: 1,
                reason: format!(
                    "no CONNACK within {} ms",
                    self.connect_timeout.as_millis()
                ),
            }),
        }
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], qos: BusQos) -> Result<(), BusError> {
        let publish_error = |reason: String| BusError::Publish {
            topic: topic.to_string(),
            reason,
        };

        let session = self.session.as_mut().ok_or(BusError::NotConnected)?;
        if let Err(err) = session
            .client
            .publish(topic, qos.into(), false, payload.to_vec())
            .await
        {
            self.session = None;
            return Err(publish_error(err.to_string()));
        }

        // Drive the event loop until the qos level's confirmation arrives
        let mut pkid = None;
        loop {
            match session.eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Publish(id))) if pkid.is_none() => {
                    session.last_activity = Instant::now();
                    if !qos.is_confirmed() {
                        return Ok(());
                    }
                    pkid = Some(id);
                }
                Ok(Event::Incoming(Packet::PubAck(ack)))
                    if qos == BusQos::AtLeastOnce && pkid == Some(ack.pkid) =>
                {
                    session.last_activity = Instant::now();
                    return Ok(());
                }
                Ok(Event::Incoming(Packet::PubComp(comp)))
                    if qos == BusQos::ExactlyOnce && pkid == Some(comp.pkid) =>
                {
                    session.last_activity = Instant::now();
                    return Ok(());
                }
                Ok(_) => {}
                Err(err) => {
                    self.session = None;
                    return Err(publish_error(err.to_string()));
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), BusError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        session
            .client
            .disconnect()
            .await
            .map_err(|err| BusError::Publish {
                topic: String::new(),
                reason: err.to_string(),
            })?;

        // Flush the DISCONNECT packet; the loop errors out once the socket closes
        let flush = async {
            loop {
                match session.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        let _ = tokio::time::timeout(DISCONNECT_TIMEOUT, flush).await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        match &self.session {
            Some(session) => !self.session_is_stale(session),
            None => false,
        }
    }
}
