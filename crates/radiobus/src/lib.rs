// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # radiobus
//!
//! Packet-radio to MQTT gateway.
//!
//! Addressed radio datagrams (4-byte header `to`, `from`, `id`, `flags` plus
//! up to 251 payload bytes) are filtered for the local node, optionally
//! acknowledged over the radio, and republished on an MQTT broker under
//! `<prefix>/<from>`.
//!
//! ## Architecture
//!
//! ```text
//! RadioDriver -> RadioLink -> AddressingLayer -> queue -> BusPublisher -> BusClient
//!                  (frames)    (filter, acks,              (connect, backoff,
//!                              dedupe, retries)             confirmation)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use radiobus::{Gateway, GatewayConfig, MqttBusClient, UdpRadio};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_file("radiobus.toml")?;
//! let radio = UdpRadio::from_config(&config.radio.udp);
//! let bus = MqttBusClient::new(&config.mqtt)?;
//!
//! let gateway = Gateway::new(&config, radio, bus)?;
//! let handle = gateway.handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     handle.shutdown();
//! });
//! gateway.run().await;
//! # Ok(())
//! # }
//! ```

pub mod addressing;
pub mod bus;
pub mod config;
pub mod error;
pub mod frame;
pub mod gateway;
pub mod radio;
pub mod shutdown;
pub mod stats;

pub use addressing::{Ack, AddressingConfig, AddressingLayer, Inbound, ReliableSettings};
pub use bus::{
    topic_for, Backoff, BusClient, BusPublisher, BusQos, ConnectionState, MemoryBus,
    MemoryBusHandle, MqttBusClient, PublishedMessage, PublisherConfig,
};
pub use config::{ConfigError, GatewayConfig};
pub use error::{AckError, BusError, GatewayError, LinkError};
pub use frame::{Frame, FrameFlags, NodeAddress};
pub use gateway::{Gateway, GatewayHandle, GatewaySettings};
pub use radio::{
    LinkConfig, LogIndicator, MemoryRadio, MemoryRadioHandle, NoIndicator, RadioDriver,
    RadioLink, RadioSettings, StatusIndicator, UdpRadio,
};
pub use shutdown::{Shutdown, ShutdownListener};
pub use stats::{GatewayStats, StatsSnapshot};
