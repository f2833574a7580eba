// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway configuration.
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! [mqtt]
//! broker = "tcp://localhost:1883"
//! client_id = "radiobus"
//! topic = "lora"
//! qos = 1
//!
//! [radio]
//! node_id = 1
//! frequency_mhz = 868.0
//! promiscuous = false
//!
//! [radio.reliable]
//! enabled = true
//! max_retries = 3
//! retry_timeout_ms = 200
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::bus::BusQos;
use crate::frame::NodeAddress;

/// Default MQTT port when the broker address omits one.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Message bus settings.
    pub mqtt: MqttConfig,

    /// Radio settings.
    pub radio: RadioConfig,

    /// Gateway loop settings.
    #[serde(default)]
    pub gateway: LoopConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Example configuration used by `gen-config`.
    pub fn example() -> Self {
        Self {
            mqtt: MqttConfig {
                broker: "tcp://localhost:1883".into(),
                client_id: "radiobus".into(),
                topic: "lora".into(),
                qos: BusQos::AtLeastOnce,
                keep_alive_secs: default_keep_alive(),
                connect_attempts: default_connect_attempts(),
                backoff_base_ms: default_backoff_base(),
                backoff_max_ms: default_backoff_max(),
                connect_timeout_ms: default_connect_timeout(),
                delivery_timeout_ms: default_delivery_timeout(),
            },
            radio: RadioConfig {
                node_id: 1,
                frequency_mhz: 868.0,
                tx_power_dbm: default_tx_power(),
                promiscuous: false,
                poll_interval_ms: default_poll_interval(),
                indicator_hold_ms: default_indicator_hold(),
                dedupe_window_ms: default_dedupe_window(),
                reliable: ReliableConfig::default(),
                udp: UdpLinkConfig::default(),
            },
            gateway: LoopConfig::default(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.validate()?;
        self.radio.validate()?;
        self.gateway.validate()
    }
}

/// MQTT connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address (`tcp://host:port`, `mqtt://host:port` or `host:port`).
    pub broker: String,

    /// Client identifier presented to the broker.
    pub client_id: String,

    /// Topic prefix; messages go to `<topic>/<from>`.
    pub topic: String,

    /// Quality of service for published messages (0, 1 or 2).
    #[serde(default = "default_qos")]
    pub qos: BusQos,

    /// Keep-alive interval (seconds).
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Connect attempts before a message is dropped.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// First reconnect delay (milliseconds); doubles per attempt.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Reconnect delay ceiling (milliseconds).
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,

    /// Timeout for a single connect attempt (milliseconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Wait for broker acknowledgement of a publish (milliseconds).
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_ms: u64,
}

impl MqttConfig {
    /// Split the broker address into host and port.
    pub fn broker_host_port(&self) -> Result<(String, u16), ConfigError> {
        parse_broker_address(&self.broker)
    }

    /// Keep-alive as a duration.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.broker_host_port()?;

        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid("mqtt.client_id is empty".into()));
        }
        if self.client_id.starts_with(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "mqtt.client_id starts with whitespace".into(),
            ));
        }
        if self.topic.trim_end_matches('/').is_empty() {
            return Err(ConfigError::Invalid("mqtt.topic is empty".into()));
        }
        if self.topic.contains(['+', '#']) {
            return Err(ConfigError::Invalid(format!(
                "mqtt.topic '{}' contains a wildcard",
                self.topic
            )));
        }
        if self.connect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "mqtt.connect_attempts must be at least 1".into(),
            ));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(ConfigError::Invalid(format!(
                "mqtt.backoff_base_ms ({}) exceeds mqtt.backoff_max_ms ({})",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }
        // Broker keep-alive is a 16-bit field
        if self.keep_alive_secs > u64::from(u16::MAX) {
            return Err(ConfigError::Invalid(format!(
                "mqtt.keep_alive_secs ({}) exceeds {}",
                self.keep_alive_secs,
                u16::MAX
            )));
        }

        Ok(())
    }
}

/// Radio settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Local node address (0-254).
    pub node_id: u8,

    /// Carrier frequency (MHz).
    pub frequency_mhz: f32,

    /// Transmit power (dBm).
    #[serde(default = "default_tx_power")]
    pub tx_power_dbm: i8,

    /// Accept frames addressed to any node.
    #[serde(default)]
    pub promiscuous: bool,

    /// Sleep between radio polls (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long the status indicator stays on after a frame (milliseconds).
    #[serde(default = "default_indicator_hold")]
    pub indicator_hold_ms: u64,

    /// Retention window for `(from, id)` duplicate detection (milliseconds).
    #[serde(default = "default_dedupe_window")]
    pub dedupe_window_ms: u64,

    /// Ack/retry protocol.
    #[serde(default)]
    pub reliable: ReliableConfig,

    /// Simulated link used by the host build.
    #[serde(default)]
    pub udp: UdpLinkConfig,
}

impl RadioConfig {
    /// Local node address.
    pub fn local_address(&self) -> NodeAddress {
        NodeAddress(self.node_id)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.local_address().is_broadcast() {
            return Err(ConfigError::Invalid(
                "radio.node_id 255 is the broadcast address".into(),
            ));
        }
        if !(137.0..=1020.0).contains(&self.frequency_mhz) {
            return Err(ConfigError::Invalid(format!(
                "radio.frequency_mhz {} outside 137-1020 MHz",
                self.frequency_mhz
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "radio.poll_interval_ms must be at least 1".into(),
            ));
        }
        if self.reliable.enabled && self.reliable.retry_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "radio.reliable.retry_timeout_ms must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

/// Reliable-mode (ack/retry) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliableConfig {
    /// Enable acknowledgements and retransmission.
    #[serde(default)]
    pub enabled: bool,

    /// Retransmissions after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,

    /// Wait for an ack before retransmitting (milliseconds).
    #[serde(default = "default_retry_timeout")]
    pub retry_timeout_ms: u64,
}

impl Default for ReliableConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: default_max_retries(),
            retry_timeout_ms: default_retry_timeout(),
        }
    }
}

/// UDP socket pair standing in for the radio on a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpLinkConfig {
    /// Local bind address.
    #[serde(default = "default_udp_bind")]
    pub bind: SocketAddr,

    /// Where transmitted frames are sent.
    #[serde(default = "default_udp_peer")]
    pub peer: SocketAddr,
}

impl Default for UdpLinkConfig {
    fn default() -> Self {
        Self {
            bind: default_udp_bind(),
            peer: default_udp_peer(),
        }
    }
}

/// Gateway loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Frames buffered between the radio and the publisher.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Wait for queue space before dropping a frame (milliseconds).
    #[serde(default = "default_enqueue_timeout")]
    pub enqueue_timeout_ms: u64,

    /// Enable periodic statistics logging.
    #[serde(default = "default_true")]
    pub enable_stats: bool,

    /// Statistics logging interval (seconds).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            enqueue_timeout_ms: default_enqueue_timeout(),
            enable_stats: true,
            stats_interval_secs: default_stats_interval(),
            log_level: default_log_level(),
        }
    }
}

impl LoopConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "gateway.queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Split `tcp://host:port`, `mqtt://host:port` or `host:port` into parts.
pub fn parse_broker_address(addr: &str) -> Result<(String, u16), ConfigError> {
    let rest = match addr.split_once("://") {
        Some(("tcp" | "mqtt", rest)) => rest,
        Some((scheme, _)) => {
            return Err(ConfigError::Invalid(format!(
                "unsupported broker scheme '{}'",
                scheme
            )))
        }
        None => addr,
    };
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                ConfigError::Invalid(format!("invalid broker port in '{}'", addr))
            })?;
            (host, port)
        }
        None => (rest, DEFAULT_MQTT_PORT),
    };

    if host.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "missing broker host in '{}'",
            addr
        )));
    }

    Ok((host.to_string(), port))
}

fn default_qos() -> BusQos {
    BusQos::AtLeastOnce
}

fn default_keep_alive() -> u64 {
    1200
}

fn default_connect_attempts() -> u32 {
    5
}

fn default_backoff_base() -> u64 {
    500
}

fn default_backoff_max() -> u64 {
    30_000
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_delivery_timeout() -> u64 {
    10_000
}

fn default_tx_power() -> i8 {
    14
}

fn default_poll_interval() -> u64 {
    5
}

fn default_indicator_hold() -> u64 {
    200
}

fn default_dedupe_window() -> u64 {
    10_000
}

fn default_max_retries() -> u8 {
    3
}

fn default_retry_timeout() -> u64 {
    200
}

fn default_udp_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7700))
}

fn default_udp_peer() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7701))
}

fn default_queue_capacity() -> usize {
    32
}

fn default_enqueue_timeout() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_stats_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}
