// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the gateway.
//!
//! Each layer has its own error enum. Only [`LinkError`] during radio
//! initialization and [`ConfigError`] abort startup; everything else is
//! logged, counted and recovered by the gateway loop.

use thiserror::Error;

pub use crate::config::ConfigError;

/// Radio link errors.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Radio initialization failed: {0}")]
    Init(String),

    #[error("No frame available")]
    NoFrame,

    #[error("Malformed frame: {len} bytes is shorter than the {header} byte header")]
    Malformed { len: usize, header: usize },

    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Transmit failed: {0}")]
    Transmit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome errors of a reliable-mode exchange.
#[derive(Debug, Error)]
pub enum AckError {
    #[error("No ack for frame {id} to node {to} after {attempts} transmissions")]
    Timeout { id: u8, to: u8, attempts: u32 },

    #[error("Exchange abandoned on shutdown")]
    Cancelled,

    #[error("Link error: {0}")]
    Link(#[from] LinkError),
}

/// Message bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Broker unreachable after {attempts} attempts: {reason}")]
    Connect { attempts: u32, reason: String },

    #[error("Publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("No delivery confirmation for '{topic}' within {timeout_ms} ms")]
    DeliveryTimeout { topic: String, timeout_ms: u64 },

    #[error("Not connected")]
    NotConnected,

    #[error("Interrupted by shutdown")]
    Cancelled,
}

/// Top-level gateway error.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Radio link error: {0}")]
    Link(#[from] LinkError),

    #[error("Reliable delivery error: {0}")]
    Ack(#[from] AckError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Gateway stopped")]
    Stopped,
}

/// Result alias used by the gateway loop and its handle.
pub type Result<T> = std::result::Result<T, GatewayError>;
