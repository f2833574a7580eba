// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP radio driver for host runs
//!
//! Each UDP datagram carries one raw radio packet (header + payload).
//! Point two gateways (or a gateway and a test sender) at each other to
//! simulate a shared channel.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use super::{RadioDriver, RadioSettings};
use crate::config::UdpLinkConfig;
use crate::error::LinkError;
use crate::frame::MAX_FRAME_LEN;

/// [`RadioDriver`] over a non-blocking UDP socket.
#[derive(Debug)]
pub struct UdpRadio {
    bind: SocketAddr,
    peer: SocketAddr,
    socket: Option<UdpSocket>,
    /// Datagram read by `available` and not yet handed out
    pending: Option<Vec<u8>>,
}

impl UdpRadio {
    /// Create an unbound driver; the socket is opened by `init`.
    pub fn new(bind: SocketAddr, peer: SocketAddr) -> Self {
        Self {
            bind,
            peer,
            socket: None,
            pending: None,
        }
    }

    /// Create from the `[radio.udp]` section.
    pub fn from_config(config: &UdpLinkConfig) -> Self {
        Self::new(config.bind, config.peer)
    }

    /// Bound local address, once initialized.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn socket(&self) -> Result<&UdpSocket, LinkError> {
        self.socket
            .as_ref()
            .ok_or_else(|| LinkError::Init("UDP radio not initialized".into()))
    }
}

impl RadioDriver for UdpRadio {
    fn init(&mut self, settings: &RadioSettings) -> Result<(), LinkError> {
        let socket = UdpSocket::bind(self.bind)
            .map_err(|e| LinkError::Init(format!("bind {}: {}", self.bind, e)))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| LinkError::Init(format!("set_nonblocking: {}", e)))?;

        tracing::info!(
            bind = %socket.local_addr().unwrap_or(self.bind),
            peer = %self.peer,
            frequency_mhz = settings.frequency_mhz,
            "UDP radio link up"
        );

        self.socket = Some(socket);
        self.pending = None;
        Ok(())
    }

    fn available(&mut self) -> Result<bool, LinkError> {
        if self.pending.is_some() {
            return Ok(true);
        }

        let mut buf = [0u8; MAX_FRAME_LEN + 1];
        let received = self.socket()?.recv_from(&mut buf);
        match received {
            Ok((len, _src)) => {
                self.pending = Some(buf[..len].to_vec());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(LinkError::Receive(e.to_string())),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let packet = self.pending.take().ok_or(LinkError::NoFrame)?;
        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        Ok(len)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        self.socket()?
            .send_to(data, self.peer)
            .map_err(|e| LinkError::Transmit(e.to_string()))?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), LinkError> {
        self.socket = None;
        self.pending = None;
        Ok(())
    }
}
