// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Radio frame, node address and header flags
//!
//! ```text
//! +------+------+------+-------+---------------------+
//! |  To  | From |  Id  | Flags | Payload (0..=251 B) |
//! |  1B  |  1B  |  1B  |  1B   |                     |
//! +------+------+------+-------+---------------------+
//! ```

use std::fmt;

use crate::error::LinkError;

/// Header size in bytes
pub const HEADER_LEN: usize = 4;

/// Maximum payload carried by a single frame
pub const MAX_PAYLOAD_LEN: usize = 251;

/// Maximum raw frame size (header + payload)
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN;

/// Payload carried by acknowledgement frames
pub const ACK_PAYLOAD: &[u8] = b"!";

/// 8-bit node address on the radio link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress(pub u8);

impl NodeAddress {
    /// Reserved broadcast address
    pub const BROADCAST: Self = Self(0xFF);

    /// Check if this is the broadcast address
    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }

    /// Raw value
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for NodeAddress {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame header flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// No flags set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Frame is an acknowledgement
    pub const ACK: Self = Self(0x80);

    /// Check if flag is set
    pub fn contains(&self, flag: Self) -> bool {
        (self.0 & flag.0) != 0
    }

    /// Return a copy with `flag` set
    pub fn with(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }

    /// Get raw value
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Create from raw value
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }
}

/// A single radio datagram.
///
/// Frames are immutable once built: the gateway only reads them while
/// routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    from: NodeAddress,
    to: NodeAddress,
    id: u8,
    flags: FrameFlags,
    payload: Vec<u8>,
    rssi: i16,
}

impl Frame {
    /// Build an outbound frame.
    pub fn new(
        from: NodeAddress,
        to: NodeAddress,
        id: u8,
        flags: FrameFlags,
        payload: Vec<u8>,
    ) -> Result<Self, LinkError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(LinkError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        Ok(Self {
            from,
            to,
            id,
            flags,
            payload,
            rssi: 0,
        })
    }

    /// Build the acknowledgement for a received frame, sent from `local`.
    pub fn ack_for(received: &Frame, local: NodeAddress) -> Self {
        Self {
            from: local,
            to: received.from,
            id: received.id,
            flags: received.flags.with(FrameFlags::ACK),
            payload: ACK_PAYLOAD.to_vec(),
            rssi: 0,
        }
    }

    /// Decode a raw packet as delivered by the radio driver.
    pub fn decode(raw: &[u8], rssi: i16) -> Result<Self, LinkError> {
        if raw.len() < HEADER_LEN {
            return Err(LinkError::Malformed {
                len: raw.len(),
                header: HEADER_LEN,
            });
        }

        let payload = &raw[HEADER_LEN..];
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(LinkError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        Ok(Self {
            to: NodeAddress(raw[0]),
            from: NodeAddress(raw[1]),
            id: raw[2],
            flags: FrameFlags::from_bits(raw[3]),
            payload: payload.to_vec(),
            rssi,
        })
    }

    /// Encode header and payload into a raw packet.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(self.to.0);
        buf.push(self.from.0);
        buf.push(self.id);
        buf.push(self.flags.bits());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Sender address
    pub fn from(&self) -> NodeAddress {
        self.from
    }

    /// Destination address
    pub fn to(&self) -> NodeAddress {
        self.to
    }

    /// Sequence id
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Header flags
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Signal strength of the received frame (dBm)
    pub fn rssi(&self) -> i16 {
        self.rssi
    }

    /// Check if this frame acknowledges an earlier transmission
    pub fn is_ack(&self) -> bool {
        self.flags.contains(FrameFlags::ACK)
    }
}
