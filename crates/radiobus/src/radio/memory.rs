// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process radio driver
//!
//! Received packets come from an inbox filled through [`MemoryRadioHandle`];
//! transmitted packets are recorded. A responder closure can react to
//! transmissions, e.g. to play a peer that acknowledges frames.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{RadioDriver, RadioSettings};
use crate::error::LinkError;
use crate::frame::Frame;

type Responder = Box<dyn FnMut(&Frame) -> Vec<Frame> + Send>;

#[derive(Default)]
struct RadioState {
    settings: Option<RadioSettings>,
    inbox: VecDeque<(Vec<u8>, i16)>,
    sent: Vec<Vec<u8>>,
    last_rssi: i16,
    fail_init: bool,
    fail_sends: bool,
    fail_polls: u32,
    corrupt_next: u32,
    shut_down: bool,
    responder: Option<Responder>,
}

impl fmt::Debug for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadioState")
            .field("settings", &self.settings)
            .field("inbox", &self.inbox.len())
            .field("sent", &self.sent.len())
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

fn lock(state: &Mutex<RadioState>) -> MutexGuard<'_, RadioState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process [`RadioDriver`].
#[derive(Debug, Default)]
pub struct MemoryRadio {
    state: Arc<Mutex<RadioState>>,
}

impl MemoryRadio {
    /// Create an idle radio with an empty inbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Control handle shared with the radio.
    pub fn handle(&self) -> MemoryRadioHandle {
        MemoryRadioHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl RadioDriver for MemoryRadio {
    fn init(&mut self, settings: &RadioSettings) -> Result<(), LinkError> {
        let mut state = lock(&self.state);
        if state.fail_init {
            return Err(LinkError::Init("transceiver not responding".into()));
        }
        state.settings = Some(*settings);
        state.shut_down = false;
        Ok(())
    }

    fn available(&mut self) -> Result<bool, LinkError> {
        let mut state = lock(&self.state);
        if state.fail_polls > 0 {
            state.fail_polls -= 1;
            return Err(LinkError::Receive("spi glitch".into()));
        }
        Ok(!state.inbox.is_empty())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let mut state = lock(&self.state);
        let (packet, rssi) = state.inbox.pop_front().ok_or(LinkError::NoFrame)?;
        state.last_rssi = rssi;

        if state.corrupt_next > 0 {
            state.corrupt_next -= 1;
            return Err(LinkError::Receive("CRC error".into()));
        }

        // Hardware FIFOs truncate to the buffer size
        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        Ok(len)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        let mut state = lock(&self.state);
        if state.fail_sends {
            return Err(LinkError::Transmit("channel busy".into()));
        }
        state.sent.push(data.to_vec());

        let replies = match (state.responder.as_mut(), Frame::decode(data, 0)) {
            (Some(responder), Ok(frame)) => responder(&frame),
            _ => Vec::new(),
        };
        for reply in replies {
            let rssi = reply.rssi();
            state.inbox.push_back((reply.encode(), rssi));
        }
        Ok(())
    }

    fn last_rssi(&self) -> i16 {
        lock(&self.state).last_rssi
    }

    fn shutdown(&mut self) -> Result<(), LinkError> {
        lock(&self.state).shut_down = true;
        Ok(())
    }
}

/// Control and inspection handle for a [`MemoryRadio`].
#[derive(Debug, Clone)]
pub struct MemoryRadioHandle {
    state: Arc<Mutex<RadioState>>,
}

impl MemoryRadioHandle {
    /// Queue a frame for reception.
    pub fn inject(&self, frame: &Frame, rssi: i16) {
        self.inject_raw(&frame.encode(), rssi);
    }

    /// Queue raw bytes for reception.
    pub fn inject_raw(&self, packet: &[u8], rssi: i16) {
        lock(&self.state).inbox.push_back((packet.to_vec(), rssi));
    }

    /// Make initialization fail.
    pub fn fail_init(&self, fail: bool) {
        lock(&self.state).fail_init = fail;
    }

    /// Make transmissions fail.
    pub fn fail_sends(&self, fail: bool) {
        lock(&self.state).fail_sends = fail;
    }

    /// Fail the next `count` availability checks.
    pub fn fail_polls(&self, count: u32) {
        lock(&self.state).fail_polls = count;
    }

    /// Lose the next `count` received packets with a receive error.
    pub fn corrupt_next(&self, count: u32) {
        lock(&self.state).corrupt_next = count;
    }

    /// React to every decodable transmission with zero or more frames,
    /// which are queued for reception.
    pub fn respond_with<F>(&self, responder: F)
    where
        F: FnMut(&Frame) -> Vec<Frame> + Send + 'static,
    {
        lock(&self.state).responder = Some(Box::new(responder));
    }

    /// Settings passed to `init`, if initialized.
    pub fn settings(&self) -> Option<RadioSettings> {
        lock(&self.state).settings
    }

    /// Raw packets transmitted so far.
    pub fn sent_raw(&self) -> Vec<Vec<u8>> {
        lock(&self.state).sent.clone()
    }

    /// Transmitted packets that decode as frames.
    pub fn sent(&self) -> Vec<Frame> {
        lock(&self.state)
            .sent
            .iter()
            .filter_map(|raw| Frame::decode(raw, 0).ok())
            .collect()
    }

    /// Packets still waiting in the inbox.
    pub fn pending(&self) -> usize {
        lock(&self.state).inbox.len()
    }

    /// Whether the driver was shut down.
    pub fn is_shut_down(&self) -> bool {
        lock(&self.state).shut_down
    }
}
