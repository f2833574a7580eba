// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cooperative shutdown signal.
//!
//! A single `watch` channel carries the stop flag. The gateway checks
//! [`ShutdownListener::is_triggered`] at the top of every loop iteration and
//! races [`ShutdownListener::triggered`] against every blocking wait
//! (reliable-mode ack waits, connect backoff, delivery confirmation).

use tokio::sync::watch;

/// Owner side of the shutdown signal.
#[derive(Debug)]
pub struct Shutdown {
    stop_tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new, untriggered signal.
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self { stop_tx }
    }

    /// Get a listener for a task or component.
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            stop_rx: self.stop_tx.subscribe(),
        }
    }

    /// Signal all listeners to stop. Idempotent.
    pub fn trigger(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Check if the signal has been sent.
    pub fn is_triggered(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    stop_rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Non-blocking check.
    pub fn is_triggered(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Resolve once shutdown is signalled.
    ///
    /// Also resolves if the owning [`Shutdown`] is dropped, so a task can
    /// never outlive its controller. Cancel-safe.
    pub async fn triggered(&mut self) {
        // Err means the sender is gone, which counts as a stop.
        let _ = self.stop_rx.wait_for(|stop| *stop).await;
    }
}
