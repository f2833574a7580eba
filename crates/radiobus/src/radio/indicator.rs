// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive status indicator (an LED on real hardware)

use std::time::Duration;

use tokio::time::Instant;

/// Something that can be switched on and off to show radio activity.
pub trait StatusIndicator: Send {
    /// Switch the indicator on or off.
    fn set(&mut self, on: bool);
}

/// Indicator that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn set(&mut self, _on: bool) {}
}

/// Indicator that logs its transitions at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn set(&mut self, on: bool) {
        tracing::debug!(on, "Status indicator");
    }
}

/// Keeps an indicator lit for a fixed time after activity.
pub(crate) struct IndicatorTimer {
    indicator: Box<dyn StatusIndicator>,
    hold: Duration,
    lit_at: Option<Instant>,
}

impl IndicatorTimer {
    pub(crate) fn new(mut indicator: Box<dyn StatusIndicator>, hold: Duration) -> Self {
        indicator.set(false);
        Self {
            indicator,
            hold,
            lit_at: None,
        }
    }

    pub(crate) fn replace(&mut self, mut indicator: Box<dyn StatusIndicator>) {
        indicator.set(self.lit_at.is_some());
        self.indicator = indicator;
    }

    /// Light the indicator, restarting the hold time.
    pub(crate) fn light(&mut self) {
        if self.lit_at.is_none() {
            self.indicator.set(true);
        }
        self.lit_at = Some(Instant::now());
    }

    pub(crate) fn refresh(&mut self) {
        if let Some(lit_at) = self.lit_at {
            if lit_at.elapsed() >= self.hold {
                self.force_off();
            }
        }
    }

    pub(crate) fn force_off(&mut self) {
        self.indicator.set(false);
        self.lit_at = None;
    }

    pub(crate) fn is_lit(&self) -> bool {
        self.lit_at.is_some()
    }
}
